use super::model::*;
use super::text;
use super::xor_crypto;
use crate::{Error, Result};
use cookie_factory::bytes::*;
use cookie_factory::sequence::tuple;
use cookie_factory::{combinator::*, gen};
use cookie_factory::SerializeFn;
use log::*;
use std::io::Write;

impl PacketFields {
    /// Build the plain body: the record, the GBK text and zero padding
    ///
    /// The body is padded to `min_len` and never shorter than [`MIN_BODY_LEN`]. Text is
    /// never truncated.
    pub fn serialize_body(&self) -> Result<Vec<u8>> {
        let text_bytes = match &self.text {
            Some(text) => text::encode(text)?,
            None => vec![],
        };

        let (mut body, _) = gen(
            tuple((lf_record(&self.record), slice(&text_bytes))),
            Vec::with_capacity(RECORD_LEN + text_bytes.len()),
        )?;

        let target = self.min_len.max(MIN_BODY_LEN);
        if body.len() < target {
            body.resize(target, 0);
        }
        trace!("Plain body: {}", hex_string(&body));

        Ok(body)
    }
}

/// Obfuscate a plain body with `key` and wrap it in the packet envelope
pub fn serialize_packet(sequence: u8, key: &[u8], body: &[u8]) -> Result<Vec<u8>> {
    if !(1..=9).contains(&sequence) {
        return Err(Error::Format {
            why: format!("Sequence must be 1-9, got {}", sequence),
        });
    }

    let encrypted = xor_crypto::encrypt(key, body);
    let (buf, _) = gen(
        lf_frame(sequence, &encrypted),
        Vec::with_capacity(encrypted.len() + 3),
    )?;
    Ok(buf)
}

fn lf_frame<'a, W: Write + 'a>(sequence: u8, payload: &'a [u8]) -> impl SerializeFn<W> + 'a {
    tuple((
        le_u8(FRAME_HEAD),
        le_u8(b'0' + sequence),
        slice(payload),
        le_u8(FRAME_TAIL),
    ))
}

fn lf_record<W: Write>(record: &LfRecord) -> impl SerializeFn<W> {
    tuple((
        le_u32(record.param1),
        le_u32(record.param2),
        le_u16(record.function_code),
        le_u16(record.param3),
        le_u16(record.param4),
        le_u16(record.param5),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_record_layout() {
        let fields = PacketFields {
            record: LfRecord {
                param1: 4243548,
                param2: 0,
                function_code: 1006,
                param3: 0x4F,
                param4: 0x5E,
                param5: 0x10,
            },
            text: None,
            min_len: 0,
        };
        let body = fields.serialize_body().unwrap();
        assert_eq!(body.len(), MIN_BODY_LEN);
        assert_eq!(
            &body[..RECORD_LEN],
            &[
                0x5C, 0xC0, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0xEE, 0x03, 0x4F, 0x00, 0x5E, 0x00,
                0x10, 0x00
            ]
        );
        assert!(body[RECORD_LEN..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_body_text_and_padding() {
        let fields = PacketFields {
            record: LfRecord::default(),
            text: Some("修复神水".to_string()),
            min_len: 30,
        };
        let body = fields.serialize_body().unwrap();
        assert_eq!(body.len(), 30);
        assert_eq!(
            &body[RECORD_LEN..RECORD_LEN + 8],
            &[0xD0, 0xDE, 0xB8, 0xB4, 0xC9, 0xF1, 0xCB, 0xAE]
        );
        assert_eq!(&body[RECORD_LEN + 8..], &[0; 6]);
    }

    #[test]
    fn test_body_long_text_not_truncated() {
        let fields = PacketFields {
            record: LfRecord::default(),
            text: Some("abcdefghij".to_string()),
            min_len: 0,
        };
        let body = fields.serialize_body().unwrap();
        assert_eq!(body.len(), RECORD_LEN + 10);
    }

    #[test]
    fn test_body_unmappable_text() {
        let fields = PacketFields {
            text: Some("🙂".to_string()),
            ..Default::default()
        };
        assert_matches!(fields.serialize_body(), Err(Error::Encoding { .. }));
    }

    #[test]
    fn test_envelope() {
        let buf = serialize_packet(4, &[0x01], &[0x00, 0x00]).unwrap();
        assert_eq!(buf, vec![0x23, b'4', 0x01, 0x3C, 0x21]);
    }

    #[test]
    fn test_bad_sequence() {
        assert_matches!(serialize_packet(0, &[], &[0; 22]), Err(Error::Format { .. }));
        assert_matches!(serialize_packet(10, &[], &[0; 22]), Err(Error::Format { .. }));
    }
}
