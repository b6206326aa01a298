use super::model::*;
use super::text;
use crate::{Error, Result};
use nom::{
    bytes::complete::{take, take_while_m_n},
    character::complete::multispace0,
    combinator::{all_consuming, map_res, verify},
    error::context as error_context,
    multi::many0,
    number::complete::*,
    sequence::{preceded, terminated, tuple},
};

type IResult<I, O, E = nom::error::VerboseError<I>> = std::result::Result<(I, O), nom::Err<E>>;

impl<'a> Frame<'a> {
    /// Check the envelope of a raw packet and split out the sequence and body
    pub fn deserialize(buf: &'a [u8]) -> Result<Frame<'a>> {
        if buf.len() < MIN_PACKET_LEN {
            return Err(Error::Format {
                why: format!(
                    "Packet too short: need at least {} bytes, got {}",
                    MIN_PACKET_LEN,
                    buf.len()
                ),
            });
        }
        let (_, frame) = lf_frame(buf)?;
        Ok(frame)
    }
}

impl LfRecord {
    /// Read the fixed record from the start of a decrypted body
    ///
    /// Returns the record and the bytes that follow it
    pub fn deserialize(buf: &[u8]) -> Result<(LfRecord, &[u8])> {
        let (rest, record) = lf_record(buf)?;
        Ok((record, rest))
    }
}

impl ExtendedData {
    /// Decode the bytes after the record
    ///
    /// `covered` is how many of them were keyed by the table rather than by the fallback
    /// byte; text is only read from that part.
    pub fn deserialize(buf: &[u8], covered: usize) -> ExtendedData {
        let trusted = &buf[..covered.min(buf.len())];
        ExtendedData {
            raw: buf.to_vec(),
            text: text::decode_lenient(trusted),
        }
    }
}

/// Parse hex text such as `"23 34 3C"` or `"23343C"` into bytes
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let (_, bytes) = error_context(
        "Invalid hex text",
        all_consuming(terminated(
            many0(preceded(multispace0, hex_byte)),
            multispace0,
        )),
    )(input)?;
    Ok(bytes)
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |digits: &str| u8::from_str_radix(digits, 16),
    )(input)
}

fn lf_frame(buf: &[u8]) -> IResult<&[u8], Frame<'_>> {
    let body_len = buf.len().saturating_sub(3);

    let (buf, _head) = error_context(
        "Head marker mismatch: expected '#' (0x23)",
        verify(le_u8, |&b: &u8| b == FRAME_HEAD),
    )(buf)?;
    let (buf, digit) = error_context(
        "Sequence is not an ASCII digit 1-9",
        verify(le_u8, |b: &u8| (b'1'..=b'9').contains(b)),
    )(buf)?;
    let (buf, payload) = take(body_len)(buf)?;
    let (buf, _tail) = error_context(
        "Tail marker mismatch: expected '!' (0x21)",
        verify(le_u8, |&b: &u8| b == FRAME_TAIL),
    )(buf)?;

    Ok((
        buf,
        Frame {
            sequence: digit - b'0',
            payload,
        },
    ))
}

fn lf_record(buf: &[u8]) -> IResult<&[u8], LfRecord> {
    let (buf, (param1, param2, function_code, param3, param4, param5)) = error_context(
        "Body is shorter than the 16 byte record",
        tuple((le_u32, le_u32, le_u16, le_u16, le_u16, le_u16)),
    )(buf)?;

    Ok((
        buf,
        LfRecord {
            param1,
            param2,
            function_code,
            param3,
            param4,
            param5,
        },
    ))
}
