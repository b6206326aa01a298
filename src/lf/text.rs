use crate::{Error, Result};
use encoding_rs::GBK;
use unicode_general_category::{get_general_category, GeneralCategory};

/// True for characters that show up as something when printed
///
/// Control, format, private use, unassigned and separator characters are not printable.
/// The ASCII space is the one separator that is.
pub fn is_printable(c: char) -> bool {
    use GeneralCategory::*;
    match get_general_category(c) {
        Control | Format | Surrogate | PrivateUse | Unassigned | LineSeparator
        | ParagraphSeparator => false,
        SpaceSeparator => c == ' ',
        _ => true,
    }
}

fn is_lead(b: u8) -> bool {
    (0x81..=0xFE).contains(&b)
}

fn is_trail(b: u8) -> bool {
    (0x40..=0x7E).contains(&b) || (0x80..=0xFE).contains(&b)
}

/// Read `buf` as GBK, skipping anything that is not a GBK character
///
/// Only single bytes and two byte pairs are GBK. A lead byte that does not start a mapped
/// pair is dropped on its own and decoding carries on from the next byte, so the digits of
/// a four byte GB18030 sequence come out as ASCII. Pairs in the user-defined areas decode
/// to private use characters and count as unmapped.
fn gbk_chars(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len());
    let mut i = 0;
    while i < buf.len() {
        let b = buf[i];
        if b < 0x80 {
            out.push(char::from(b));
            i += 1;
            continue;
        }

        if is_lead(b) && buf.get(i + 1).map_or(false, |&t| is_trail(t)) {
            let pair = GBK.decode_without_bom_handling_and_without_replacement(&buf[i..i + 2]);
            if let Some(pair) = pair {
                let user_defined = pair
                    .chars()
                    .any(|c| get_general_category(c) == GeneralCategory::PrivateUse);
                if !user_defined {
                    out.push_str(&pair);
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}

/// Decode zero padded GBK text without ever failing
///
/// Trailing zeros are stripped, invalid sequences are dropped and only characters that are
/// printable or outside ASCII are kept. Returns `None` when nothing is left.
pub fn decode_lenient(buf: &[u8]) -> Option<String> {
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    if end == 0 {
        return None;
    }

    let text: String = gbk_chars(&buf[..end])
        .chars()
        .filter(|&c| is_printable(c) || (c as u32) > 127)
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Number of printable characters when `buf` is read as GBK
pub fn printable_count(buf: &[u8]) -> usize {
    gbk_chars(buf).chars().filter(|&c| is_printable(c)).count()
}

/// Encode text as GBK
///
/// Fails with [`Error::Encoding`] if any character has no GBK form.
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, unmappable) = GBK.encode(text);
    if unmappable {
        return Err(Error::Encoding {
            text: text.to_string(),
        });
    }
    Ok(bytes.into_owned())
}
