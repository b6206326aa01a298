use crate::Error;
use itertools::Itertools;
use serde::Deserialize;

/// The first byte of every packet (`#`)
pub const FRAME_HEAD: u8 = 0x23;
/// The last byte of every packet (`!`)
pub const FRAME_TAIL: u8 = 0x21;
/// Head, sequence digit, 16 byte record and tail
pub const MIN_PACKET_LEN: usize = 19;
/// Size of the fixed record at the start of a decrypted body
pub const RECORD_LEN: usize = 16;
/// Rebuilt bodies are zero padded to at least this many bytes
pub const MIN_BODY_LEN: usize = 22;
/// Offset of the function code inside a decrypted body
pub const FUNCTION_CODE_OFFSET: usize = 8;

/// The broad kind of operation a key table belongs to
///
/// The classifier rewards different field shapes for each class and the plaintext
/// formatter uses it to choose the operand layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableClass {
    /// Walking, running and skills. `param1` is normally zero
    Movement,
    /// Item use and dialog item transfer. `param1` is the item id
    Item,
    /// NPC clicks and dialog choices. `param1` is the NPC id
    Npc,
    /// Anything registered without a class
    Other,
}

impl Default for TableClass {
    fn default() -> Self {
        TableClass::Other
    }
}

/// A key table together with the function code it encrypts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// The function code stored at offset 8 of bodies encrypted with this table
    pub function_code: u16,
    /// The XOR key, position by position
    pub key: Vec<u8>,
    /// Human readable name of the operation
    pub name: String,
    /// The class used by scoring and formatting
    pub class: TableClass,
}

impl TableEntry {
    /// Create a new entry, naming it after the function code when no name is given
    pub fn new<T: Into<String>>(
        function_code: u16,
        key: Vec<u8>,
        name: Option<T>,
        class: TableClass,
    ) -> TableEntry {
        TableEntry {
            function_code,
            key,
            name: name
                .map(|n| n.into())
                .unwrap_or_else(|| unknown_name(function_code)),
            class,
        }
    }
}

/// The display name used for function codes without a name
pub fn unknown_name(function_code: u16) -> String {
    format!("未知功能_{}", function_code)
}

/// The fixed 16 byte record at the start of every decrypted body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LfRecord {
    /// u32 at offset 0
    pub param1: u32,
    /// u32 at offset 4
    pub param2: u32,
    /// u16 at offset 8
    pub function_code: u16,
    /// u16 at offset 10
    pub param3: u16,
    /// u16 at offset 12
    pub param4: u16,
    /// u16 at offset 14
    pub param5: u16,
}

impl LfRecord {
    /// `param3` and `param4` read together as the u32 at offset 10
    pub fn wide_operand(&self) -> u32 {
        u32::from(self.param3) | (u32::from(self.param4) << 16)
    }

    /// Split a u32 operand back into `param3` and `param4`
    pub fn set_wide_operand(&mut self, value: u32) {
        self.param3 = (value & 0xffff) as u16;
        self.param4 = (value >> 16) as u16;
    }
}

/// The bytes after the fixed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedData {
    /// Every decrypted byte after the record
    pub raw: Vec<u8>,
    /// GBK text read from the part of `raw` covered by the key table
    pub text: Option<String>,
}

impl ExtendedData {
    /// Length of the extended region in bytes
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True if there are no extended bytes
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// The envelope of a packet once the markers are checked
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    /// The sequence number 1-9
    pub sequence: u8,
    /// The still obfuscated body
    pub payload: &'a [u8],
}

/// A fully decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfPacket {
    /// The sequence number 1-9 taken from the envelope
    pub sequence: u8,
    /// The function code of the table that matched
    pub function_code: u16,
    /// The display name of the function code
    pub function_name: String,
    /// The class of the table that matched
    pub class: TableClass,
    /// The fixed record
    pub record: LfRecord,
    /// Bytes after the record, if any
    pub extended: Option<ExtendedData>,
    /// The whole decrypted body
    pub decrypted: Vec<u8>,
    /// Length of the key table that matched
    pub key_len: usize,
    /// The classifier score of the winning table
    pub score: i64,
    /// The canonical `发送封包（…）` form
    pub plaintext: String,
}

impl LfPacket {
    /// The decrypted body as upper case hex separated by spaces
    pub fn decrypted_hex(&self) -> String {
        hex_string(&self.decrypted)
    }

    /// The extended text, if any was decoded
    pub fn text(&self) -> Option<&str> {
        self.extended.as_ref().and_then(|ext| ext.text.as_deref())
    }

    /// The fields needed to rebuild this packet
    ///
    /// The rebuilt body is padded back to the original length
    pub fn to_fields(&self) -> PacketFields {
        PacketFields {
            record: self.record,
            text: self.text().map(|t| t.to_string()),
            min_len: self.decrypted.len(),
        }
    }
}

/// The outcome of parsing one packet
///
/// Failures are reported here rather than raised so that a caller forwarding traffic never
/// has to handle an error from the parser.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// The input as hex text
    pub raw_hex: String,
    /// The decoded packet or the reason decoding failed
    pub outcome: Result<LfPacket, Error>,
}

impl ParseResult {
    /// True if the packet was decoded
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The decoded packet
    pub fn packet(&self) -> Option<&LfPacket> {
        self.outcome.as_ref().ok()
    }

    /// The reason decoding failed
    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    /// The canonical text form of a decoded packet
    pub fn plaintext(&self) -> Option<&str> {
        self.packet().map(|p| p.plaintext.as_str())
    }
}

/// Structured fields ready to be rebuilt into a packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFields {
    /// The record to pack
    pub record: LfRecord,
    /// Text appended after the record
    pub text: Option<String>,
    /// The body is zero padded to at least this length (and never below [`MIN_BODY_LEN`])
    pub min_len: usize,
}

/// A rebuilt packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstructed {
    /// The framed, obfuscated bytes
    pub bytes: Vec<u8>,
    /// `bytes` as upper case hex separated by spaces
    pub hex: String,
}

/// Format bytes as upper case hex separated by spaces
pub fn hex_string(buf: &[u8]) -> String {
    buf.iter().map(|b| format!("{:02X}", b)).join(" ")
}
