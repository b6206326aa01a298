//! The Lingfeng packet format is a one byte head marker, a one byte ASCII sequence digit,
//! an obfuscated body and a one byte tail marker:
//!
//! ```text
//! 0x23 | '1'..'9' | body ... | 0x21
//! ```
//!
//! The whole packet is at least 19 bytes long.
//!
//! ---
//!
//! # Body
//! The body is XORed position by position against a key table. Which table is used depends on
//! the function code stored inside the body, so the table has to be guessed before the code can
//! be read. Positions past the end of a table are keyed with the fallback byte `0x3C`.
//!
//! Once decrypted the body starts with a fixed 16 byte record (little endian):
//!
//! | offset | size | field         |
//! |--------|------|---------------|
//! | 0      | 4    | param1        |
//! | 4      | 4    | param2        |
//! | 8      | 2    | function code |
//! | 10     | 2    | param3        |
//! | 12     | 2    | param4        |
//! | 14     | 2    | param5        |
//!
//! ## Extended data
//! Anything after the record is extended data. It is usually GBK text padded with zeros.
//!

/// Contains the structure of the packets such as records and parse results
pub mod model;

/// Contains code related to the deserialisation of the packets
pub mod de;
/// Contains code related to the serialisation of the packets
pub mod ser;

/// Contains the mapping from function code to key table
pub mod registry;

/// Contains the heuristic that picks the key table of an obfuscated body
pub mod classify;

/// Contains the canonical `发送封包（…）` text form of a packet
pub mod plaintext;

/// Contains the GBK helpers for the extended text
pub mod text;

/// Contains the XOR key routines
pub mod xor_crypto;
