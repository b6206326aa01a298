#![warn(missing_docs)]
//! # lfpacket
//!
//! lfpacket is a rust library for reading and writing the obfuscated packets that the
//! Lingfeng game client sends to its server.
//!
//! Most high level operations are on the [`lf_protocol::LfCodec`] struct
//!
//! A codec with the built-in key tables can be created with
//!
//! ```
//! use lfpacket::lf_protocol::LfCodec;
//! let codec = LfCodec::default();
//! let result = codec.parse_hex("23 38 3C 44 46 7A 3F 4C 3C 3C 3C 3C 3F 6E 3C 6C 3C 3C 3C 3C 3C 3C 3C 3C 21");
//! assert!(result.success());
//! ```
//!
//! A parsed packet can then be rebuilt with
//!
//! ```
//! # use lfpacket::lf_protocol::LfCodec;
//! # let codec = LfCodec::default();
//! # let result = codec.parse_hex("23 38 3C 44 46 7A 3F 4C 3C 3C 3C 3C 3F 6E 3C 6C 3C 3C 3C 3C 3C 3C 3C 3C 21");
//! let rebuilt = codec.reconstruct_result(&result, Some(8)).unwrap();
//! assert_eq!(rebuilt.bytes[0], 0x23);
//! ```
//!
//! For further commands see the [`lf_protocol::LfCodec`] struct.
//!

/// Contains low level packet structures and formats
pub mod lf;
/// Contains high level interfaces for parsing, rebuilding and sending packets
pub mod lf_protocol;

/// This is the top level error structure of the library
///
/// Most commands will either return their `Ok(result)` or this `Err(Error)`
pub use lf_protocol::Error;

pub(crate) use lf_protocol::Result;
