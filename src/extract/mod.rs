///
/// # lfpacket extract
///
/// This module handles the extract subcommand
///
/// Given a packet and the plain body it is known to carry, the key table is the XOR of the
/// two over the bytes they share. The output can be pasted into a `[[tables]]` entry of the
/// config.
///
/// # Usage
///
/// ```bash
/// lfpacket extract "23 34 3C ... 21" "00 00 00 00 00 00 00 00 C5 0B 67 00 03 00 56 00"
/// ```
///
use lfpacket::lf::de::parse_hex;
use lfpacket::lf::model::hex_string;
use lfpacket::lf_protocol::LfCodec;
use log::*;

mod cmdline;

use crate::errors::Error;
pub(crate) use cmdline::Opt;

/// Entry point for the extract subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt) -> Result<(), Error> {
    let cipher = parse_hex(&opt.cipher)?;
    let plain = parse_hex(&opt.plain)?;

    let key = if opt.body {
        LfCodec::extract_table(&cipher, &plain)
    } else {
        LfCodec::extract_table_from_packet(&cipher, &plain)?
    };

    if key.len() < plain.len() {
        warn!(
            "Plaintext is longer than the body, only {} key bytes recovered",
            key.len()
        );
    }
    println!("key = \"{}\"", hex_string(&key));
    Ok(())
}
