///
/// # lfpacket decode
///
/// This module handles the decode subcommand
///
/// Each packet is framed, matched against the key tables and printed field by field
/// together with its 发送封包（…） form.
///
/// # Usage
///
/// ```bash
/// lfpacket decode "23 38 3C 44 46 7A 3F 4C 3C 3C 3C 3C 3F 6E 3C 6C 3C 3C 3C 3C 3C 3C 3C 3C 21"
/// ```
///
use lfpacket::lf::model::{hex_string, ParseResult};
use lfpacket::lf_protocol::LfCodec;
use log::*;

mod cmdline;

use crate::errors::Error;
pub(crate) use cmdline::Opt;

/// Entry point for the decode subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, codec: LfCodec) -> Result<(), Error> {
    let mut failures = 0;
    for hex in &opt.packets {
        let result = codec.parse_hex(hex);
        print!("{}", describe(&result, opt.verbose));
        if !result.success() {
            failures += 1;
        }
    }

    if failures > 0 {
        warn!("{} of {} packets could not be decoded", failures, opt.packets.len());
    }
    Ok(())
}

fn describe(result: &ParseResult, verbose: bool) -> String {
    let mut out = format!("packet:     {}\n", result.raw_hex);
    match &result.outcome {
        Ok(packet) => {
            let record = &packet.record;
            out += &format!("sequence:   {}\n", packet.sequence);
            out += &format!(
                "function:   {} {}\n",
                packet.function_code, packet.function_name
            );
            out += &format!(
                "params:     {} {} {} {} {}\n",
                record.param1, record.param2, record.param3, record.param4, record.param5
            );
            if let Some(extended) = &packet.extended {
                out += &format!(
                    "extended:   {} bytes: {}\n",
                    extended.len(),
                    hex_string(&extended.raw)
                );
                if let Some(text) = &extended.text {
                    out += &format!("text:       {}\n", text);
                }
            }
            if verbose {
                out += &format!("decrypted:  {}\n", packet.decrypted_hex());
                out += &format!("score:      {} (table of {} bytes)\n", packet.score, packet.key_len);
            }
            out += &format!("plaintext:  {}\n", packet.plaintext);
        }
        Err(e) => {
            out += &format!("error:      {}\n", e);
        }
    }
    out
}
