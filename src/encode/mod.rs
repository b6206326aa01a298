///
/// # lfpacket encode
///
/// This module handles the encode subcommand
///
/// The command line is parsed, packed with the key table of its function code and printed
/// as hex ready to be sent.
///
/// # Usage
///
/// ```bash
/// lfpacket encode "发送封包（0，0，3013，103，3，86，）" --sequence 4
/// ```
///
use lfpacket::lf_protocol::LfCodec;
use log::*;

mod cmdline;

use crate::errors::Error;
pub(crate) use cmdline::Opt;

/// Entry point for the encode subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, codec: LfCodec) -> Result<(), Error> {
    let rebuilt = codec.encode_command(&opt.command, opt.sequence)?;
    debug!("{} bytes", rebuilt.bytes.len());
    println!("{}", rebuilt.hex);
    Ok(())
}
