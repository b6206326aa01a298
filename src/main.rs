#![warn(missing_docs)]
//!
//! # lfpacket
//!
//! lfpacket is a small program for working with the obfuscated packets of the Lingfeng game
//! client.
//!
//! It contains sub commands for decoding captured packets, rebuilding packets from their
//! text form, deriving new key tables and sending scripted batches to a server.
//!
use env_logger::Env;
use log::*;
use structopt::StructOpt;

mod cmdline;
mod config;
mod decode;
mod encode;
mod errors;
mod extract;
mod replay;
mod send;

use cmdline::{Command, Opt};
use config::Config;
use errors::Error;

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!(
        "lfpacket {} {}",
        env!("LFPACKET_VERSION"),
        env!("LFPACKET_PROFILE")
    );

    let opt = Opt::from_args();

    let config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let codec = config.build_codec()?;

    match opt.cmd {
        None => {
            warn!("No subcommand given, see --help");
        }
        Some(Command::Decode(opts)) => {
            decode::main(opts, codec)?;
        }
        Some(Command::Encode(opts)) => {
            encode::main(opts, codec)?;
        }
        Some(Command::Extract(opts)) => {
            extract::main(opts)?;
        }
        Some(Command::Send(opts)) => {
            send::main(opts, config, codec)?;
        }
        Some(Command::Replay(opts)) => {
            replay::main(opts, config, codec)?;
        }
    }

    Ok(())
}
