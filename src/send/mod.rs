///
/// # lfpacket send
///
/// This module handles the send subcommand
///
/// The script is parsed in full before connecting. Each line is either a 发送封包（…）
/// command, `wait(ms)`, `repeat(n)` ... `end`, a blank line or a `#` comment.
///
/// # Usage
///
/// ```bash
/// lfpacket send --config=config.toml walk.txt
/// ```
///
/// # Example Config
///
/// ```toml
/// [server]
/// address = "192.168.1.20:7000"
/// timeout = 5
/// ```
///
use lfpacket::lf_protocol::{LfCodec, PacketSender, Script, ScriptRunner, Step};
use log::*;
use std::time::Duration;

mod cmdline;

use super::config::Config;
use crate::errors::Error;
pub(crate) use cmdline::Opt;

/// Entry point for the send subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, config: Config, codec: LfCodec) -> Result<(), Error> {
    let text = std::fs::read_to_string(&opt.script)?;
    let script: Script = text.parse()?;

    if opt.dry_run {
        print!("{}", preview(&script.steps, &codec, 0)?);
        return Ok(());
    }

    let address = match (&opt.address, &config.server) {
        (Some(address), _) => address.clone(),
        (None, Some(server)) => server.address.clone(),
        (None, None) => return Err(Error::MissingServer),
    };
    let timeout = config
        .server
        .as_ref()
        .map(|server| server.timeout())
        .unwrap_or_else(|| Duration::from_secs(5));

    let sender = PacketSender::connect(codec, address.as_str(), timeout, config.history_size)?;
    let report = ScriptRunner::new().run(&script, &sender);
    sender.disconnect();

    let failed = report.records.iter().filter(|r| !r.success()).count();
    info!(
        "Sent {} packets, {} failed",
        report.records.len() - failed,
        failed
    );
    Ok(())
}

fn preview(steps: &[Step], codec: &LfCodec, depth: usize) -> Result<String, Error> {
    let indent = "    ".repeat(depth);
    let mut out = String::new();
    for step in steps {
        match step {
            Step::Send(line) => {
                let rebuilt = codec.encode_command(line, None)?;
                out += &format!("{}{}\n", indent, rebuilt.hex);
            }
            Step::Wait(duration) => {
                out += &format!("{}wait {} ms\n", indent, duration.as_millis());
            }
            Step::Repeat { count, body } => {
                out += &format!("{}repeat {} times\n", indent, count);
                out += &preview(body, codec, depth + 1)?;
            }
        }
    }
    Ok(out)
}
