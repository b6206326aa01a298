///
/// # lfpacket replay
///
/// This module handles the replay subcommand
///
/// The packets of a capture log are handed to the capture loop one by one as if they had
/// just been intercepted. Every packet is written back to stdout unchanged, decoded or not,
/// and the decoded ones are logged.
///
/// # Usage
///
/// ```bash
/// lfpacket replay capture.log --pid 4312
/// ```
///
/// # Capture log
///
/// ```text
/// # comments and blank lines are skipped
/// 4312: 23 34 3C 3C 3C 3C 3C 3C 3C 3C 3C 3C 3F 41 3E 72 58 3C 3C 6C 3D 52 3C 3C 21
/// 23 38 3C 44 46 7A 3F 4C 3C 3C 3C 3C 3F 6E 3C 6C 3C 3C 3C 3C 3C 3C 3C 3C 21
/// ```
///
use lazy_static::lazy_static;
use lfpacket::lf::de::parse_hex;
use lfpacket::lf::model::hex_string;
use lfpacket::lf_protocol::{CaptureLoop, CapturedPacket, ChannelSource, LfCodec};
use log::*;
use regex::Regex;
use std::io::Write;

mod cmdline;

use super::config::Config;
use crate::errors::Error;
pub(crate) use cmdline::Opt;

/// Entry point for the replay subcommand
///
/// Opt is the command line options
pub(crate) fn main(opt: Opt, config: Config, codec: LfCodec) -> Result<(), Error> {
    let text = std::fs::read_to_string(&opt.file)?;
    let packets = read_log(&text);

    let (tx, rx) = crossbeam_channel::unbounded();
    for packet in packets {
        // The receiver is alive until the loop below ends
        let _ = tx.send(packet);
    }
    drop(tx);

    let stdout = std::io::stdout();
    let sink = move |packet: &CapturedPacket| -> Result<(), lfpacket::Error> {
        writeln!(stdout.lock(), "{}", hex_string(&packet.payload))?;
        Ok(())
    };

    let source = ChannelSource::new(rx);
    let mut capture = CaptureLoop::new(codec, source, sink, config.history_size);
    capture.set_target_pid(opt.pid);
    capture.on_packet(|record| {
        if let Some(plaintext) = record.result.plaintext() {
            info!("{}", plaintext);
        }
    });

    let stats = capture.run()?;
    info!(
        "{} packets: {} decoded, {} failed, {} passed through",
        stats.total, stats.parsed, stats.failed, stats.skipped
    );
    Ok(())
}

fn read_log(text: &str) -> Vec<CapturedPacket> {
    lazy_static! {
        static ref LINE: Regex =
            Regex::new(r"^(?:(?P<pid>\d+)\s*:)?\s*(?P<hex>.*)$").expect("valid regex");
    }

    let mut packets = vec![];
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let caps = match LINE.captures(line) {
            Some(caps) => caps,
            None => continue,
        };
        let pid = caps.name("pid").and_then(|m| m.as_str().parse().ok());
        match parse_hex(&caps["hex"]) {
            Ok(payload) => packets.push(CapturedPacket {
                payload,
                pid,
                outbound: true,
            }),
            Err(e) => warn!("Skipping line {}: {}", i + 1, e),
        }
    }
    packets
}
