use std::path::PathBuf;
use structopt::{clap::AppSettings, StructOpt};

/// Decoder and re-encoder for Lingfeng client packets
///
/// Decodes captured packets into the 发送封包（…） form, rebuilds packets from it and sends
/// scripted batches to a server.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "lfpacket",
    setting(AppSettings::ArgRequiredElseHelp),
    setting(AppSettings::UnifiedHelpMessage)
)]
pub struct Opt {
    /// Optional config file with extra key tables, scoring rules and the server address
    #[structopt(short, long, global(true), parse(from_os_str))]
    pub config: Option<PathBuf>,
    #[structopt(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    Decode(super::decode::Opt),
    Encode(super::encode::Opt),
    Extract(super::extract::Opt),
    Send(super::send::Opt),
    Replay(super::replay::Opt),
}
