use std::path::PathBuf;
use structopt::StructOpt;

/// The replay command feeds a capture log through the capture loop
#[derive(StructOpt, Debug)]
pub struct Opt {
    /// The capture log, one packet as hex per line with an optional `pid:` prefix
    #[structopt(parse(from_os_str))]
    pub file: PathBuf,
    /// Only decode packets from this process. Other packets are passed through untouched
    #[structopt(short, long)]
    pub pid: Option<u32>,
}
