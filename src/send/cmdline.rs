use std::path::PathBuf;
use structopt::StructOpt;

/// The send command runs a script of packets against the server
#[derive(StructOpt, Debug)]
pub struct Opt {
    /// The script file
    #[structopt(parse(from_os_str))]
    pub script: PathBuf,
    /// The server as host:port. Overrides the address in the config
    #[structopt(short, long)]
    pub address: Option<String>,
    /// Parse the script and print what it would send without connecting
    #[structopt(long)]
    pub dry_run: bool,
}
