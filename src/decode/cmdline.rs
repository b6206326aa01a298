use structopt::StructOpt;

/// The decode command parses packets given as hex and prints their fields
#[derive(StructOpt, Debug)]
pub struct Opt {
    /// Packets as hex, one per argument. Quote a packet to keep its spaces
    #[structopt(required = true)]
    pub packets: Vec<String>,
    /// Also print the decrypted body and classifier score
    #[structopt(short, long)]
    pub verbose: bool,
}
