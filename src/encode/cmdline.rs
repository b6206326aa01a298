use structopt::StructOpt;

fn sequence_parse(src: &str) -> Result<u8, String> {
    match src.parse::<u8>() {
        Ok(n) if (1..=9).contains(&n) => Ok(n),
        _ => Err(format!("Sequence must be a number from 1 to 9, got {}", src)),
    }
}

/// The encode command rebuilds a packet from its 发送封包（…） form
#[derive(StructOpt, Debug)]
pub struct Opt {
    /// The command, for example "发送封包（0，0，3013，103，3，86，）"
    pub command: String,
    /// The sequence digit to use. Defaults to 1
    #[structopt(short, long, parse(try_from_str = sequence_parse))]
    pub sequence: Option<u8>,
}
