use structopt::StructOpt;

/// The extract command derives key bytes from a packet and its known plaintext
#[derive(StructOpt, Debug)]
pub struct Opt {
    /// The obfuscated packet as hex
    pub cipher: String,
    /// The known plain body as hex. Key bytes past its end are not recovered
    pub plain: String,
    /// The cipher is a bare body without the head, sequence and tail bytes
    #[structopt(long)]
    pub body: bool,
}
