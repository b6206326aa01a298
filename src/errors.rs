use err_derive::Error;

/// The main error of the command line tool
#[derive(Debug, Error)]
#[allow(clippy::large_enum_variant)]
pub enum Error {
    /// Raised when `lfpacket` raises an error
    #[error(display = "Codec error: {}", _0)]
    Codec(#[error(source)] lfpacket::Error),
    /// Raised when the config file fails to deserlize
    #[error(display = "Configuration parsing error")]
    Config(#[error(source)] toml::de::Error),
    /// Raised when there is an IO error such as unable to find
    /// config file
    #[error(display = "I/O error")]
    Io(#[error(source)] std::io::Error),
    /// Raised when the config file fails validataion
    #[error(display = "Validation error")]
    Validation(#[error(source)] validator::ValidationErrors),
    /// Raised when sending without a `[server]` section or `--address`
    #[error(display = "No server address in the config or on the command line")]
    MissingServer,
}
