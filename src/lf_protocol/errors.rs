use cookie_factory::GenError;
use err_derive::Error;
use nom::error::{VerboseError, VerboseErrorKind};
use std::sync::Arc;

/// This is the primary error type of the library
///
/// It is `Clone` so that a failed parse can be kept in a [`crate::lf::model::ParseResult`].
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Bad hex text, a short packet, a wrong marker or a bad sequence digit
    #[error(display = "Format error: {}", why)]
    Format {
        /// The reason the input was rejected
        why: String,
    },

    /// No registered table reproduced its own function code
    #[error(display = "No key table matches this packet")]
    ClassificationFailure,

    /// Raised when rebuilding a packet for a function code without a table
    #[error(display = "Unknown function code {}", _0)]
    UnknownFunctionCode(u16),

    /// The text has characters that GBK cannot represent
    #[error(display = "Text cannot be encoded as GBK: {}", text)]
    Encoding {
        /// The text that failed
        text: String,
    },

    /// A table is already registered for this function code
    #[error(display = "A table for function code {} is already registered", _0)]
    DuplicateFunctionCode(u16),

    /// A script line could not be understood
    #[error(display = "Script error on line {}: {}", line, why)]
    Script {
        /// 1-based line number
        line: usize,
        /// The problem with the line
        why: String,
    },

    /// Raised when sending without a connection
    #[error(display = "Not connected")]
    NotConnected,

    /// An I/O error from a socket or file
    #[error(display = "I/O error")]
    Io(#[error(source)] Arc<std::io::Error>),

    /// A Cookie Factory GenError
    #[error(display = "Serialization error")]
    Serialization(#[error(source)] Arc<GenError>),
}

impl From<std::io::Error> for Error {
    fn from(k: std::io::Error) -> Self {
        Error::Io(Arc::new(k))
    }
}

impl From<GenError> for Error {
    fn from(k: GenError) -> Self {
        Error::Serialization(Arc::new(k))
    }
}

impl<I> From<nom::Err<VerboseError<I>>> for Error {
    fn from(k: nom::Err<VerboseError<I>>) -> Self {
        let why = match k {
            nom::Err::Incomplete(_) => None,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                e.errors.into_iter().find_map(|(_, kind)| match kind {
                    VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
                    _ => None,
                })
            }
        };
        Error::Format {
            why: why.unwrap_or_else(|| "Malformed packet".to_string()),
        }
    }
}
