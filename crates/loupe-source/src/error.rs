use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The token stream violates an expected local grammar fragment.
    /// Fatal for the current scan; no partial index survives it.
    #[error("malformed input at line {line}: {message}")]
    MalformedInput { message: String, line: u32 },

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SourceError {
    pub fn malformed(message: impl Into<String>, line: u32) -> Self {
        SourceError::MalformedInput {
            message: message.into(),
            line,
        }
    }
}
