//! Centralized error types for paperwatch.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the paperwatch library.
#[derive(Error, Debug)]
pub enum WatchError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The IMAP server or protocol layer reported a failure.
    #[error("IMAP error: {0}")]
    Imap(#[from] imap::error::Error),

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A FETCH response carried no message body.
    #[error("Server returned no body for UID {0}")]
    MissingBody(u32),

    /// An operation needed a live session but none was open.
    #[error("Not connected to the mail server")]
    NotConnected,

    /// The raw message could not be parsed at all.
    #[error("Message parse error: {0}")]
    Parse(String),

    /// A single MIME part could not be decoded.
    #[error("Cannot decode MIME part {index}: {reason}")]
    PartDecode { index: usize, reason: String },

    /// The checkpoint file is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible checkpoint '{path}': {reason}")]
    InvalidCheckpoint { path: PathBuf, reason: String },

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, WatchError>`.
pub type Result<T> = std::result::Result<T, WatchError>;

impl WatchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (socket setup mostly; prefer `WatchError::io` for files).
impl From<std::io::Error> for WatchError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
