//! Attachment records.
//!
//! Attachments are kept in memory only; nothing in the pipeline writes
//! them to disk.

/// A decoded attachment taken from one MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Decoded filename (RFC 2047 / RFC 2231 resolved).
    pub filename: String,

    /// Declared MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Decoded size in bytes.
    pub size: u64,

    /// Transfer-decoded payload.
    pub content: Vec<u8>,
}
