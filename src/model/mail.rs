//! Parsed message record.

use super::attachment::Attachment;

/// Everything the pipeline needs from one fetched message.
///
/// Built fresh for each message and dropped once its outputs are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRecord {
    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// `From:` header value, verbatim.
    pub from: String,

    /// `Date:` header value, verbatim.
    pub date: String,

    /// Last non-attachment `text/plain` part, or empty.
    pub text: String,

    /// Last non-attachment `text/html` part, or empty.
    pub html: String,

    /// Parts with an `attachment` disposition and a filename.
    pub attachments: Vec<Attachment>,
}

impl MessageRecord {
    /// Sum of all attachment sizes in bytes.
    pub fn attachments_size(&self) -> u64 {
        self.attachments.iter().map(|a| a.size).sum()
    }

    /// First `max_chars` characters of the plain-text body.
    pub fn text_preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}
