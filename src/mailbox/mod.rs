//! Remote mailbox access.
//!
//! The poll loop talks to the server only through [`Connector`] and
//! [`MailSession`], so it can be driven by an in-memory mailbox in tests.

pub mod imap;

use std::collections::HashSet;

use crate::checkpoint::Uid;
use crate::error::Result;

/// Result of selecting a mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// UIDVALIDITY reported by the server, if any.
    pub uid_validity: Option<u32>,
    /// Number of messages in the mailbox.
    pub exists: u32,
}

/// An authenticated connection to the mail server.
pub trait MailSession {
    /// Names of all folders visible to the account.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    /// Open `mailbox` for reading.
    fn select(&mut self, mailbox: &str) -> Result<MailboxStatus>;

    /// UIDs of messages without the `\Seen` flag in the selected mailbox.
    fn search_unseen(&mut self) -> Result<HashSet<Uid>>;

    /// Full raw message (headers and body) for `uid`.
    fn fetch(&mut self, uid: Uid) -> Result<Vec<u8>>;

    /// End the session.
    fn logout(&mut self) -> Result<()>;
}

/// Opens authenticated sessions.
pub trait Connector {
    type Session: MailSession;

    fn connect(&self) -> Result<Self::Session>;
}
