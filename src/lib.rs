//! `paperwatch` — watch an IMAP mailbox for paper-alert emails.
//!
//! This crate provides the polling state machine, the message parsing and
//! link extraction pipeline, and the persistent checkpoint of processed
//! messages.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod export;
pub mod mailbox;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod poll;
