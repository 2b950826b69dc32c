//! Core data model types for parsed messages and their attachments.

pub mod attachment;
pub mod mail;
