//! Message parsing: header extraction, MIME walking and link extraction.

pub mod header;
pub mod links;
pub mod mime;
