//! Output writers: HTML body dumps and paper-link lists.

pub mod html;
pub mod links;
