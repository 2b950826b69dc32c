//! arXiv identifier extraction from HTML bodies.
//!
//! The HTML is scanned as plain text: markup, entities and broken tags are
//! irrelevant to the match, so malformed input never fails.

use std::sync::LazyLock;

use regex::Regex;

/// `http(s)://arxiv.org/abs/<id>` or `/pdf/<id>`, where `<id>` is
/// `YYMM.NNNNN` with an optional `vN` revision.
static ARXIV_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://arxiv\.org/(?:abs|pdf)/([0-9]{4}\.[0-9]{4,5}(?:v[0-9]+)?)")
        .expect("arXiv link pattern is valid")
});

/// Yield every paper identifier in `html`, in text order.
///
/// Duplicates are kept; an abstract link and a PDF link to the same paper
/// produce two identifiers.
pub fn extract_paper_ids(html: &str) -> impl Iterator<Item = &str> + '_ {
    ARXIV_LINK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}
