//! Write a message's HTML body to `<sanitized subject>.html`.

use std::path::{Path, PathBuf};

use crate::error::{Result, WatchError};

/// Reduce a subject to a file stem.
///
/// Keeps alphanumerics (any script), space, `-` and `_`, then trims. An
/// empty result becomes `email_<unix timestamp>`.
pub fn sanitize_subject(subject: &str) -> String {
    let kept: String = subject
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let trimmed = kept.trim();

    if trimmed.is_empty() {
        format!("email_{}", chrono::Utc::now().timestamp())
    } else {
        trimmed.to_string()
    }
}

/// Write `html` to `<output_dir>/<sanitized subject>.html`, replacing any
/// existing file of that name.
///
/// The file is written even when `html` is empty.
pub fn write_html_dump(output_dir: &Path, subject: &str, html: &str) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.html", sanitize_subject(subject)));
    std::fs::write(&path, html).map_err(|e| WatchError::io(&path, e))?;
    Ok(path)
}
