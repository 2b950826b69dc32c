//! Append extracted paper identifiers to the abstract and PDF link files.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, WatchError};

/// Appends `<base>/abs/<id>` and `<base>/pdf/<id>` lines to two files.
///
/// Files are opened in append mode (created if absent) for each batch and
/// receive a single write; nothing is deduplicated against earlier content.
#[derive(Debug, Clone)]
pub struct LinkWriter {
    base: String,
    abs_path: PathBuf,
    pdf_path: PathBuf,
}

impl LinkWriter {
    pub fn new(base: &str, abs_path: impl Into<PathBuf>, pdf_path: impl Into<PathBuf>) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            abs_path: abs_path.into(),
            pdf_path: pdf_path.into(),
        }
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    /// Append one line per identifier to both files.
    pub fn append<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        append_lines(&self.abs_path, &self.render(ids, "abs"))?;
        append_lines(&self.pdf_path, &self.render(ids, "pdf"))
    }

    fn render<S: AsRef<str>>(&self, ids: &[S], kind: &str) -> String {
        ids.iter()
            .map(|id| format!("{}/{kind}/{}\n", self.base, id.as_ref()))
            .collect()
    }
}

fn append_lines(path: &Path, lines: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| WatchError::io(path, e))?;
    file.write_all(lines.as_bytes())
        .map_err(|e| WatchError::io(path, e))
}
