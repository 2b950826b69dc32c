//! Per-message processing: parse, dump HTML, extract and persist paper links.

use std::path::PathBuf;

use humansize::{format_size, BINARY};
use tracing::{debug, info};

use crate::checkpoint::Uid;
use crate::config::OutputConfig;
use crate::error::{Result, WatchError};
use crate::export::html::write_html_dump;
use crate::export::links::LinkWriter;
use crate::parser::links::extract_paper_ids;
use crate::parser::mime::parse_message;

/// Characters of plain text shown in the per-message log line.
const PREVIEW_CHARS: usize = 200;

/// What processing one message produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOutcome {
    pub subject: String,
    /// Path of the HTML dump, when dumps are enabled.
    pub html_path: Option<PathBuf>,
    /// Paper identifiers found in the HTML body, in text order.
    pub paper_ids: Vec<String>,
}

/// Turns raw messages into files on disk.
#[derive(Debug, Clone)]
pub struct MessagePipeline {
    html_dir: Option<PathBuf>,
    links: LinkWriter,
}

impl MessagePipeline {
    /// `html_dir` of `None` disables HTML dumps.
    pub fn new(html_dir: Option<PathBuf>, links: LinkWriter) -> Self {
        Self { html_dir, links }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        let links = LinkWriter::new(
            &output.link_base,
            output.resolve(&output.abs_links_file),
            output.resolve(&output.pdf_links_file),
        );
        let html_dir = output.save_html.then(|| output.dir.clone());
        Self::new(html_dir, links)
    }

    pub fn links(&self) -> &LinkWriter {
        &self.links
    }

    /// Process one fetched message.
    ///
    /// Any error means the message produced incomplete output and should be
    /// retried.
    pub fn process(&self, uid: Uid, raw: &[u8]) -> Result<MessageOutcome> {
        let record = parse_message(raw).map_err(|e| match e {
            WatchError::Parse(reason) => WatchError::Parse(format!("UID {uid}: {reason}")),
            other => other,
        })?;

        info!(
            uid,
            subject = %record.subject,
            from = %record.from,
            date = %record.date,
            has_html = !record.html.is_empty(),
            attachments = record.attachments.len(),
            attachments_size = %format_size(record.attachments_size(), BINARY),
            "Processing message"
        );
        debug!(uid, preview = %record.text_preview(PREVIEW_CHARS), "Text body");
        for att in &record.attachments {
            debug!(
                uid,
                filename = %att.filename,
                content_type = %att.content_type,
                size = %format_size(att.size, BINARY),
                "Attachment"
            );
        }

        let html_path = match &self.html_dir {
            Some(dir) => Some(write_html_dump(dir, &record.subject, &record.html)?),
            None => None,
        };

        let paper_ids: Vec<String> = extract_paper_ids(&record.html)
            .map(str::to_string)
            .collect();
        self.links.append(&paper_ids)?;
        info!(uid, links = paper_ids.len(), "Extracted paper links");

        Ok(MessageOutcome {
            subject: record.subject,
            html_path,
            paper_ids,
        })
    }
}
