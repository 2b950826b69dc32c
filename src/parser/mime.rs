//! MIME message parsing: subject and header extraction, body selection, attachment collection.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{Result, WatchError};
use crate::model::attachment::Attachment;
use crate::model::mail::MessageRecord;
use crate::parser::header;

/// Maximum depth for descending into attached `message/rfc822` parts
/// (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Parse a complete raw message (headers + body) into a [`MessageRecord`].
///
/// Parts that cannot be decoded are logged and skipped; only a message that
/// cannot be parsed at all is an error.
pub fn parse_message(raw_message: &[u8]) -> Result<MessageRecord> {
    if raw_message.iter().all(u8::is_ascii_whitespace) {
        return Err(WatchError::Parse("empty message".into()));
    }

    let parser = MessageParser::default();
    let msg = parser
        .parse(raw_message)
        .ok_or_else(|| WatchError::Parse("not an RFC 5322 message".into()))?;

    let raw_headers = header::parse_raw_headers(raw_message);

    let mut record = MessageRecord {
        subject: msg.subject().unwrap_or_default().to_string(),
        from: header::get_header(&raw_headers, "from").unwrap_or_default(),
        date: header::get_header(&raw_headers, "date").unwrap_or_default(),
        ..Default::default()
    };

    walk_parts(&msg, 0, &mut record);

    Ok(record)
}

/// Visit every part in document order, descending into attached messages.
fn walk_parts(msg: &Message<'_>, depth: usize, record: &mut MessageRecord) {
    for (index, part) in msg.parts.iter().enumerate() {
        if let Err(e) = collect_part(msg, index, part, record) {
            warn!(part = index, depth, error = %e, "Skipping undecodable MIME part");
        }

        if let PartType::Message(nested) = &part.body {
            if depth + 1 < MAX_DEPTH {
                walk_parts(nested, depth + 1, record);
            } else {
                debug!(part = index, depth, "Nested message too deep, not descending");
            }
        }
    }
}

/// Assign one part to a body slot or the attachment list.
///
/// Later body parts overwrite earlier ones.
fn collect_part(
    msg: &Message<'_>,
    index: usize,
    part: &MessagePart<'_>,
    record: &mut MessageRecord,
) -> Result<()> {
    let content_type = content_type_of(part);
    let is_attachment = part
        .content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"));

    match content_type.as_str() {
        "text/plain" if !is_attachment => record.text = part_text(msg, index, part)?,
        "text/html" if !is_attachment => record.html = part_text(msg, index, part)?,
        _ if is_attachment => {
            let Some(filename) = part.attachment_name() else {
                debug!(part = index, "Attachment without filename ignored");
                return Ok(());
            };
            if part.is_encoding_problem {
                return Err(WatchError::PartDecode {
                    index,
                    reason: format!("payload of '{filename}' could not be decoded"),
                });
            }
            let content = part.contents().to_vec();
            record.attachments.push(Attachment {
                filename: filename.to_string(),
                content_type: content_type.clone(),
                size: content.len() as u64,
                content,
            });
        }
        _ => {}
    }

    Ok(())
}

/// Lowercased `type/subtype`, defaulting to `text/plain` when the header is absent.
fn content_type_of(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct: &mail_parser::ContentType| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase()
}

/// Text of a body part, strictly decoded with its declared charset.
///
/// An unknown charset or a byte sequence that is invalid in it fails the
/// part instead of producing replacement characters.
fn part_text(msg: &Message<'_>, index: usize, part: &MessagePart<'_>) -> Result<String> {
    let bytes = transfer_decoded(msg, index, part)?;
    let label = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .unwrap_or("utf-8");

    let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        WatchError::PartDecode {
            index,
            reason: format!("unknown charset '{label}'"),
        }
    })?;
    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| WatchError::PartDecode {
            index,
            reason: format!("body is not valid {}", encoding.name()),
        })
}

/// Body bytes of a part with its transfer encoding removed.
fn transfer_decoded(msg: &Message<'_>, index: usize, part: &MessagePart<'_>) -> Result<Vec<u8>> {
    if part.is_encoding_problem {
        return Err(WatchError::PartDecode {
            index,
            reason: "transfer encoding could not be decoded".into(),
        });
    }
    let raw = msg
        .raw_message
        .get(part.offset_body..part.offset_end)
        .ok_or_else(|| WatchError::PartDecode {
            index,
            reason: "part body lies outside the message".into(),
        })?;
    let decoded = match part.encoding {
        Encoding::None => Some(raw.to_vec()),
        Encoding::Base64 => base64_decode(raw),
        Encoding::QuotedPrintable => quoted_printable_decode(raw),
    };
    decoded.ok_or_else(|| WatchError::PartDecode {
        index,
        reason: "transfer encoding could not be decoded".into(),
    })
}
