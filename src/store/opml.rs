//! Reading and writing the OPML subscription file.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;

use super::Subscription;

/// Maximum allowed nesting depth for `<outline>` elements.
const MAX_OPML_DEPTH: usize = 50;

const HEAD_TITLE: &str = "Rainfeeds";

/// Errors that can occur while decoding or encoding OPML.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// Outline nesting depth exceeds the safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The document has no `<opml>` root element.
    #[error("document is not OPML (no <opml> element)")]
    NotOpml,

    /// Serializing the document failed.
    #[error("XML write error: {0}")]
    XmlWrite(String),
}

/// Decodes every `<outline>` carrying an `xmlUrl` into a [`Subscription`],
/// in document order.
///
/// Folder outlines without `xmlUrl` are walked through but not returned.
/// Entity declarations are never expanded: quick-xml only resolves the five
/// predefined XML entities and rejects anything else.
pub(crate) fn parse_opml(content: &str) -> Result<Vec<Subscription>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut subscriptions = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"opml" => seen_root = true,
            Ok(Event::Empty(e)) if e.name().as_ref() == b"opml" => seen_root = true,
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                if let Some(sub) = outline_to_subscription(&e, &reader)? {
                    subscriptions.push(sub);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                if let Some(sub) = outline_to_subscription(&e, &reader)? {
                    subscriptions.push(sub);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(OpmlError::NotOpml);
    }

    Ok(subscriptions)
}

fn outline_to_subscription(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<Subscription>, OpmlError> {
    let mut url = None;
    let mut text = None;
    let mut title = None;
    let mut category = None;
    let mut updated = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| OpmlError::XmlParse(e.to_string()))?
            .into_owned();

        match attr.key.as_ref() {
            b"xmlUrl" => url = Some(value),
            b"text" => text = Some(value),
            b"title" => title = Some(value),
            b"category" => category = Some(value),
            b"updated" => updated = Some(value),
            _ => {}
        }
    }

    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return Ok(None);
    };

    Ok(Some(Subscription {
        title: text.or(title).unwrap_or_else(|| url.clone()),
        url,
        category: category.filter(|c| !c.is_empty()),
        updated,
    }))
}

/// Encodes subscriptions as an OPML 2.0 document.
pub(crate) fn export_opml(subscriptions: &[Subscription]) -> Result<String, OpmlError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));

    let mut events = vec![
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        Event::Start(opml),
        Event::Start(BytesStart::new("head")),
        Event::Start(BytesStart::new("title")),
        Event::Text(BytesText::new(HEAD_TITLE)),
        Event::End(BytesEnd::new("title")),
        Event::End(BytesEnd::new("head")),
        Event::Start(BytesStart::new("body")),
    ];

    for sub in subscriptions {
        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("text", sub.title.as_str()));
        outline.push_attribute(("type", "rss"));
        outline.push_attribute(("xmlUrl", sub.url.as_str()));
        if let Some(category) = &sub.category {
            outline.push_attribute(("category", category.as_str()));
        }
        if let Some(updated) = &sub.updated {
            outline.push_attribute(("updated", updated.as_str()));
        }
        events.push(Event::Empty(outline));
    }

    events.push(Event::End(BytesEnd::new("body")));
    events.push(Event::End(BytesEnd::new("opml")));

    for event in events {
        writer
            .write_event(event)
            .map_err(|e| OpmlError::XmlWrite(e.to_string()))?;
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| OpmlError::XmlWrite(e.to_string()))
}

/// Replaces `path` with `content` without ever leaving a partial file behind.
///
/// The content goes to a randomly named sibling first, is synced to disk,
/// then renamed over the destination.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Unpredictable temp name so nobody can plant a symlink there first
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let result = (|| {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);

        // Windows refuses to rename over an existing file
        #[cfg(windows)]
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        std::fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}
