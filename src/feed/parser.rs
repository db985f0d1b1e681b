use chrono::{DateTime, Utc};
use feed_rs::parser;

use crate::util::clean_title;

/// One feed item reduced to what the sync pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// `published`, falling back to `updated` when the feed omits it.
    pub published: DateTime<Utc>,
    pub link: String,
}

/// Result of parsing a feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Channel title, if the feed declares a non-blank one.
    pub title: Option<String>,
    /// Usable entries in document order.
    pub entries: Vec<FeedEntry>,
    /// Entries dropped because they had no timestamp or no link.
    pub skipped: usize,
}

pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| clean_title(&t.content))
        .filter(|t| !t.is_empty());

    let mut entries = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0;

    for entry in feed.entries {
        let published = entry.published.or(entry.updated);
        let link = entry
            .links
            .into_iter()
            .map(|l| l.href.trim().to_string())
            .find(|href| !href.is_empty());

        match (published, link) {
            (Some(published), Some(link)) => entries.push(FeedEntry { published, link }),
            _ => skipped += 1,
        }
    }

    Ok(ParsedFeed {
        title,
        entries,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example
      Weekly</title>
    <item>
        <title>First</title>
        <link>https://example.com/1</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
        <title>No date</title>
        <link>https://example.com/2</link>
    </item>
    <item>
        <title>Second</title>
        <link>https://example.com/3</link>
        <pubDate>Tue, 02 Jan 2024 10:00:00 +0100</pubDate>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_entries() {
        let parsed = parse_feed(RSS.as_bytes()).unwrap();

        assert_eq!(parsed.title.as_deref(), Some("Example Weekly"));
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].link, "https://example.com/1");
        assert_eq!(
            parsed.entries[0].published,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
        // Offsets are normalized to UTC
        assert_eq!(
            parsed.entries[1].published,
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_atom_updated_is_fallback_timestamp() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-03-01T12:00:00Z</updated>
  <entry>
    <title>Only updated</title>
    <link href="https://example.com/atom/1"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-03-01T12:00:00Z</updated>
  </entry>
</feed>"#;

        let parsed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Atom Example"));
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(
            parsed.entries[0].published,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_untitled_feed_has_no_title() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>  </title></channel></rss>"#;
        let parsed = parse_feed(rss.as_bytes()).unwrap();
        assert!(parsed.title.is_none());
        assert!(parsed.entries.is_empty());
    }

    #[test]
    fn test_not_a_feed() {
        assert!(parse_feed(b"<html><body>hello</body></html>").is_err());
        assert!(parse_feed(b"<not valid xml").is_err());
    }
}
