use chrono::{DateTime, SubsecRound, Utc};

use crate::feed::FeedEntry;
use crate::raindrop::{BookmarkPayload, CollectionMap};
use crate::store::Subscription;

/// A feed entry tagged with where it came from, ready to become a bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub published: DateTime<Utc>,
    pub link: String,
    /// Title of the subscription the entry was read from.
    pub publisher: String,
    /// Subscription category, or `Unsorted`.
    pub category: String,
}

impl Entry {
    pub fn into_payload(self, collections: &CollectionMap) -> BookmarkPayload {
        BookmarkPayload {
            collection_id: collections.lookup(&self.category),
            created: self.published,
            tags: vec![self.publisher],
            link: self.link,
        }
    }
}

/// Entries of `sub` newer than `watermark`, in feed order.
///
/// With no watermark every entry is new. Equality with the watermark counts
/// as already synced. Watermarks are stored to the second, so timestamps are
/// compared with their sub-second part dropped.
pub fn select_new_entries(
    sub: &Subscription,
    entries: &[FeedEntry],
    watermark: Option<DateTime<Utc>>,
) -> Vec<Entry> {
    entries
        .iter()
        .filter(|e| {
            watermark.map_or(true, |w| e.published.trunc_subsecs(0) > w.trunc_subsecs(0))
        })
        .map(|e| Entry {
            published: e.published,
            link: e.link.clone(),
            publisher: sub.title.clone(),
            category: sub.category_or_default().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raindrop::UNSORTED_COLLECTION_ID;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn entries() -> Vec<FeedEntry> {
        [3, 1, 2]
            .into_iter()
            .map(|h| FeedEntry {
                published: at(h),
                link: format!("https://example.com/{h}"),
            })
            .collect()
    }

    fn subscription(category: Option<&str>) -> Subscription {
        Subscription {
            url: "https://example.com/feed".into(),
            title: "Example".into(),
            category: category.map(Into::into),
            updated: None,
        }
    }

    #[test]
    fn test_no_watermark_keeps_everything_in_feed_order() {
        let selected = select_new_entries(&subscription(None), &entries(), None);
        let links: Vec<_> = selected.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/3",
                "https://example.com/1",
                "https://example.com/2"
            ]
        );
        assert!(selected.iter().all(|e| e.category == "Unsorted"));
        assert!(selected.iter().all(|e| e.publisher == "Example"));
    }

    #[test]
    fn test_watermark_is_strict() {
        let selected = select_new_entries(&subscription(Some("Tech")), &entries(), Some(at(2)));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].published, at(3));
        assert_eq!(selected[0].category, "Tech");
    }

    #[test]
    fn test_same_second_as_watermark_is_not_new() {
        let watermark = at(2);
        let entries = vec![
            FeedEntry {
                published: watermark + chrono::Duration::milliseconds(400),
                link: "https://example.com/same-second".into(),
            },
            FeedEntry {
                published: watermark + chrono::Duration::seconds(1),
                link: "https://example.com/next-second".into(),
            },
        ];

        let selected = select_new_entries(&subscription(None), &entries, Some(watermark));
        let links: Vec<_> = selected.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(links, vec!["https://example.com/next-second"]);
    }

    #[test]
    fn test_watermark_after_everything() {
        assert!(select_new_entries(&subscription(None), &entries(), Some(at(5))).is_empty());
    }

    #[test]
    fn test_into_payload_resolves_collection() {
        let map = CollectionMap::from_titles([("Tech", 10)]);
        let entry = Entry {
            published: at(1),
            link: "https://example.com/1".into(),
            publisher: "Example".into(),
            category: "Tech".into(),
        };

        let payload = entry.clone().into_payload(&map);
        assert_eq!(payload.collection_id, 10);
        assert_eq!(payload.tags, vec!["Example".to_string()]);
        assert_eq!(payload.created, at(1));

        let unmapped = Entry {
            category: "Cooking".into(),
            ..entry
        }
        .into_payload(&map);
        assert_eq!(unmapped.collection_id, UNSORTED_COLLECTION_ID);
    }
}
