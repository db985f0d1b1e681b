//! Incremental synchronisation from feeds to Raindrop.
//!
//! For each subscription, in file order and one at a time:
//!
//! 1. note `now` and fetch the feed
//! 2. keep entries published strictly after the watermark (all of them when
//!    there is no usable watermark)
//! 3. send them as bookmarks, batched, into the collection matching the
//!    subscription's category
//! 4. move the watermark to `now` once the send completed
//!
//! A failed fetch or a failed send leaves the watermark alone so the same
//! window is picked up again next run. Items the service refuses inside a
//! completed send are logged and do not hold the watermark back.

mod entry;
mod report;

use chrono::{DateTime, Utc};

use crate::feed::FeedSource;
use crate::raindrop::{
    self, BookmarkApi, BookmarkPayload, CollectionMap, RaindropError, BATCH_SIZE,
};
use crate::store::{Subscription, SubscriptionStore};

pub use entry::{select_new_entries, Entry};
pub use report::{SubscriptionOutcome, SubscriptionReport, SyncReport};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives one synchronisation run.
pub struct SyncEngine<'a, S: ?Sized, A: ?Sized> {
    source: &'a S,
    api: &'a A,
    collections: CollectionMap,
    clock: Clock,
}

impl<'a, S, A> SyncEngine<'a, S, A>
where
    S: FeedSource + ?Sized,
    A: BookmarkApi + ?Sized,
{
    /// Uses an already resolved collection map.
    pub fn new(source: &'a S, api: &'a A, collections: CollectionMap) -> Self {
        Self {
            source,
            api,
            collections,
            clock: Box::new(Utc::now),
        }
    }

    /// Resolves the collections of `group` and builds the engine.
    ///
    /// Fails before any feed is fetched when the group does not exist.
    pub async fn connect(source: &'a S, api: &'a A, group: &str) -> Result<Self, RaindropError> {
        let collections = CollectionMap::resolve(api, group).await?;
        Ok(Self::new(source, api, collections))
    }

    /// Replaces the wall clock used for the sync window.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn collections(&self) -> &CollectionMap {
        &self.collections
    }

    /// Syncs every subscription in `store`, updating watermarks in place.
    ///
    /// The store is not saved; the caller decides whether to persist it.
    pub async fn run(&self, store: &mut SubscriptionStore) -> SyncReport {
        let mut report = SyncReport::default();

        for sub in store.iter_mut() {
            let outcome = self.sync_subscription(sub).await;
            report.push(SubscriptionReport {
                url: sub.url.clone(),
                title: sub.title.clone(),
                outcome,
            });
        }

        report
    }

    /// Runs the fetch, filter, dispatch, watermark sequence for one feed.
    pub async fn sync_subscription(&self, sub: &mut Subscription) -> SubscriptionOutcome {
        tracing::info!(feed = %sub.title, "Fetching");
        let now = (self.clock)();

        let watermark = sub.watermark();
        if watermark.is_none() {
            if let Some(raw) = sub.updated.as_deref() {
                tracing::warn!(
                    feed = %sub.title,
                    updated = %raw,
                    "Unreadable watermark, treating every entry as new"
                );
            }
        }

        let feed = match self.source.fetch(&sub.url).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(
                    feed = %sub.title,
                    url = %sub.url,
                    error = %e,
                    "Fetch failed, watermark left unchanged"
                );
                return SubscriptionOutcome::FailedFetch(e.to_string());
            }
        };

        let entries = select_new_entries(sub, &feed.entries, watermark);
        if entries.is_empty() {
            tracing::info!(feed = %sub.title, "No new entries found");
            return SubscriptionOutcome::Skipped;
        }

        let payloads: Vec<BookmarkPayload> = entries
            .into_iter()
            .map(|entry| entry.into_payload(&self.collections))
            .collect();

        tracing::info!(feed = %sub.title, count = payloads.len(), "Sending entries to Raindrop");
        let responses = match raindrop::submit(self.api, &payloads).await {
            Ok(responses) => responses,
            Err(e) => {
                tracing::error!(
                    feed = %sub.title,
                    error = %e,
                    "Dispatch failed, watermark left unchanged"
                );
                return SubscriptionOutcome::FailedDispatch(e.to_string());
            }
        };

        let rejected = log_rejections(&sub.title, &payloads, &responses);
        sub.advance_watermark(now);

        SubscriptionOutcome::WatermarkUpdated {
            sent: payloads.len(),
            rejected,
        }
    }
}

/// Logs every refusal carried in `responses` and returns how many items were
/// refused.
fn log_rejections(
    feed: &str,
    payloads: &[BookmarkPayload],
    responses: &[raindrop::BatchResponse],
) -> usize {
    let mut rejected = 0;

    for (batch, response) in payloads.chunks(BATCH_SIZE).zip(responses) {
        let failed_items: Vec<_> = response.items.iter().filter(|i| i.failed()).collect();

        for item in &failed_items {
            tracing::error!(
                feed = %feed,
                link = item.link.as_deref().unwrap_or("<unknown>"),
                error = item.error_message.as_deref().unwrap_or("no message"),
                "Raindrop refused item"
            );
        }

        if failed_items.is_empty() && !response.result {
            tracing::error!(
                feed = %feed,
                items = batch.len(),
                error = response.error_message.as_deref().unwrap_or("no message"),
                "Raindrop refused batch"
            );
            rejected += batch.len();
        } else {
            rejected += failed_items.len();
        }
    }

    rejected
}
