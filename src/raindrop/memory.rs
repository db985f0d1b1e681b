use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    BatchResponse, BookmarkApi, BookmarkPayload, Collection, CollectionId, Group, ItemResult,
    RaindropError, User,
};

/// [`BookmarkApi`] kept entirely in memory.
///
/// Every `create_raindrops` call that reaches the service is recorded as
/// submitted, so callers can inspect exactly which batches were sent. Links
/// registered with [`reject_link`] come back as failed items and are left out
/// of [`created`]. [`fail_creates`] turns every create call into a transport
/// failure, [`fail_create_call`] only the n-th one.
///
/// [`reject_link`]: InMemoryBookmarkApi::reject_link
/// [`created`]: InMemoryBookmarkApi::created
/// [`fail_creates`]: InMemoryBookmarkApi::fail_creates
/// [`fail_create_call`]: InMemoryBookmarkApi::fail_create_call
#[derive(Debug, Default)]
pub struct InMemoryBookmarkApi {
    groups: Vec<Group>,
    collections: HashMap<CollectionId, Collection>,
    rejected_links: HashSet<String>,
    fail_creates: AtomicBool,
    /// 1-based create call to fail; 0 means none.
    fail_on_call: AtomicUsize,
    create_calls: AtomicUsize,
    collection_lookups: AtomicUsize,
    batches: Mutex<Vec<Vec<BookmarkPayload>>>,
    accepted: Mutex<Vec<BookmarkPayload>>,
}

impl InMemoryBookmarkApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, title: &str, collections: &[CollectionId]) -> Self {
        self.groups.push(Group {
            title: title.to_string(),
            collections: collections.to_vec(),
        });
        self
    }

    pub fn with_collection(mut self, id: CollectionId, title: &str) -> Self {
        self.collections.insert(
            id,
            Collection {
                id,
                title: title.to_string(),
            },
        );
        self
    }

    pub fn reject_link(mut self, link: &str) -> Self {
        self.rejected_links.insert(link.to_string());
        self
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Fails only the `call`-th create call (counting from 1) with a
    /// transport error. Calls before and after it go through.
    pub fn fail_create_call(&self, call: usize) {
        self.fail_on_call.store(call, Ordering::SeqCst);
    }

    /// Every batch submitted so far, rejected links included, in call order.
    /// Calls that failed at the transport level are not recorded.
    pub fn batches(&self) -> Vec<Vec<BookmarkPayload>> {
        lock(&self.batches).clone()
    }

    /// Every item the service accepted so far, flattened.
    pub fn created(&self) -> Vec<BookmarkPayload> {
        lock(&self.accepted).clone()
    }

    pub fn collection_lookups(&self) -> usize {
        self.collection_lookups.load(Ordering::SeqCst)
    }

}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl BookmarkApi for InMemoryBookmarkApi {
    async fn get_user(&self) -> Result<User, RaindropError> {
        Ok(User {
            groups: self.groups.clone(),
        })
    }

    async fn get_collection(&self, id: CollectionId) -> Result<Collection, RaindropError> {
        self.collection_lookups.fetch_add(1, Ordering::SeqCst);
        self.collections
            .get(&id)
            .cloned()
            .ok_or_else(|| RaindropError::HttpStatus {
                status: 404,
                message: Some(format!("collection {id} not found")),
            })
    }

    async fn create_raindrops(
        &self,
        items: &[BookmarkPayload],
    ) -> Result<BatchResponse, RaindropError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_creates.load(Ordering::SeqCst)
            || self.fail_on_call.load(Ordering::SeqCst) == call
        {
            return Err(RaindropError::HttpStatus {
                status: 503,
                message: Some("in-memory create failure".to_string()),
            });
        }

        let results: Vec<ItemResult> = items
            .iter()
            .map(|item| {
                if self.rejected_links.contains(&item.link) {
                    ItemResult {
                        result: Some(false),
                        error_message: Some(format!("rejected link {}", item.link)),
                        link: Some(item.link.clone()),
                    }
                } else {
                    ItemResult {
                        result: Some(true),
                        error_message: None,
                        link: Some(item.link.clone()),
                    }
                }
            })
            .collect();

        lock(&self.batches).push(items.to_vec());
        lock(&self.accepted).extend(
            items
                .iter()
                .filter(|item| !self.rejected_links.contains(&item.link))
                .cloned(),
        );

        let all_ok = results.iter().all(|r| !r.failed());
        Ok(BatchResponse {
            result: all_ok,
            error_message: (!all_ok).then(|| "some items were rejected".to_string()),
            items: results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn payload(link: &str) -> BookmarkPayload {
        BookmarkPayload {
            link: link.to_string(),
            created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tags: vec!["Feed".into()],
            collection_id: -1,
        }
    }

    #[tokio::test]
    async fn test_batches_record_rejected_links_too() {
        let api = InMemoryBookmarkApi::new().reject_link("https://example.com/bad");
        let items = vec![payload("https://example.com/ok"), payload("https://example.com/bad")];

        let response = api.create_raindrops(&items).await.unwrap();

        assert!(!response.result);
        assert_eq!(api.batches(), vec![items.clone()]);
        assert_eq!(api.created(), vec![items[0].clone()]);
    }

    #[tokio::test]
    async fn test_fail_create_call_fails_only_that_call() {
        let api = InMemoryBookmarkApi::new();
        api.fail_create_call(2);
        let items = vec![payload("https://example.com/a")];

        assert!(api.create_raindrops(&items).await.is_ok());
        assert!(matches!(
            api.create_raindrops(&items).await,
            Err(RaindropError::HttpStatus { status: 503, .. })
        ));
        assert!(api.create_raindrops(&items).await.is_ok());
        assert_eq!(api.batches().len(), 2);
    }
}
