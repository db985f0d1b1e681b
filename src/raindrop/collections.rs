use std::collections::HashMap;

use super::{BookmarkApi, CollectionId, RaindropError, UNSORTED_COLLECTION_ID};
use crate::store::DEFAULT_CATEGORY;

/// Category label to collection id, discovered once per sync run.
///
/// Always maps [`DEFAULT_CATEGORY`] to [`UNSORTED_COLLECTION_ID`], even when
/// the account has a real collection with that title. When two collections
/// in the group share a title, the one fetched last wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMap {
    ids: HashMap<String, CollectionId>,
}

impl Default for CollectionMap {
    fn default() -> Self {
        Self::from_titles(std::iter::empty::<(&str, CollectionId)>())
    }
}

impl CollectionMap {
    /// Builds a map from `(title, id)` pairs in order.
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = (S, CollectionId)>,
        S: Into<String>,
    {
        let mut ids = HashMap::new();
        for (title, id) in titles {
            let title = title.into();
            if let Some(previous) = ids.insert(title.clone(), id) {
                tracing::debug!(
                    title = %title,
                    previous,
                    id,
                    "Duplicate collection title, keeping the later one"
                );
            }
        }
        ids.insert(DEFAULT_CATEGORY.to_string(), UNSORTED_COLLECTION_ID);
        Self { ids }
    }

    /// Looks up `group` among the account's groups and fetches the title of
    /// each collection in it.
    ///
    /// # Errors
    ///
    /// [`RaindropError::GroupNotFound`] when no group has exactly that title;
    /// any error from the API calls is passed through.
    pub async fn resolve<A>(api: &A, group: &str) -> Result<Self, RaindropError>
    where
        A: BookmarkApi + ?Sized,
    {
        let user = api.get_user().await?;
        let group_entry = user
            .groups
            .into_iter()
            .find(|g| g.title == group)
            .ok_or_else(|| RaindropError::GroupNotFound(group.to_string()))?;

        let mut titles = Vec::with_capacity(group_entry.collections.len());
        for id in group_entry.collections {
            let collection = api.get_collection(id).await?;
            titles.push((collection.title, collection.id));
        }

        let map = Self::from_titles(titles);
        tracing::info!(
            group = %group,
            collections = map.ids.len() - 1,
            "Resolved Raindrop collections"
        );
        Ok(map)
    }

    /// Collection id for `category`, or the Unsorted id when it is unknown.
    pub fn lookup(&self, category: &str) -> CollectionId {
        self.ids
            .get(category)
            .copied()
            .unwrap_or(UNSORTED_COLLECTION_ID)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.ids.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raindrop::InMemoryBookmarkApi;

    fn api() -> InMemoryBookmarkApi {
        InMemoryBookmarkApi::new()
            .with_group("Inbox", &[10, 11, 12])
            .with_group("Other", &[20])
            .with_collection(10, "Tech")
            .with_collection(11, "News")
            .with_collection(12, "Unsorted")
            .with_collection(20, "Elsewhere")
    }

    #[tokio::test]
    async fn test_resolve_group_collections() {
        let api = api();
        let map = CollectionMap::resolve(&api, "Inbox").await.unwrap();

        assert_eq!(map.lookup("Tech"), 10);
        assert_eq!(map.lookup("News"), 11);
        assert!(!map.contains("Elsewhere"));
        assert_eq!(api.collection_lookups(), 3);
    }

    #[tokio::test]
    async fn test_unsorted_is_always_sentinel() {
        let map = CollectionMap::resolve(&api(), "Inbox").await.unwrap();
        assert_eq!(map.lookup(DEFAULT_CATEGORY), UNSORTED_COLLECTION_ID);
    }

    #[tokio::test]
    async fn test_unknown_category_falls_back() {
        let map = CollectionMap::resolve(&api(), "Inbox").await.unwrap();
        assert_eq!(map.lookup("Recipes"), UNSORTED_COLLECTION_ID);
        assert_eq!(map.lookup(""), UNSORTED_COLLECTION_ID);
        // Exact match only
        assert_eq!(map.lookup("tech"), UNSORTED_COLLECTION_ID);
    }

    #[tokio::test]
    async fn test_missing_group_is_error() {
        let result = CollectionMap::resolve(&api(), "Reading List").await;
        assert!(matches!(result, Err(RaindropError::GroupNotFound(g)) if g == "Reading List"));
    }

    #[tokio::test]
    async fn test_missing_collection_propagates() {
        let api = InMemoryBookmarkApi::new().with_group("Inbox", &[404]);
        assert!(CollectionMap::resolve(&api, "Inbox").await.is_err());
    }

    #[test]
    fn test_duplicate_titles_last_wins() {
        let map = CollectionMap::from_titles([("Tech", 1), ("Tech", 2)]);
        assert_eq!(map.lookup("Tech"), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_default_map_has_only_unsorted() {
        let map = CollectionMap::default();
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup("anything"), UNSORTED_COLLECTION_ID);
    }
}
