//! The local subscription file.
//!
//! A [`SubscriptionStore`] is the in-memory form of the OPML file. Commands
//! follow a load, mutate, save sequence: nothing is written unless the caller
//! invokes [`SubscriptionStore::save`].

mod import;
mod opml;
mod watermark;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::{FeedSource, FetchError};
use crate::util::{clean_title, validate_feed_url, UrlValidationError};

pub use import::{import_file, ImportOutcome};
pub use opml::OpmlError;
pub use watermark::{format_watermark, parse_watermark};

/// Category label used when a subscription has none.
pub const DEFAULT_CATEGORY: &str = "Unsorted";

/// Title used when neither the user nor the feed supplies one.
pub const UNTITLED_FEED: &str = "Untitled Feed";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read subscription file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed subscription file {}: {source}", path.display())]
    Parse { path: PathBuf, source: OpmlError },

    #[error("Failed to write subscription file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode subscriptions: {0}")]
    Encode(OpmlError),

    #[error("Feed already exists.")]
    AlreadyExists(String),

    #[error("Feed does not exist.")]
    NotFound(String),

    #[error("Invalid feed.")]
    InvalidFeed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Import source {} is not a regular file", path.display())]
    NotAFile { path: PathBuf },

    #[error("Failed to back up {} before import: {source}", path.display())]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    /// True for refusals of a single operation (duplicate add, unknown URL,
    /// bad feed). These are reported to the user but are not fatal.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StoreError::AlreadyExists(_)
                | StoreError::NotFound(_)
                | StoreError::InvalidFeed { .. }
                | StoreError::InvalidUrl(_)
        )
    }
}

/// One feed the user is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Feed URL; unique within a store.
    pub url: String,
    pub title: String,
    /// `None` means the feed goes to [`DEFAULT_CATEGORY`].
    pub category: Option<String>,
    /// Raw `updated` attribute, kept verbatim so an unparseable value
    /// survives a save untouched until the next successful sync replaces it.
    pub updated: Option<String>,
}

impl Subscription {
    /// The category entries of this feed are filed under.
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    /// Parsed watermark, or `None` when absent or unparseable.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.updated.as_deref().and_then(parse_watermark)
    }

    /// Moves the watermark to `now`, never backwards.
    pub fn advance_watermark(&mut self, now: DateTime<Utc>) {
        let next = match self.watermark() {
            Some(current) if current > now => current,
            _ => now,
        };
        self.updated = Some(format_watermark(next));
    }
}

/// How `edit` treats the category field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryUpdate {
    Unchanged,
    /// Remove the category; the feed falls back to [`DEFAULT_CATEGORY`].
    Clear,
    Set(String),
}

impl CategoryUpdate {
    /// Maps the `-c` command-line value: absent leaves the category alone,
    /// an empty string clears it, anything else replaces it.
    pub fn from_arg(arg: Option<String>) -> Self {
        match arg {
            None => CategoryUpdate::Unchanged,
            Some(c) if c.is_empty() => CategoryUpdate::Clear,
            Some(c) => CategoryUpdate::Set(c),
        }
    }
}

/// A row produced by [`SubscriptionStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListedSubscription<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionStore {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionStore {
    /// Builds a store from already-decoded subscriptions. Later duplicates of
    /// a URL are dropped.
    pub fn from_subscriptions(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let mut store = Self::default();
        for sub in subscriptions {
            if store.contains(&sub.url) {
                tracing::warn!(
                    url = %sub.url,
                    "Duplicate feed URL in subscription file, keeping the first"
                );
                continue;
            }
            store.subscriptions.push(sub);
        }
        store
    }

    /// Reads the subscription file. A missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let subscriptions = opml::parse_opml(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            feeds = subscriptions.len(),
            "Loaded subscriptions"
        );
        Ok(Self::from_subscriptions(subscriptions))
    }

    /// Overwrites the file at `path` with the current contents.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = opml::export_opml(&self.subscriptions).map_err(StoreError::Encode)?;
        opml::write_atomically(path, content.as_bytes()).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            feeds = self.subscriptions.len(),
            "Saved subscriptions"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    pub fn get(&self, url: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.url == url)
    }

    // Callers outside the crate must not be able to rewrite `url`
    pub(crate) fn get_mut(&mut self, url: &str) -> Option<&mut Subscription> {
        self.subscriptions.iter_mut().find(|s| s.url == url)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Subscription> {
        self.subscriptions.iter_mut()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subscription> {
        self.subscriptions.iter()
    }

    /// Subscribes to `url`.
    ///
    /// The feed is fetched once to prove it parses; its channel title is used
    /// when `title` is `None`. An empty `category` is stored as no category.
    pub async fn add<S>(
        &mut self,
        source: &S,
        url: &str,
        title: Option<String>,
        category: Option<String>,
    ) -> Result<&Subscription, StoreError>
    where
        S: FeedSource + ?Sized,
    {
        if self.contains(url) {
            return Err(StoreError::AlreadyExists(url.to_string()));
        }
        validate_feed_url(url)?;

        let feed = source
            .fetch(url)
            .await
            .map_err(|source| StoreError::InvalidFeed {
                url: url.to_string(),
                source,
            })?;

        let title = title
            .map(|t| clean_title(&t))
            .filter(|t| !t.is_empty())
            .or(feed.title)
            .unwrap_or_else(|| UNTITLED_FEED.to_string());

        tracing::info!(url = %url, title = %title, "Adding feed");
        self.subscriptions.push(Subscription {
            url: url.to_string(),
            title,
            category: category.filter(|c| !c.is_empty()),
            updated: None,
        });

        Ok(&self.subscriptions[self.subscriptions.len() - 1])
    }

    pub fn remove(&mut self, url: &str) -> Result<Subscription, StoreError> {
        let index = self
            .subscriptions
            .iter()
            .position(|s| s.url == url)
            .ok_or_else(|| StoreError::NotFound(url.to_string()))?;

        tracing::info!(url = %url, "Removing feed");
        Ok(self.subscriptions.remove(index))
    }

    pub fn edit(
        &mut self,
        url: &str,
        title: Option<String>,
        category: CategoryUpdate,
    ) -> Result<&Subscription, StoreError> {
        let sub = self
            .get_mut(url)
            .ok_or_else(|| StoreError::NotFound(url.to_string()))?;

        if let Some(title) = title {
            sub.title = title;
        }
        match category {
            CategoryUpdate::Unchanged => {}
            CategoryUpdate::Clear => sub.category = None,
            CategoryUpdate::Set(c) => sub.category = Some(c),
        }

        tracing::info!(url = %url, title = %sub.title, category = ?sub.category, "Edited feed");
        Ok(sub)
    }

    /// `(title, category, url)` rows in file order. The iterator borrows the
    /// store and can be cloned to walk it again.
    pub fn list(&self) -> impl Iterator<Item = ListedSubscription<'_>> + Clone + '_ {
        self.subscriptions.iter().map(|s| ListedSubscription {
            title: &s.title,
            category: s.category_or_default(),
            url: &s.url,
        })
    }
}

impl<'a> IntoIterator for &'a SubscriptionStore {
    type Item = &'a Subscription;
    type IntoIter = std::slice::Iter<'a, Subscription>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscriptions.iter()
    }
}
