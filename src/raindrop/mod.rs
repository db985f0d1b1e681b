//! Raindrop.io side of the pipeline.
//!
//! - [`BookmarkApi`] is the seam: [`RaindropClient`] talks HTTP,
//!   [`InMemoryBookmarkApi`] keeps everything in process for tests and dry runs
//! - [`CollectionMap`] turns category labels into collection ids
//! - [`submit`] sends bookmarks in fixed-size batches

mod client;
mod collections;
mod dispatch;
mod memory;
mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{RaindropClient, DEFAULT_API_BASE_URL};
pub use collections::CollectionMap;
pub use dispatch::{submit, BATCH_SIZE};
pub use memory::InMemoryBookmarkApi;
pub use types::{
    BatchResponse, BookmarkPayload, Collection, CollectionId, Group, ItemResult, User,
    UNSORTED_COLLECTION_ID,
};

/// Errors from the bookmarking service.
#[derive(Debug, Error)]
pub enum RaindropError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Non-2xx response the caller cannot act on.
    #[error("HTTP error: status {status}{}", detail(message))]
    HttpStatus { status: u16, message: Option<String> },

    /// The body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// The base URL would send the token in clear text.
    #[error("Insecure API base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,

    /// The configured group is not among the account's groups.
    #[error("Raindrop group \"{0}\" not found")]
    GroupNotFound(String),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

/// The three calls the sync pipeline makes against the bookmarking service.
#[async_trait]
pub trait BookmarkApi: Send + Sync {
    /// `GET /user`
    async fn get_user(&self) -> Result<User, RaindropError>;

    /// `GET /collection/{id}`
    async fn get_collection(&self, id: CollectionId) -> Result<Collection, RaindropError>;

    /// `POST /raindrops` with every item in `items`. An `Ok` means the call
    /// completed; individual items may still have been refused.
    async fn create_raindrops(
        &self,
        items: &[BookmarkPayload],
    ) -> Result<BatchResponse, RaindropError>;
}
