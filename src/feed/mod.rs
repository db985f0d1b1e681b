//! Reading RSS and Atom feeds.
//!
//! - [`parser`] turns feed XML into dated entries using `feed-rs`
//! - [`fetcher`] defines the [`FeedSource`] seam and its HTTP implementation

mod fetcher;
mod parser;

pub use fetcher::{FeedSource, FetchError, HttpFeedSource};
pub use parser::{parse_feed, FeedEntry, ParsedFeed};
