//! Small helpers shared by the store and the feed layer.
//!
//! - **URL validation**: refuse feed URLs that are not public http(s) locations
//! - **Title cleanup**: make remote feed titles safe to store and print

mod text;
mod url_validator;

pub use text::clean_title;
pub use url_validator::{validate_feed_url, UrlValidationError};
