//! Forward new RSS/Atom entries to Raindrop.io.
//!
//! Subscriptions live in an OPML file ([`store`]). A sync run fetches each
//! feed ([`feed`]), keeps entries newer than the subscription's watermark,
//! and creates them as bookmarks in the collection named after the
//! subscription's category ([`raindrop`], [`sync`]).

pub mod config;
pub mod feed;
pub mod raindrop;
pub mod store;
pub mod sync;
pub mod util;
