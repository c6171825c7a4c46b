//! Source feed retrieval: parsing, retrying fetches and concurrent batches.
//!
//! - [`parser`] - Converts RSS/Atom bytes into a [`SourceFeed`] using `feed-rs`
//! - [`fetcher`] - Fetches one URL with bounded, backed-off retries
//! - [`batch`] - Fans out one fetch task per URL and partitions the results
//!
//! # Example
//!
//! ```ignore
//! use feed_digest::feed::{build_client, fetch_all, FetchConfig};
//!
//! let client = build_client("feed-digest")?;
//! let (feeds, failures) = fetch_all(&client, &urls, &FetchConfig::default(), &cancel).await;
//! ```

mod batch;
mod fetcher;
mod parser;
mod types;

pub use batch::fetch_all;
pub use fetcher::{
    build_client, fetch_feed, FetchConfig, FetchError, DEFAULT_INITIAL_BACKOFF,
    DEFAULT_MAX_TRIES, DEFAULT_TIMEOUT,
};
pub use parser::parse_feed;
pub use types::{FetchFailure, FetchResult, RawItem, SourceFeed};
