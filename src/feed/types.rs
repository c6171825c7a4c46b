use chrono::{DateTime, Utc};

use super::fetcher::FetchError;

/// One item exactly as it appeared in a parsed source feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    /// Item link; the empty string when the entry carried none.
    pub link: String,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A successfully fetched and parsed source feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFeed {
    /// URL the feed was fetched from
    pub url: String,
    /// Feed title, falling back to the URL when the document has none
    pub title: String,
    /// Items in the feed's native order
    pub items: Vec<RawItem>,
}

/// A source URL that could not be turned into a [`SourceFeed`].
#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    /// Human-readable summary of the failure
    pub message: String,
    /// The last underlying cause
    pub cause: FetchError,
    /// Number of attempts made; 0 when the URL was rejected before any request
    pub attempts: u32,
}

impl FetchFailure {
    pub fn new(url: &str, cause: FetchError, attempts: u32) -> Self {
        let message = if attempts > 1 {
            format!("{cause} (after {attempts} attempts)")
        } else {
            cause.to_string()
        };
        Self {
            url: url.to_owned(),
            message,
            cause,
            attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, FetchError::Cancelled)
    }
}

/// Outcome of fetching one source URL.
pub type FetchResult = Result<SourceFeed, FetchFailure>;
