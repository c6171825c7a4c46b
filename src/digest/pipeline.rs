use chrono::{DateTime, Utc};
use futures::future::join_all;
use thiserror::Error;

use super::merge::{merge, MergeOptions, MergedFeed};
use super::schedule::Schedule;
use crate::cancel::Cancellation;
use crate::config::Category;
use crate::feed::{fetch_all, FetchConfig, FetchFailure};

/// Errors that stop a run before any fetching starts.
///
/// Per-source failures are never reported through this type; they end up in
/// [`CategoryDigest::failures`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown schedule '{0}' (expected \"daily\" or \"weekly\")")]
    UnknownSchedule(String),
}

/// Everything the pipeline needs besides the categories themselves.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub merge: MergeOptions,
}

impl PipelineConfig {
    fn validate(&self) -> Result<Schedule, PipelineError> {
        self.merge
            .schedule
            .parse::<Schedule>()
            .map_err(|e| PipelineError::UnknownSchedule(e.0))
    }
}

/// Output of one category: the merged feed and the sources that failed.
#[derive(Debug)]
pub struct CategoryDigest {
    pub feed: MergedFeed,
    /// One entry per failed source, in the category's URL order
    pub failures: Vec<FetchFailure>,
}

/// Fetches and merges a single category.
///
/// Returns an error only for configuration problems, checked before any
/// request is made. A category where every source failed yields an empty
/// feed and a full failure list.
pub async fn run_category(
    client: &reqwest::Client,
    category: &Category,
    now: DateTime<Utc>,
    config: &PipelineConfig,
    cancel: &Cancellation,
) -> Result<CategoryDigest, PipelineError> {
    config.validate()?;
    Ok(run_validated(client, category, now, config, cancel).await)
}

/// Runs every category concurrently.
///
/// Digests are returned in the order of `categories`. The schedule is
/// validated once, up front.
pub async fn run_all(
    client: &reqwest::Client,
    categories: &[Category],
    now: DateTime<Utc>,
    config: &PipelineConfig,
    cancel: &Cancellation,
) -> Result<Vec<CategoryDigest>, PipelineError> {
    let schedule = config.validate()?;
    tracing::info!(
        categories = categories.len(),
        schedule = %schedule,
        "Starting digest run"
    );

    let runs = categories
        .iter()
        .map(|category| run_validated(client, category, now, config, cancel));
    Ok(join_all(runs).await)
}

async fn run_validated(
    client: &reqwest::Client,
    category: &Category,
    now: DateTime<Utc>,
    config: &PipelineConfig,
    cancel: &Cancellation,
) -> CategoryDigest {
    let (sources, failures) = fetch_all(client, &category.urls, &config.fetch, cancel).await;
    let feed = merge(&category.kind, &sources, now, &config.merge);

    if sources.is_empty() && !category.urls.is_empty() {
        tracing::warn!(
            category = %category.kind,
            failed = failures.len(),
            "No source feeds could be fetched"
        );
    }
    tracing::info!(
        category = %category.kind,
        fetched = sources.len(),
        failed = failures.len(),
        items = feed.items.len(),
        "Category digest ready"
    );

    CategoryDigest { feed, failures }
}
