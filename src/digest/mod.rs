//! Digest construction: schedule windows, merging and the per-category
//! pipeline.
//!
//! - [`schedule`] - Schedule names, lookback durations and window checks
//! - [`merge`] - Ordered, deduplicated, windowed merge of source feeds
//! - [`pipeline`] - Fetch + merge for each configured category

mod merge;
mod pipeline;
mod schedule;

pub use merge::{merge, MergeOptions, MergedFeed, MergedItem, UndatedPolicy};
pub use pipeline::{run_all, run_category, CategoryDigest, PipelineConfig, PipelineError};
pub use schedule::{duration_for, in_window, start_of_day, Schedule, UnknownSchedule};
