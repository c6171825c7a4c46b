//! Merges many RSS/Atom feeds into categorized digest feeds.
//!
//! A run fetches every source URL of every configured category
//! concurrently, tolerating individual failures, then merges each
//! category's feeds into one deduplicated, time-windowed [`MergedFeed`]
//! that is written out as Atom.
//!
//! [`MergedFeed`]: digest::MergedFeed

pub mod cancel;
pub mod config;
pub mod digest;
pub mod feed;
pub mod output;
pub mod util;
