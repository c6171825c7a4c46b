use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::schedule::{duration_for, in_window, Schedule};
use crate::feed::SourceFeed;

/// What to do with items that carry neither a published nor an updated date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndatedPolicy {
    /// Stamp them with the merge time; they always pass the window.
    #[default]
    Now,
    /// Drop them.
    Skip,
}

/// Merge settings shared by every category of a run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Schedule name; unknown names yield an empty merge
    pub schedule: String,
    /// Items considered per source feed, in native order
    pub feed_limit: usize,
    pub undated: UndatedPolicy,
    /// Re-sort the output by `created_at`, newest first
    pub sort_by_date: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            schedule: Schedule::default().as_str().to_string(),
            feed_limit: 20,
            undated: UndatedPolicy::default(),
            sort_by_date: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedItem {
    pub title: String,
    pub link: String,
    /// Title of the source feed the item came from
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl MergedItem {
    /// Entry title as shown in rendered output.
    pub fn display_title(&self, hide_author: bool) -> String {
        if hide_author {
            self.title.clone()
        } else {
            format!("[{}] {}", self.author, self.title)
        }
    }
}

/// The merged digest of one category.
///
/// No two items share a `link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFeed {
    pub kind: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<MergedItem>,
}

impl MergedFeed {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Merges source feeds into one deduplicated, windowed feed.
///
/// Sources are walked in the given order and each source's items in native
/// order. At most `feed_limit` items are considered per source, counting
/// items that are later skipped. An item is skipped when its link was already
/// emitted (first seen wins across the whole merge) or when its date falls
/// outside the schedule window.
///
/// Output order is source order, then native order, unless
/// `options.sort_by_date` asks for newest-first. The result depends only on
/// the inputs, so repeated calls with the same `now` are identical.
pub fn merge(
    kind: &str,
    sources: &[SourceFeed],
    now: DateTime<Utc>,
    options: &MergeOptions,
) -> MergedFeed {
    if duration_for(&options.schedule).is_none() {
        tracing::warn!(
            category = %kind,
            schedule = %options.schedule,
            "Unknown schedule, merged feed will be empty"
        );
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut items = Vec::new();

    for source in sources {
        for item in source.items.iter().take(options.feed_limit) {
            let created_at = match (item.published.or(item.updated), options.undated) {
                (Some(date), _) => date,
                (None, UndatedPolicy::Now) => now,
                (None, UndatedPolicy::Skip) => continue,
            };

            if seen.contains(item.link.as_str()) {
                continue;
            }
            if !in_window(created_at, now, &options.schedule) {
                continue;
            }

            seen.insert(item.link.as_str());
            items.push(MergedItem {
                title: item.title.clone(),
                link: item.link.clone(),
                author: source.title.clone(),
                created_at,
            });
        }
    }

    if options.sort_by_date {
        // Stable: equal timestamps keep source order
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    tracing::debug!(
        category = %kind,
        sources = sources.len(),
        items = items.len(),
        "Merged category"
    );

    MergedFeed {
        kind: kind.to_string(),
        description: format!("Merged feeds from {kind}"),
        created_at: now,
        items,
    }
}
