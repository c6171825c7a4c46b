use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use super::write_atomically;
use crate::digest::CategoryDigest;

/// One failed source, flattened for the JSON report.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FailureRecord<'a> {
    pub category: &'a str,
    pub url: &'a str,
    pub message: &'a str,
    pub attempts: u32,
    pub cancelled: bool,
}

/// Flattens every category's failures, keeping category then URL order.
pub fn failure_records(digests: &[CategoryDigest]) -> Vec<FailureRecord<'_>> {
    digests
        .iter()
        .flat_map(|digest| {
            digest.failures.iter().map(move |failure| FailureRecord {
                category: &digest.feed.kind,
                url: &failure.url,
                message: &failure.message,
                attempts: failure.attempts,
                cancelled: failure.is_cancelled(),
            })
        })
        .collect()
}

/// Writes the failure report as pretty-printed JSON.
///
/// The file is written even when nothing failed (an empty array), so a
/// stale report from an earlier run never survives.
pub fn write_failure_report(digests: &[CategoryDigest], path: &Path) -> Result<()> {
    let records = failure_records(digests);
    let json = serde_json::to_vec_pretty(&records).context("Failed to serialize failure report")?;
    write_atomically(path, &json)?;
    tracing::info!(
        path = %path.display(),
        failures = records.len(),
        "Wrote failure report"
    );
    Ok(())
}

/// One line per category plus one line per failed source.
pub fn render_summary(digests: &[CategoryDigest]) -> String {
    let mut out = String::new();
    for digest in digests {
        let _ = writeln!(
            out,
            "{}: {} items, {} failed sources",
            digest.feed.kind,
            digest.feed.items.len(),
            digest.failures.len()
        );
        for failure in &digest.failures {
            let _ = writeln!(out, "  ✗ {}: {}", failure.url, failure.message);
        }
    }
    out
}
