//! Writers that turn digests into files.
//!
//! - [`atom`] - One Atom 1.0 document per category
//! - [`report`] - Failure report (JSON) and run summary

mod atom;
mod report;

pub use atom::{atom_file_name, category_file_stem, render_atom, write_atom_file};
pub use report::{failure_records, render_summary, write_failure_report, FailureRecord};

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes `content` to `path` without ever leaving a partial file behind.
///
/// The content goes to a sibling temporary file (`<name>.tmp.<nanos>`), is
/// synced to disk, then renamed over the destination. The temporary file is
/// removed on any failure.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path);
    let result = write_synced(&temp_path, content).and_then(|()| replace(&temp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    path.with_extension(format!("tmp.{nanos:016x}"))
}

fn write_synced(temp_path: &Path, content: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .with_context(|| format!("Failed to create temporary file '{}'", temp_path.display()))?;
    file.write_all(content)
        .with_context(|| format!("Failed to write '{}'", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync '{}' to disk", temp_path.display()))
}

fn replace(temp_path: &Path, path: &Path) -> Result<()> {
    // Windows refuses to rename over an existing file
    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to replace existing '{}'", path.display()))?;
    }
    std::fs::rename(temp_path, path).with_context(|| {
        format!(
            "Failed to move '{}' into place at '{}'",
            temp_path.display(),
            path.display()
        )
    })
}
