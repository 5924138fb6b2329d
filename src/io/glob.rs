//! File globbing for folder-level batches.
//!
//! A split run leaves its output as `output_<n>.csv` files in one folder; the
//! folder variant of the orchestrator picks those up with [`csv_files_in`].

use anyhow::{Context, Result};
use glob::{Pattern, glob};
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories matching the pattern are skipped. Zero matches is not an error.
///
/// # Errors
/// Returns an error if the pattern is invalid or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }

    // Sort for deterministic order
    result.sort();

    Ok(result)
}

/// All `*.csv` files directly inside `folder` (not recursive), sorted.
///
/// Glob metacharacters in the folder name are escaped.
///
/// # Errors
/// See [`expand_glob`].
pub fn csv_files_in(folder: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let folder = folder.as_ref().to_string_lossy();
    let pattern = format!("{}/*.csv", Pattern::escape(&folder));
    expand_glob(&pattern)
}
