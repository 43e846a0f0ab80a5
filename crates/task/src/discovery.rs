//! Notebook discovery

use nbrun_core::{Error, Job, Result, CHECKPOINT_DIR, NOTEBOOK_EXTENSION};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Find the notebooks under `root`.
///
/// A file root is the only job. A directory is walked recursively for
/// `*.ipynb`, skipping checkpoint directories. Paths are canonicalised,
/// de-duplicated and sorted so submission order is deterministic.
pub fn discover(root: &Path, timeout_secs: u64) -> Result<Vec<Job>> {
    let metadata = fs::metadata(root).map_err(|e| Error::discovery(root, e.to_string()))?;

    if metadata.is_file() {
        let path = canonical(root)?;
        return Ok(vec![Job::new(path, timeout_secs)]);
    }

    let mut found = BTreeSet::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_checkpoint_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path during discovery");
                continue;
            }
        };
        if is_notebook(&entry) {
            found.insert(canonical(entry.path())?);
        }
    }

    tracing::debug!(root = %root.display(), notebooks = found.len(), "Discovery finished");
    Ok(found
        .into_iter()
        .map(|path| Job::new(path, timeout_secs))
        .collect())
}

fn is_checkpoint_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == CHECKPOINT_DIR
}

fn is_notebook(entry: &DirEntry) -> bool {
    entry
        .path()
        .extension()
        .is_some_and(|ext| ext == NOTEBOOK_EXTENSION)
        && entry.path().is_file()
}

fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| Error::file_system(path, "canonicalize", e))
}
