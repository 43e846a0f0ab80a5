//! Atomic file replacement so readers never see a torn cache record

use nbrun_core::{Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Replace `path` with `content` in one step.
///
/// The bytes go to a hidden sibling file first, are synced, and the sibling
/// is renamed over the target. A crash leaves either the old file or the new
/// one, never a mixture.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::configuration("Invalid file path: no parent directory"))?;

    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent, "create parent directory", e))?;

    let temp_path = temp_sibling(parent, path);
    if let Err(e) = write_synced(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::file_system(path, "atomic rename", e)
    })
}

/// Whether a directory entry is a leftover from an interrupted write
pub fn is_temp_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(".tmp"))
}

fn temp_sibling(parent: &Path, target: &Path) -> PathBuf {
    let stem = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    parent.join(format!(".{stem}.{}.tmp", Uuid::new_v4().simple()))
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).map_err(|e| Error::file_system(path, "create temporary file", e))?;
    file.write_all(content)
        .map_err(|e| Error::file_system(path, "write to temporary file", e))?;
    file.sync_all()
        .map_err(|e| Error::file_system(path, "sync temporary file", e))
}
