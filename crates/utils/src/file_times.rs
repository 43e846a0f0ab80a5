//! Modification-time helpers for cache invalidation

use nbrun_core::{Error, Result};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, with sub-second precision
pub fn system_time_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

/// Modification time of `path` as seconds since the Unix epoch
pub fn modified_secs(path: &Path) -> Result<f64> {
    let metadata =
        fs::metadata(path).map_err(|e| Error::file_system(path, "read metadata", e))?;
    let modified = metadata
        .modified()
        .map_err(|e| Error::file_system(path, "read modification time", e))?;
    Ok(system_time_secs(modified))
}
