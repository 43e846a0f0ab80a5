//! On-disk record store

use crate::keys::record_file_name;
use crate::policy::{needs_run, RunDecision};
use nbrun_core::{CacheRecord, Error, Job, Result, CACHE_RECORD_EXTENSION};
use nbrun_utils::{is_temp_artifact, modified_secs, write_atomic};
use std::fs;
use std::path::{Path, PathBuf};

/// Durable mapping from notebook identity to its last result.
///
/// Each record lives in its own file, so concurrent workers writing distinct
/// notebooks never contend. With no directory configured the store is
/// disabled: every notebook runs and nothing is written.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: Option<PathBuf>,
    force: bool,
}

impl CacheStore {
    /// Open (and create) a cache directory; `None` disables caching
    pub fn open(dir: Option<&Path>, force: bool) -> Result<Self> {
        match dir {
            Some(dir) => {
                tracing::info!(cache_dir = %dir.display(), "Using result cache");
                fs::create_dir_all(dir)
                    .map_err(|e| Error::file_system(dir, "create cache directory", e))?;
                Ok(Self {
                    dir: Some(dir.to_path_buf()),
                    force,
                })
            }
            None => {
                tracing::info!("Result cache disabled");
                Ok(Self::disabled())
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: None,
            force: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Location of the record for `job`, if caching is enabled
    pub fn record_path(&self, job: &Job) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(record_file_name(job.path())))
    }

    /// Read the stored record. A missing record is `Ok(None)`; an unreadable
    /// or corrupt one is an error.
    pub fn load(&self, job: &Job) -> Result<Option<CacheRecord>> {
        let Some(path) = self.record_path(job) else {
            return Ok(None);
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::file_system(&path, "read cache record", e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::json(format!("corrupt cache record {}", path.display()), e))
    }

    /// Work out whether `job` must run, and why
    pub fn decide(&self, job: &Job) -> RunDecision {
        if self.force {
            return RunDecision::Forced;
        }
        let record = match self.load(job) {
            Ok(Some(record)) => record,
            Ok(None) => return RunDecision::NoRecord,
            Err(e) => {
                tracing::warn!(notebook = %job, error = %e, "Ignoring unreadable cache record");
                return RunDecision::NoRecord;
            }
        };
        let modified = match modified_secs(job.path()) {
            Ok(mtime) => Some(mtime),
            Err(e) => {
                tracing::debug!(notebook = %job, error = %e, "Cannot read notebook mtime");
                None
            }
        };
        let decision = needs_run(&record, job.timeout_secs(), modified);
        if decision == RunDecision::SkipBudgetExhausted {
            tracing::debug!(
                notebook = %job,
                cached_timeout = record.timeout,
                current_timeout = job.timeout_secs(),
                "Skipping notebook that already timed out with at least this budget"
            );
        }
        decision
    }

    pub fn should_run(&self, job: &Job) -> bool {
        self.decide(job).should_run()
    }

    /// Replace the record for `job`. A no-op when caching is disabled.
    pub fn save(&self, job: &Job, record: &CacheRecord) -> Result<()> {
        let Some(path) = self.record_path(job) else {
            return Ok(());
        };
        let content = serde_json::to_vec(record)
            .map_err(|e| Error::json("serialize cache record", e))?;
        write_atomic(&path, &content)?;
        tracing::debug!(notebook = %job, record = %path.display(), "Cache record written");
        Ok(())
    }

    /// Remove every record and leftover temporary file; returns how many
    /// records were removed
    pub fn clear(&self) -> Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        let entries =
            fs::read_dir(dir).map_err(|e| Error::file_system(dir, "list cache directory", e))?;

        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| Error::file_system(dir, "list cache directory", e))?
                .path();
            let is_record = path
                .extension()
                .is_some_and(|ext| ext == CACHE_RECORD_EXTENSION);
            if is_record || is_temp_artifact(&path) {
                fs::remove_file(&path)
                    .map_err(|e| Error::file_system(&path, "remove cache record", e))?;
                if is_record {
                    removed += 1;
                }
            }
        }
        tracing::info!(cache_dir = %dir.display(), removed, "Cache cleared");
        Ok(removed)
    }
}
