//! Resolved settings for one run

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_JUPYTER_PROGRAM, DEFAULT_KERNEL,
    DEFAULT_LOG_DIR, DEFAULT_TEARDOWN_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the runner needs to know before it starts dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// File or directory to test
    pub root: PathBuf,
    /// Per-notebook budget in seconds
    pub timeout_secs: u64,
    /// Worker count override; `None` means available parallelism
    pub workers: Option<usize>,
    /// `None` disables the result cache
    pub cache_dir: Option<PathBuf>,
    /// Ignore cached results and run everything
    pub force: bool,
    pub verbose: bool,
    /// Kernel the sandbox starts for every session
    pub kernel: String,
    /// Program providing `nbconvert`
    pub jupyter_program: String,
    pub teardown_timeout: Duration,
    pub grace_period: Duration,
    pub log_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: None,
            cache_dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
            force: false,
            verbose: false,
            kernel: DEFAULT_KERNEL.to_string(),
            jupyter_program: DEFAULT_JUPYTER_PROGRAM.to_string(),
            teardown_timeout: Duration::from_secs(DEFAULT_TEARDOWN_TIMEOUT_SECS),
            grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl RunnerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Size of the worker pool
    pub fn concurrency(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::configuration("timeout must be at least one second"));
        }
        if self.workers == Some(0) {
            return Err(Error::configuration("worker count must be at least one"));
        }
        if self.kernel.trim().is_empty() {
            return Err(Error::configuration("kernel name must not be empty"));
        }
        if self.jupyter_program.trim().is_empty() {
            return Err(Error::configuration("jupyter program must not be empty"));
        }
        Ok(())
    }
}
