use serde::{Deserialize, Serialize};

/// Persisted outcome of the most recent execution of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Source mtime (seconds since the Unix epoch) when the job last ran
    pub last_modified: f64,
    pub success: bool,
    pub message: String,
    /// Budget in seconds that was in force for that run
    pub timeout: u64,
    /// Wall-clock seconds of a successful run; `None` when it did not complete
    pub execution_time: Option<f64>,
}

impl CacheRecord {
    /// Whether the stored run ran out of time
    pub fn timed_out(&self) -> bool {
        super::outcome::has_timeout_marker(&self.message)
    }
}
