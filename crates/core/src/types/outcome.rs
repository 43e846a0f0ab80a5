use crate::constants::TIMEOUT_MARKER;
use std::fmt;
use std::path::PathBuf;

/// Whether a diagnostic carries the sandbox's budget-exceeded phrase.
///
/// The sandbox exposes no structured error kind, so this substring check is
/// the only discriminator between a timeout and any other failure.
pub fn has_timeout_marker(message: &str) -> bool {
    message.contains(TIMEOUT_MARKER)
}

/// Terminal classification of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout,
    Failure,
}

impl Outcome {
    pub fn classify(success: bool, message: &str) -> Self {
        if success {
            Outcome::Success
        } else if has_timeout_marker(message) {
            Outcome::Timeout
        } else {
            Outcome::Failure
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Timeout => write!(f, "timeout"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// Result of one job within one run. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub path: PathBuf,
    pub success: bool,
    pub message: String,
    pub cached: bool,
    pub execution_time: Option<f64>,
}

impl TestResult {
    pub fn executed(
        path: impl Into<PathBuf>,
        success: bool,
        message: impl Into<String>,
        execution_time: Option<f64>,
    ) -> Self {
        Self {
            path: path.into(),
            success,
            message: message.into(),
            cached: false,
            execution_time,
        }
    }

    pub fn from_cache(path: impl Into<PathBuf>, record: &crate::CacheRecord) -> Self {
        Self {
            path: path.into(),
            success: record.success,
            message: record.message.clone(),
            cached: true,
            execution_time: record.execution_time,
        }
    }

    /// A job whose outcome could not be retrieved at all
    pub fn failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::executed(path, false, message, None)
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::classify(self.success, &self.message)
    }
}
