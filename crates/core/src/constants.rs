//! Constants used throughout the nbrun codebase

// Diagnostic substring the sandbox emits when a cell exceeds its budget
pub const TIMEOUT_MARKER: &str = "A cell timed out";

// Message recorded for a job that ran to completion
pub const SUCCESS_MESSAGE: &str = "Success";

// Message recorded for a job abandoned because of a shutdown request
pub const CANCELLED_MESSAGE: &str = "Cancelled by shutdown request";

// Document discovery
pub const NOTEBOOK_EXTENSION: &str = "ipynb";
pub const CHECKPOINT_DIR: &str = ".ipynb_checkpoints";

// Cache layout
pub const DEFAULT_CACHE_DIR: &str = ".notebookcache";
pub const CACHE_RECORD_EXTENSION: &str = "json";

// Sandbox defaults
pub const DEFAULT_KERNEL: &str = "python3";
pub const DEFAULT_JUPYTER_PROGRAM: &str = "jupyter";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Bounds for the teardown step and for draining after a shutdown request
pub const DEFAULT_TEARDOWN_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

// Logging
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_NAME: &str = "nbrun.log";
pub const NBRUN_LOG_VAR: &str = "NBRUN_LOG";
