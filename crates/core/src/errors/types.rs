//! Core error type definitions

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for nbrun operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for nbrun operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document could not be read or is not a well-formed notebook
    Parse {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A sandbox session could not be created
    SandboxStart {
        kind: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The sandbox reported a failure while executing a document.
    ///
    /// `message` is the collaborator's diagnostic text, kept verbatim so the
    /// timeout marker survives.
    Execution { message: String },

    /// Releasing a session resource exceeded its bound
    TeardownTimeout { resource: String, duration: Duration },

    /// Job discovery failed
    Discovery { path: PathBuf, message: String },

    /// Configuration errors
    Configuration { message: String },

    /// File system operations
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}
