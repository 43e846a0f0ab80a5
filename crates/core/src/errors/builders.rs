//! Builder methods for creating errors with context

use super::types::Error;
use std::path::PathBuf;
use std::time::Duration;

impl Error {
    /// Create a document parse error
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a document parse error with a source error
    #[must_use]
    pub fn parse_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a sandbox start error
    #[must_use]
    pub fn sandbox_start(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SandboxStart {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a sandbox start error caused by an I/O failure
    #[must_use]
    pub fn sandbox_start_io(
        kind: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::SandboxStart {
            kind: kind.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an execution failure carrying the sandbox diagnostic
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
        }
    }

    /// Create a teardown timeout error
    #[must_use]
    pub fn teardown_timeout(resource: impl Into<String>, duration: Duration) -> Self {
        Error::TeardownTimeout {
            resource: resource.into(),
            duration,
        }
    }

    /// Create a discovery error
    #[must_use]
    pub fn discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Discovery {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a JSON error with context
    #[must_use]
    pub fn json(message: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json {
            message: message.into(),
            source,
        }
    }

    /// Whether this error describes a missing file rather than a broken one
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FileSystem { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
