//! Conversion implementations for error types

use super::types::Error;
use std::path::PathBuf;

// Kept manual rather than #[from] so call sites can add path context
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: "invalid JSON".to_string(),
            source: error,
        }
    }
}

