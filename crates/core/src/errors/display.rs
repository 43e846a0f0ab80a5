//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse {
                path,
                message,
                source,
            } => {
                write!(
                    f,
                    "failed to parse notebook '{}': {}",
                    path.display(),
                    message
                )?;
                if let Some(source) = source {
                    write!(f, ": {source}")?;
                }
                Ok(())
            }
            Error::SandboxStart { kind, message, .. } => {
                write!(f, "failed to start '{kind}' sandbox session: {message}")
            }
            // Verbatim: the cache and the classifier read this text
            Error::Execution { message } => write!(f, "{message}"),
            Error::TeardownTimeout { resource, duration } => {
                write!(f, "releasing '{resource}' timed out after {duration:?}")
            }
            Error::Discovery { path, message } => {
                write!(
                    f,
                    "failed to discover notebooks under '{}': {}",
                    path.display(),
                    message
                )
            }
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Json { message, source } => {
                write!(f, "JSON error: {message}: {source}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TIMEOUT_MARKER;
    use std::time::Duration;

    #[test]
    fn test_execution_display_is_verbatim() {
        let message = format!("{TIMEOUT_MARKER} while it was being executed, after 1 seconds.");
        let error = Error::execution(message.clone());
        assert_eq!(error.to_string(), message);
    }

    #[test]
    fn test_parse_display_names_path() {
        let error = Error::parse("/tmp/broken.ipynb", "missing cells");
        let rendered = error.to_string();
        assert!(rendered.contains("/tmp/broken.ipynb"));
        assert!(rendered.contains("missing cells"));
    }

    #[test]
    fn test_parse_display_includes_source() {
        let cause = serde_json::from_str::<serde_json::Value>("{\"cells\": [").unwrap_err();
        let detail = cause.to_string();
        let error =
            Error::parse_with_source("/tmp/broken.ipynb", "not a notebook document", cause);

        let rendered = error.to_string();
        assert!(rendered.starts_with(
            "failed to parse notebook '/tmp/broken.ipynb': not a notebook document: "
        ));
        assert!(rendered.ends_with(&detail));
    }

    #[test]
    fn test_teardown_timeout_display() {
        let error = Error::teardown_timeout("kernel", Duration::from_secs(5));
        assert_eq!(error.to_string(), "releasing 'kernel' timed out after 5s");
    }
}
