//! Log sink configuration.
//!
//! Two layers: a compact human-readable layer on stderr whose level follows
//! `--verbose`, and a non-blocking DEBUG file layer under the log directory.

use nbrun_core::{LOG_FILE_NAME, NBRUN_LOG_VAR};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing system.
///
/// `NBRUN_LOG` (or `RUST_LOG`) overrides the stderr level. The returned guard
/// flushes the file writer when dropped and must live until exit.
pub fn init(
    verbose: bool,
    log_dir: &Path,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync + 'static>> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let stderr_filter = EnvFilter::try_from_env(NBRUN_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_level))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_filter(stderr_filter);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_filter(EnvFilter::try_new("debug")?);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}
