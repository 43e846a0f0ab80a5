use crate::args::Cli;
use eyre::WrapErr;
use nbrun_cache::CacheStore;
use nbrun_core::{RunSummary, RunnerConfig};
use nbrun_sandbox::ProcessSandbox;
use nbrun_task::{run_notebooks, ShutdownCoordinator};
use std::sync::Arc;

/// Every notebook passed
pub const EXIT_SUCCESS: i32 = 0;
/// At least one notebook failed or timed out
pub const EXIT_FAILURE: i32 = 1;
/// Invalid arguments, missing path, unusable cache or log directory
pub const EXIT_SETUP_ERROR: i32 = 2;
/// The run was cut short by SIGINT/SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.interrupted {
        EXIT_INTERRUPTED
    } else if summary.all_passed() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Run the command line. Errors returned here are setup errors; notebook
/// failures are reflected in the exit code instead. The summary line is
/// printed either way.
pub async fn execute(cli: Cli) -> eyre::Result<i32> {
    match run(&cli).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(exit_code(&summary))
        }
        Err(report) => {
            print_summary(&RunSummary::new());
            Err(report)
        }
    }
}

async fn run(cli: &Cli) -> eyre::Result<RunSummary> {
    let config = cli.to_config();
    let _log_guard = nbrun_utils::tracing::init(config.verbose, &config.log_dir)
        .map_err(|e| eyre::eyre!("{e}"))
        .wrap_err_with(|| format!("cannot set up logging in {}", config.log_dir.display()))?;

    config.validate().wrap_err("invalid configuration")?;

    if cli.clear_cache {
        clear_cache(&config)?;
    }

    let shutdown = ShutdownCoordinator::new();
    let listener = shutdown.listen();
    let sandbox = Arc::new(ProcessSandbox::new(config.jupyter_program.clone()));

    let report = run_notebooks(&config, sandbox, shutdown).await;
    listener.abort();
    let report = report.wrap_err("cannot start the run")?;

    if report.summary.interrupted {
        tracing::warn!("Run interrupted before every notebook finished");
    }
    Ok(report.summary)
}

fn print_summary(summary: &RunSummary) {
    println!("\nTest Summary: {summary}");
}

fn clear_cache(config: &RunnerConfig) -> eyre::Result<()> {
    let store = CacheStore::open(config.cache_dir.as_deref(), false)
        .wrap_err("cannot open result cache")?;
    let removed = store.clear().wrap_err("cannot clear result cache")?;
    tracing::info!(removed, "Cleared cached results");
    Ok(())
}
