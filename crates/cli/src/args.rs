use clap::Parser;
use nbrun_core::{
    RunnerConfig, DEFAULT_CACHE_DIR, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_JUPYTER_PROGRAM,
    DEFAULT_KERNEL, DEFAULT_LOG_DIR, DEFAULT_TEARDOWN_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nbrun")]
#[command(about = "Run Jupyter notebooks as regression tests", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Notebook file or directory to test
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Per-notebook execution budget in seconds
    #[arg(short, long, env = "NBRUN_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Number of notebooks to run at once (default: available parallelism)
    #[arg(short, long, env = "NBRUN_WORKERS")]
    pub workers: Option<usize>,

    /// Directory holding cached results
    #[arg(short, long, env = "NBRUN_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Do not read or write cached results
    #[arg(long)]
    pub no_cache: bool,

    /// Log every cache decision and teardown step
    #[arg(short, long)]
    pub verbose: bool,

    /// Run every notebook even if a cached result exists
    #[arg(short, long)]
    pub force: bool,

    /// Kernel to execute notebooks with
    #[arg(long, default_value = DEFAULT_KERNEL)]
    pub kernel: String,

    /// Program that provides `nbconvert`
    #[arg(long, default_value = DEFAULT_JUPYTER_PROGRAM)]
    pub jupyter: String,

    /// Seconds running notebooks get to finish after an interrupt
    #[arg(long, default_value_t = DEFAULT_GRACE_PERIOD_SECS)]
    pub grace: u64,

    /// Seconds allowed for releasing each session resource
    #[arg(long, default_value_t = DEFAULT_TEARDOWN_TIMEOUT_SECS)]
    pub teardown_timeout: u64,

    /// Directory for the debug log file
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Delete cached results before running
    #[arg(long)]
    pub clear_cache: bool,
}

impl Cli {
    pub fn to_config(&self) -> RunnerConfig {
        RunnerConfig {
            root: self.path.clone(),
            timeout_secs: self.timeout,
            workers: self.workers,
            cache_dir: (!self.no_cache).then(|| self.cache_dir.clone()),
            force: self.force,
            verbose: self.verbose,
            kernel: self.kernel.clone(),
            jupyter_program: self.jupyter.clone(),
            teardown_timeout: Duration::from_secs(self.teardown_timeout),
            grace_period: Duration::from_secs(self.grace),
            log_dir: self.log_dir.clone(),
        }
    }
}
