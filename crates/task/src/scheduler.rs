//! Bounded-concurrency dispatch of notebook jobs.
//!
//! Jobs are visited in sorted order. Cached outcomes are reported
//! immediately; everything else runs on a worker that holds one semaphore
//! permit for its whole life (execution plus cache write). Results are
//! aggregated in completion order by the dispatch loop only.
//!
//! A shutdown request stops dispatch but leaves running notebooks alone for
//! the grace window. Units still running after it are cancelled and get one
//! teardown bound to report; anything left after that is aborted.

use crate::discovery::discover;
use crate::shutdown::ShutdownCoordinator;
use crate::unit::{ExecutionUnit, UnitSettings};
use futures::FutureExt;
use nbrun_cache::CacheStore;
use nbrun_core::{Job, Outcome, Result, RunSummary, RunnerConfig, TestResult};
use nbrun_sandbox::Sandbox;
use nbrun_utils::modified_secs;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Slack on top of the teardown bound for cancelled units to report
const CANCEL_SLACK: Duration = Duration::from_secs(1);

/// Everything a finished run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Per-job results in completion order
    pub results: Vec<TestResult>,
}

pub struct Scheduler {
    cache: Arc<CacheStore>,
    sandbox: Arc<dyn Sandbox>,
    settings: Arc<UnitSettings>,
    concurrency: usize,
    grace_period: Duration,
    shutdown: ShutdownCoordinator,
}

impl Scheduler {
    pub fn new(
        cache: CacheStore,
        sandbox: Arc<dyn Sandbox>,
        settings: UnitSettings,
        concurrency: usize,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            cache: Arc::new(cache),
            sandbox,
            settings: Arc::new(settings),
            concurrency: concurrency.max(1),
            grace_period: Duration::from_secs(nbrun_core::DEFAULT_GRACE_PERIOD_SECS),
            shutdown,
        }
    }

    /// How long in-flight units get to finish once shutdown is requested
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job and return the aggregate.
    ///
    /// Stops dispatching as soon as shutdown is requested; the partial
    /// summary is then marked interrupted.
    pub async fn run(&self, jobs: Vec<Job>) -> RunReport {
        let mut report = RunReport {
            summary: RunSummary::new(),
            results: Vec::with_capacity(jobs.len()),
        };
        let mut workers: JoinSet<TestResult> = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let token = self.shutdown.dispatch_token();

        'dispatch: for job in jobs {
            if token.is_cancelled() {
                break;
            }

            if let Some(result) = self.cached_result(&job) {
                report.collect(result);
                continue;
            }

            // Wait for a free slot, collecting whatever finishes meanwhile
            let permit = loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break 'dispatch,
                    Some(joined) = workers.join_next(), if !workers.is_empty() => {
                        report.collect_joined(joined);
                    }
                    acquired = Arc::clone(&semaphore).acquire_owned() => match acquired {
                        Ok(permit) => break permit,
                        Err(_) => break 'dispatch,
                    },
                }
            };

            tracing::debug!(notebook = %job, "Dispatching notebook");
            let worker = self.worker(job);
            workers.spawn(async move {
                let result = worker.await;
                drop(permit);
                result
            });
        }

        // Normal drain; a shutdown request switches to the bounded drain below
        while !workers.is_empty() {
            tokio::select! {
                biased;
                joined = workers.join_next() => match joined {
                    Some(joined) => report.collect_joined(joined),
                    None => break,
                },
                _ = token.cancelled() => break,
            }
        }

        if token.is_cancelled() {
            self.drain_after_shutdown(&mut workers, &mut report).await;
        }

        report
    }

    fn cached_result(&self, job: &Job) -> Option<TestResult> {
        let decision = self.cache.decide(job);
        tracing::debug!(notebook = %job, ?decision, "Cache decision");
        if decision.should_run() {
            return None;
        }
        match self.cache.load(job) {
            Ok(Some(record)) => Some(TestResult::from_cache(job.path(), &record)),
            // Record vanished between the decision and the read
            Ok(None) => None,
            Err(e) => Some(TestResult::failure(
                job.path(),
                format!("Error reading cache: {e}"),
            )),
        }
    }

    /// End-to-end work for one job. Panics become failures here, so the
    /// dispatch loop only ever sees a `TestResult`.
    fn worker(&self, job: Job) -> impl Future<Output = TestResult> + Send + 'static {
        let cache = Arc::clone(&self.cache);
        let sandbox = Arc::clone(&self.sandbox);
        let settings = Arc::clone(&self.settings);
        let token = self.shutdown.execution_token();
        let path = job.path().to_path_buf();

        let work = async move {
            let modified = match modified_secs(job.path()) {
                Ok(mtime) => Some(mtime),
                Err(e) => {
                    tracing::warn!(
                        notebook = %job,
                        error = %e,
                        "Cannot read notebook mtime; result will not be cached"
                    );
                    None
                }
            };

            let report = ExecutionUnit::new(&job, sandbox, &settings, token)
                .run()
                .await;

            if let (false, Some(mtime)) = (report.cancelled, modified) {
                let record = report.to_record(mtime, job.timeout_secs());
                if let Err(e) = cache.save(&job, &record) {
                    tracing::warn!(notebook = %job, error = %e, "Failed to write cache record");
                }
            }

            TestResult::executed(
                job.path(),
                report.success,
                report.message,
                report.execution_time,
            )
        };

        AssertUnwindSafe(work)
            .catch_unwind()
            .map(move |caught| {
                caught.unwrap_or_else(|payload| {
                    TestResult::failure(
                        path,
                        format!("Worker panicked: {}", panic_message(payload.as_ref())),
                    )
                })
            })
    }

    async fn drain_after_shutdown(
        &self,
        workers: &mut JoinSet<TestResult>,
        report: &mut RunReport,
    ) {
        report.summary.interrupted = true;
        self.shutdown.begin_draining();
        tracing::warn!(
            running = workers.len(),
            grace_secs = self.grace_period.as_secs_f64(),
            "Waiting for running notebooks to finish"
        );

        if !Self::collect_within(workers, report, self.grace_period).await {
            tracing::warn!(
                running = workers.len(),
                "Grace period elapsed; cancelling running notebooks"
            );
            self.shutdown.cancel_running();

            let bound = self.settings.teardown_timeout + CANCEL_SLACK;
            if !Self::collect_within(workers, report, bound).await {
                tracing::warn!(
                    abandoned = workers.len(),
                    "Notebooks did not stop after cancellation; abandoning them"
                );
                // Dropping a worker drops its session, which kills the process group
                workers.abort_all();
                while workers.join_next().await.is_some() {}
            }
        }

        self.shutdown.mark_stopped();
    }

    /// Collect results until the set is empty or `bound` elapses; `true`
    /// when every worker finished
    async fn collect_within(
        workers: &mut JoinSet<TestResult>,
        report: &mut RunReport,
        bound: Duration,
    ) -> bool {
        tokio::time::timeout(bound, async {
            while let Some(joined) = workers.join_next().await {
                report.collect_joined(joined);
            }
        })
        .await
        .is_ok()
    }
}

impl RunReport {
    fn collect(&mut self, result: TestResult) {
        let outcome = self.summary.record(&result);
        log_result(&result, outcome);
        self.results.push(result);
    }

    fn collect_joined(&mut self, joined: std::result::Result<TestResult, JoinError>) {
        match joined {
            Ok(result) => self.collect(result),
            Err(e) => {
                tracing::error!(error = %e, "Worker task failed");
                self.summary.record_outcome(Outcome::Failure);
            }
        }
    }
}

fn log_result(result: &TestResult, outcome: Outcome) {
    let notebook = result.path.display();
    match outcome {
        Outcome::Success if result.cached => {
            tracing::info!(%notebook, "CACHED: {notebook}");
        }
        Outcome::Success => {
            let secs = result.execution_time.unwrap_or_default();
            tracing::info!(%notebook, secs, "PASSED: {notebook} ({secs:.2}s)");
        }
        Outcome::Timeout => {
            tracing::warn!(%notebook, cached = result.cached, "TIMEOUT: {notebook}");
        }
        Outcome::Failure => {
            tracing::error!(
                %notebook,
                cached = result.cached,
                "FAILED: {notebook}\n{}",
                result.message
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Discover, open the cache, and run everything under `config.root`
pub async fn run_notebooks(
    config: &RunnerConfig,
    sandbox: Arc<dyn Sandbox>,
    shutdown: ShutdownCoordinator,
) -> Result<RunReport> {
    config.validate()?;
    let jobs = discover(&config.root, config.timeout_secs)?;
    let cache = CacheStore::open(config.cache_dir.as_deref(), config.force)?;

    let scheduler = Scheduler::new(
        cache,
        sandbox,
        UnitSettings {
            kernel: config.kernel.clone(),
            teardown_timeout: config.teardown_timeout,
        },
        config.concurrency(),
        shutdown,
    )
    .with_grace_period(config.grace_period);

    tracing::info!(
        workers = scheduler.concurrency(),
        "Using {} workers",
        scheduler.concurrency()
    );
    tracing::info!(notebooks = jobs.len(), "Found {} notebooks", jobs.len());

    Ok(scheduler.run(jobs).await)
}
