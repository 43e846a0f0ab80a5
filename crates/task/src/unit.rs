//! One notebook, one isolated session, one outcome.
//!
//! A unit loads the document, starts a fresh sandbox session, executes every
//! cell, and tears the session down on every exit path. Teardown releases
//! each resource concurrently under its own bound, so a hung release can
//! delay a unit by at most that bound and never blocks its siblings.

use futures::future::join_all;
use nbrun_core::{CacheRecord, Error, Job, Result, CANCELLED_MESSAGE, SUCCESS_MESSAGE};
use nbrun_sandbox::{Notebook, Releasable, Sandbox, SessionSpec};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-unit settings shared by every worker
#[derive(Debug, Clone)]
pub struct UnitSettings {
    pub kernel: String,
    /// Bound on each individual resource release
    pub teardown_timeout: Duration,
}

/// What a single execution produced
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub success: bool,
    pub message: String,
    /// Wall-clock seconds of a successful run
    pub execution_time: Option<f64>,
    /// The run was abandoned because shutdown was requested
    pub cancelled: bool,
}

impl UnitReport {
    fn succeeded(elapsed: Duration) -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            execution_time: Some(elapsed.as_secs_f64()),
            cancelled: false,
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            execution_time: None,
            cancelled: false,
        }
    }

    fn cancelled() -> Self {
        Self {
            success: false,
            message: CANCELLED_MESSAGE.to_string(),
            execution_time: None,
            cancelled: true,
        }
    }

    /// Record to persist for this report
    pub fn to_record(&self, last_modified: f64, timeout: u64) -> CacheRecord {
        CacheRecord {
            last_modified,
            success: self.success,
            message: self.message.clone(),
            timeout,
            execution_time: self.execution_time,
        }
    }
}

/// Outcome of releasing a session's resources
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub released: usize,
    pub errors: Vec<Error>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ExecutionUnit<'a> {
    job: &'a Job,
    sandbox: Arc<dyn Sandbox>,
    settings: &'a UnitSettings,
    token: CancellationToken,
}

impl<'a> ExecutionUnit<'a> {
    pub fn new(
        job: &'a Job,
        sandbox: Arc<dyn Sandbox>,
        settings: &'a UnitSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            job,
            sandbox,
            settings,
            token,
        }
    }

    /// Execute the notebook. Never fails: every error becomes part of the
    /// report.
    pub async fn run(self) -> UnitReport {
        if self.token.is_cancelled() {
            return UnitReport::cancelled();
        }

        let notebook = match Notebook::load(self.job.path()) {
            Ok(notebook) => notebook,
            Err(e) => {
                tracing::debug!(notebook = %self.job, error = %e, "Notebook could not be parsed");
                return UnitReport::failed(&e);
            }
        };

        let spec = SessionSpec {
            kernel: self.settings.kernel.clone(),
            budget: self.job.budget(),
            working_dir: self.job.working_dir().to_path_buf(),
        };
        let mut session = match self.sandbox.start(&spec).await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(notebook = %self.job, error = %e, "Sandbox failed to start");
                return UnitReport::failed(&e);
            }
        };

        let started = Instant::now();
        let executed: Option<Result<()>> = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = session.execute(&notebook) => Some(result),
        };
        let elapsed = started.elapsed();

        let teardown = teardown(session.into_resources(), self.settings.teardown_timeout).await;
        if !teardown.is_clean() {
            tracing::debug!(
                notebook = %self.job,
                released = teardown.released,
                errors = teardown.errors.len(),
                "Teardown finished with errors"
            );
        }

        match executed {
            Some(Ok(())) => UnitReport::succeeded(elapsed),
            Some(Err(e)) => UnitReport::failed(&e),
            None => {
                tracing::info!(notebook = %self.job, "Execution abandoned for shutdown");
                UnitReport::cancelled()
            }
        }
    }
}

/// Release every resource concurrently, each bounded by `bound`.
///
/// Failures and timeouts are collected, never propagated. A release that
/// exceeds its bound is dropped.
pub async fn teardown(resources: Vec<Box<dyn Releasable>>, bound: Duration) -> TeardownReport {
    let releases = resources.into_iter().map(|resource| async move {
        let name = resource.name().to_string();
        match tokio::time::timeout(bound, resource.release()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::debug!(resource = %name, error = %e, "Resource release failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    resource = %name,
                    bound_ms = bound.as_millis() as u64,
                    "Resource release timed out; abandoning it"
                );
                Err(Error::teardown_timeout(name, bound))
            }
        }
    });

    let mut report = TeardownReport::default();
    for result in join_all(releases).await {
        match result {
            Ok(()) => report.released += 1,
            Err(e) => report.errors.push(e),
        }
    }
    report
}
