//! Cooperative shutdown.
//!
//! An interrupt never unwinds through workers. It flips two shared
//! [`CancellationToken`]s in sequence: the dispatch token at once, so the
//! scheduler stops starting notebooks, and the execution token only when the
//! grace window runs out, so units still running abandon execution and tear
//! down before reporting.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a run with respect to external interrupts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Running = 0,
    ShutdownRequested = 1,
    Draining = 2,
    Stopped = 3,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::ShutdownRequested,
            2 => ShutdownState::Draining,
            _ => ShutdownState::Stopped,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: AtomicU8,
    dispatch: CancellationToken,
    execution: CancellationToken,
}

/// Shared handle; clones observe and drive the same state
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(ShutdownState::Running as u8),
                dispatch: CancellationToken::new(),
                execution: CancellationToken::new(),
            }),
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Cancelled once shutdown has been requested; no job starts after that
    pub fn dispatch_token(&self) -> CancellationToken {
        self.inner.dispatch.clone()
    }

    /// Cancelled when running units must abandon execution
    pub fn execution_token(&self) -> CancellationToken {
        self.inner.execution.clone()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.dispatch.is_cancelled()
    }

    /// Ask the run to stop. Only the first call has any effect; it returns
    /// `true`, every later call returns `false`.
    ///
    /// Notebooks already running keep going until the scheduler's grace
    /// window elapses.
    pub fn request_shutdown(&self) -> bool {
        if self.transition(ShutdownState::Running, ShutdownState::ShutdownRequested) {
            tracing::warn!("Shutdown requested; no further notebooks will be started");
            self.inner.dispatch.cancel();
            true
        } else {
            tracing::debug!(state = ?self.state(), "Shutdown already in progress");
            false
        }
    }

    /// Tell every running unit to abandon execution and tear down
    pub(crate) fn cancel_running(&self) {
        self.inner.execution.cancel();
    }

    /// Move from SHUTDOWN_REQUESTED to DRAINING
    pub(crate) fn begin_draining(&self) -> bool {
        self.transition(ShutdownState::ShutdownRequested, ShutdownState::Draining)
    }

    /// Move from DRAINING to STOPPED
    pub(crate) fn mark_stopped(&self) -> bool {
        self.transition(ShutdownState::Draining, ShutdownState::Stopped)
    }

    fn transition(&self, from: ShutdownState, to: ShutdownState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Install SIGINT/SIGTERM listeners that request shutdown.
    ///
    /// Handlers are registered before this returns, so a signal arriving
    /// right after cannot take the default action and kill the process.
    /// Repeated signals are logged and otherwise ignored. The listener runs
    /// until the returned task is aborted or the runtime stops.
    pub fn listen(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        let signals = Signals::install();
        tokio::spawn(async move {
            let mut signals = match signals {
                Ok(signals) => signals,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install signal handlers");
                    return;
                }
            };
            loop {
                let signal = match signals.recv().await {
                    Ok(signal) => signal,
                    Err(e) => {
                        tracing::error!(error = %e, "Signal listener stopped");
                        return;
                    }
                };
                if coordinator.request_shutdown() {
                    tracing::warn!(signal, "Received interrupt, initiating graceful shutdown");
                } else {
                    tracing::warn!(signal, "Still shutting down; waiting for running notebooks");
                }
            }
        })
    }
}

#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            _ = self.terminate.recv() => Ok("SIGTERM"),
            _ = self.interrupt.recv() => Ok("SIGINT"),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("CTRL-C")
    }
}
