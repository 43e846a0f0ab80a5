//! Sandbox boundary.
//!
//! A [`Sandbox`] starts one isolated interpreter session per notebook. The
//! session executes the document once and then hands back its releasable
//! resources, which the caller tears down concurrently under its own bounds.

use crate::document::Notebook;
use async_trait::async_trait;
use nbrun_core::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Parameters for a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    /// Kernel kind, e.g. `python3`
    pub kernel: String,
    /// Budget the sandbox enforces per cell
    pub budget: Duration,
    /// Directory the document runs from
    pub working_dir: PathBuf,
}

/// Factory for isolated sessions
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn start(&self, spec: &SessionSpec) -> Result<Box<dyn SandboxSession>>;
}

/// One live interpreter session. Never reused across notebooks.
#[async_trait]
pub trait SandboxSession: Send {
    /// Run every cell. A failure carries the sandbox's diagnostic text.
    async fn execute(&mut self, notebook: &Notebook) -> Result<()>;

    /// Give up the session's resources for teardown
    fn into_resources(self: Box<Self>) -> Vec<Box<dyn Releasable>>;
}

/// A single resource held by a session, released independently of the others
#[async_trait]
pub trait Releasable: Send {
    fn name(&self) -> &str;

    async fn release(self: Box<Self>) -> Result<()>;
}
