//! Notebook discovery, scheduling and execution for nbrun
//!
//! This crate turns a directory of notebooks into a run: it discovers the
//! jobs, consults the result cache, executes the rest on a bounded worker
//! pool, and aggregates the outcomes. Interrupts are handled cooperatively
//! through the [`ShutdownCoordinator`].

pub mod discovery;
pub mod scheduler;
pub mod shutdown;
pub mod unit;

pub use discovery::discover;
pub use scheduler::{run_notebooks, RunReport, Scheduler};
pub use shutdown::{ShutdownCoordinator, ShutdownState};
pub use unit::{teardown, ExecutionUnit, TeardownReport, UnitReport, UnitSettings};
