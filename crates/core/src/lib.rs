//! Core domain types, errors, and constants for `nbrun`.
//!
//! This crate holds the vocabulary shared by every other crate in the
//! workspace: the `Error` enum and `Result` alias, the job and cache record
//! types, the run summary, and the runner configuration.
//!
//! ## Key Components
//!
//! - **`errors`**: The primary `Error` enum, and its builders.
//! - **`types`**: `Job`, `CacheRecord`, `TestResult`, `Outcome`, `RunSummary`.
//! - **`config`**: `RunnerConfig`, the resolved settings for one run.
//! - **`constants`**: Marker phrases, default paths and default bounds.

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    config::RunnerConfig,
    constants::*,
    errors::{Error, Result},
    types::*,
};
