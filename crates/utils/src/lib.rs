//! Shared utilities and pure functions for nbrun
//!
//! This crate provides the small filesystem and logging helpers used
//! throughout the nbrun workspace.

pub mod atomic_file;
pub mod file_times;
pub mod tracing;

pub use atomic_file::*;
pub use file_times::*;
