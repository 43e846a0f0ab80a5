//! Domain types for a notebook regression run.
//!
//! - **`job`**: a discovered notebook plus its execution budget
//! - **`record`**: the persisted last-known outcome of a job
//! - **`outcome`**: marker-based classification and per-run results
//! - **`summary`**: aggregate counters for a whole run

pub mod job;
pub mod outcome;
pub mod record;
pub mod summary;

pub use job::*;
pub use outcome::*;
pub use record::*;
pub use summary::*;
