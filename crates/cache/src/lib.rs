//! Result cache for nbrun
//!
//! One JSON record per notebook, keyed by a hash of the notebook's canonical
//! path. The store decides whether a notebook may be skipped and replaces
//! records atomically after each run.

pub mod keys;
pub mod policy;
pub mod store;

pub use keys::{cache_key, record_file_name};
pub use policy::{needs_run, RunDecision};
pub use store::CacheStore;
