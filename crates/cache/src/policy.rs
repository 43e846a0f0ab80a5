//! Skip/run decision for a cached notebook

use nbrun_core::CacheRecord;

/// Why a notebook will or will not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    /// Caller asked to ignore the cache
    Forced,
    /// No usable record exists
    NoRecord,
    /// Previous run exhausted a budget at least as large as the current one
    SkipBudgetExhausted,
    /// Source changed after the record was written
    SourceModified,
    /// Previous run failed
    PreviousFailure,
    /// Record is fresh and successful
    SkipUpToDate,
}

impl RunDecision {
    pub fn should_run(self) -> bool {
        !matches!(
            self,
            RunDecision::SkipBudgetExhausted | RunDecision::SkipUpToDate
        )
    }
}

/// Decide whether a notebook with an existing record must run again.
///
/// A record that timed out under a budget at least as large as the current
/// one is skipped: running again cannot succeed without more time. Otherwise
/// the notebook runs when its source is newer than the record or the record
/// is a failure. `modified` is `None` when the source mtime is unreadable.
pub fn needs_run(record: &CacheRecord, timeout_secs: u64, modified: Option<f64>) -> RunDecision {
    if record.timeout >= timeout_secs && record.timed_out() {
        return RunDecision::SkipBudgetExhausted;
    }
    match modified {
        None => RunDecision::SourceModified,
        Some(mtime) if mtime > record.last_modified => RunDecision::SourceModified,
        Some(_) if !record.success => RunDecision::PreviousFailure,
        Some(_) => RunDecision::SkipUpToDate,
    }
}
