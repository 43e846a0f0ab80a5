use super::outcome::{Outcome, TestResult};
use std::fmt;

/// Aggregate counters for one run.
///
/// Only the scheduler's collection step mutates this; increments commute, so
/// the final counts do not depend on completion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub successful: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Set when a shutdown request cut the run short
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one result and return its classification
    pub fn record(&mut self, result: &TestResult) -> Outcome {
        let outcome = result.outcome();
        self.record_outcome(outcome);
        outcome
    }

    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.successful += 1,
            Outcome::Timeout => self.timed_out += 1,
            Outcome::Failure => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed + self.timed_out
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} timed out, {} failed",
            self.successful, self.timed_out, self.failed
        )
    }
}
