use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One discovered notebook and the budget it runs under.
///
/// `path` is canonical and absolute, so two spellings of the same file are
/// the same job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Job {
    path: PathBuf,
    timeout_secs: u64,
}

impl Job {
    /// Create a job from an already-canonical path
    pub fn new(path: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            path: path.into(),
            timeout_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Budget in whole seconds, as recorded in the cache
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory the sandbox runs the notebook from
    pub fn working_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_dir_is_parent() {
        let job = Job::new("/data/notebooks/intro.ipynb", 30);
        assert_eq!(job.working_dir(), Path::new("/data/notebooks"));
        assert_eq!(job.budget(), Duration::from_secs(30));
    }

    #[test]
    fn test_jobs_order_by_path() {
        let mut jobs = vec![Job::new("/b.ipynb", 1), Job::new("/a.ipynb", 1)];
        jobs.sort();
        assert_eq!(jobs[0].path(), Path::new("/a.ipynb"));
    }
}
