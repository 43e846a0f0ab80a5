//! Shared fixtures: a scripted sandbox and notebook writers.
//!
//! Cells are tiny commands interpreted by [`ScriptedSandbox`]:
//!
//! - `sleep <secs>`: wait, or time out if it does not fit the budget
//! - `fail <message>`: report an execution failure
//! - `panic`: panic inside the worker
//! - anything else: succeeds immediately

#![allow(dead_code)]

use async_trait::async_trait;
use nbrun_core::{Error, Result};
use nbrun_sandbox::{Notebook, Releasable, Sandbox, SandboxSession, SessionSpec};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// How a session's resources behave at teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Ok,
    Fail,
    Hang,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub starts: AtomicUsize,
    pub releases: AtomicUsize,
    pub running: AtomicUsize,
    pub peak_running: AtomicUsize,
}

impl Counters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }
}

/// Resources handed back by every session
pub const RESOURCES_PER_SESSION: usize = 2;

pub struct ScriptedSandbox {
    pub counters: Arc<Counters>,
    release: Release,
    fail_start: bool,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            release: Release::Ok,
            fail_start: false,
        }
    }

    pub fn with_release(mut self, release: Release) -> Self {
        self.release = release;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn start(&self, spec: &SessionSpec) -> Result<Box<dyn SandboxSession>> {
        if self.fail_start {
            return Err(Error::sandbox_start(&spec.kernel, "no such kernel"));
        }
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            budget: spec.budget,
            counters: Arc::clone(&self.counters),
            release: self.release,
        }))
    }
}

struct ScriptedSession {
    budget: Duration,
    counters: Arc<Counters>,
    release: Release,
}

struct RunningGuard<'a>(&'a Counters);

impl<'a> RunningGuard<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_running.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SandboxSession for ScriptedSession {
    async fn execute(&mut self, notebook: &Notebook) -> Result<()> {
        let _running = RunningGuard::enter(&self.counters);
        for source in code_cells(notebook) {
            let source = source.trim();
            if let Some(secs) = source.strip_prefix("sleep ") {
                let secs: u64 = secs.trim().parse().unwrap_or(0);
                if Duration::from_secs(secs) > self.budget {
                    tokio::time::sleep(self.budget).await;
                    return Err(Error::execution(format!(
                        "nbclient.exceptions.CellTimeoutError: A cell timed out while it was being executed, after {} seconds.",
                        self.budget.as_secs()
                    )));
                }
                tokio::time::sleep(Duration::from_secs(secs)).await;
            } else if let Some(message) = source.strip_prefix("fail ") {
                return Err(Error::execution(message.to_string()));
            } else if source == "panic" {
                panic!("kernel exploded");
            }
        }
        Ok(())
    }

    fn into_resources(self: Box<Self>) -> Vec<Box<dyn Releasable>> {
        ["channels", "kernel"]
            .into_iter()
            .map(|name| {
                Box::new(ScriptedResource {
                    name,
                    release: self.release,
                    counters: Arc::clone(&self.counters),
                }) as Box<dyn Releasable>
            })
            .collect()
    }
}

struct ScriptedResource {
    name: &'static str,
    release: Release,
    counters: Arc<Counters>,
}

#[async_trait]
impl Releasable for ScriptedResource {
    fn name(&self) -> &str {
        self.name
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        match self.release {
            Release::Ok => Ok(()),
            Release::Fail => Err(Error::execution(format!("{} already closed", self.name))),
            Release::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// Sources of the code cells, in document order
fn code_cells(notebook: &Notebook) -> Vec<String> {
    let document: serde_json::Value = serde_json::from_str(notebook.raw()).unwrap();
    document["cells"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|cell| cell["cell_type"] == "code")
        .map(|cell| match &cell["source"] {
            serde_json::Value::Array(lines) => {
                lines.iter().filter_map(|line| line.as_str()).collect()
            }
            other => other.as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

/// Write an nbformat 4 notebook whose code cells carry `cells`
pub fn write_notebook(dir: &Path, name: &str, cells: &[&str]) -> PathBuf {
    let cells: Vec<_> = cells
        .iter()
        .map(|source| {
            serde_json::json!({
                "cell_type": "code",
                "execution_count": null,
                "metadata": {},
                "outputs": [],
                "source": source,
            })
        })
        .collect();
    let document = serde_json::json!({
        "nbformat": 4,
        "nbformat_minor": 5,
        "metadata": {"kernelspec": {"name": "python3", "display_name": "Python 3"}},
        "cells": cells,
    });

    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    path
}

/// Push a file's mtime forward so it is strictly newer than any record
pub fn bump_mtime(path: &Path) {
    let file = fs::File::options().append(true).open(path).unwrap();
    let later = SystemTime::now() + Duration::from_secs(120);
    file.set_modified(later).unwrap();
}

/// Pull a file's mtime into the past
pub fn backdate_mtime(path: &Path) {
    let file = fs::File::options().append(true).open(path).unwrap();
    let earlier = SystemTime::now() - Duration::from_secs(3600);
    file.set_modified(earlier).unwrap();
}
