//! Kernel sessions backed by an external `jupyter nbconvert` process.
//!
//! The notebook is piped to `nbconvert --execute --stdin --stdout`, which
//! starts a fresh kernel, enforces the per-cell budget, and reports failures
//! as a Python traceback on stderr. That traceback's tail becomes the
//! diagnostic the runner classifies.

use crate::document::Notebook;
use crate::session::{Releasable, Sandbox, SandboxSession, SessionSpec};
use async_trait::async_trait;
use nbrun_core::{Error, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Lines of stderr kept as the failure diagnostic
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// How long to wait for stderr to close once the process has exited
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts one `nbconvert` process per session
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    program: String,
}

impl ProcessSandbox {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, spec: &SessionSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(nbconvert_args(spec))
            .current_dir(&spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so teardown also reaches the kernel it spawns
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd
    }
}

fn nbconvert_args(spec: &SessionSpec) -> Vec<String> {
    vec![
        "nbconvert".to_string(),
        "--to".to_string(),
        "notebook".to_string(),
        "--execute".to_string(),
        "--stdin".to_string(),
        "--stdout".to_string(),
        format!("--ExecutePreprocessor.timeout={}", spec.budget.as_secs()),
        format!("--ExecutePreprocessor.kernel_name={}", spec.kernel),
    ]
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn start(&self, spec: &SessionSpec) -> Result<Box<dyn SandboxSession>> {
        let mut child = self.command(spec).spawn().map_err(|e| {
            Error::sandbox_start_io(&spec.kernel, format!("cannot spawn '{}'", self.program), e)
        })?;

        let (Some(stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::sandbox_start(
                &spec.kernel,
                "sandbox process has no piped stdio",
            ));
        };

        tracing::debug!(
            kernel = %spec.kernel,
            pid = ?child.id(),
            working_dir = %spec.working_dir.display(),
            "Sandbox session started"
        );

        // The executed notebook is not inspected, but the pipe must not fill up
        let stdout_reader =
            tokio::spawn(async move { tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await });
        let stderr_reader = tokio::spawn(async move {
            let mut text = String::new();
            stderr.read_to_string(&mut text).await.map(|_| text)
        });

        Ok(Box::new(ProcessSession {
            group: ProcessGroup::new(child.id()),
            child,
            stdin: Some(stdin),
            stdout_reader: Some(stdout_reader),
            stderr_reader: Some(stderr_reader),
        }))
    }
}

struct ProcessSession {
    // Declared before `child` so the group is killed while its leader is unreaped
    group: ProcessGroup,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout_reader: Option<JoinHandle<std::io::Result<u64>>>,
    stderr_reader: Option<JoinHandle<std::io::Result<String>>>,
}

impl ProcessSession {
    async fn collect_stderr(&mut self) -> String {
        let Some(reader) = self.stderr_reader.take() else {
            return String::new();
        };
        let abort = reader.abort_handle();
        match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, reader).await {
            Ok(Ok(Ok(text))) => text,
            Ok(Ok(Err(e))) => {
                tracing::debug!(error = %e, "Failed reading sandbox stderr");
                String::new()
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Sandbox stderr reader did not finish");
                String::new()
            }
            Err(_) => {
                // A kernel that outlived nbconvert still holds the pipe open
                abort.abort();
                String::new()
            }
        }
    }
}

#[async_trait]
impl SandboxSession for ProcessSession {
    async fn execute(&mut self, notebook: &Notebook) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            let written = async {
                stdin.write_all(notebook.raw().as_bytes()).await?;
                stdin.shutdown().await
            }
            .await;
            if let Err(e) = written {
                // The process exited early; its stderr says why
                tracing::debug!(error = %e, "Sandbox closed stdin before the notebook was sent");
            }
        }

        match self.group.leader_exited().await {
            // nbconvert is done; whatever is left in its group is a stray kernel
            Ok(()) => self.group.kill(),
            Err(e) => tracing::debug!(error = %e, "Cannot observe sandbox exit without reaping"),
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::execution(format!("failed to wait for sandbox process: {e}")))?;
        self.group.mark_reaped();
        let stderr = self.collect_stderr().await;

        if status.success() {
            Ok(())
        } else {
            Err(Error::execution(diagnostic(&stderr, status)))
        }
    }

    fn into_resources(self: Box<Self>) -> Vec<Box<dyn Releasable>> {
        let ProcessSession {
            group,
            child,
            stdin,
            stdout_reader,
            stderr_reader,
        } = *self;
        let channels: Box<dyn Releasable> = Box::new(Channels {
            stdin,
            readers: [
                stdout_reader.map(|handle| handle.abort_handle()),
                stderr_reader.map(|handle| handle.abort_handle()),
            ],
        });
        let kernel: Box<dyn Releasable> = Box::new(KernelProcess { group, child });
        vec![channels, kernel]
    }
}

/// Tail of stderr, or the exit status when stderr was empty
fn diagnostic(stderr: &str, status: ExitStatus) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return format!("sandbox process exited with {status}");
    }
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}

/// Control channel: stdin plus the pipe reader tasks
struct Channels {
    stdin: Option<ChildStdin>,
    readers: [Option<tokio::task::AbortHandle>; 2],
}

#[async_trait]
impl Releasable for Channels {
    fn name(&self) -> &str {
        "channels"
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let Channels { stdin, readers } = *self;
        drop(stdin);
        for reader in readers.into_iter().flatten() {
            reader.abort();
        }
        Ok(())
    }
}

/// The nbconvert process and, through its process group, the kernel
struct KernelProcess {
    group: ProcessGroup,
    child: Child,
}

#[async_trait]
impl Releasable for KernelProcess {
    fn name(&self) -> &str {
        "kernel"
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let KernelProcess { mut group, mut child } = *self;
        if !group.is_live() {
            return Ok(());
        }

        group.kill();
        child
            .start_kill()
            .map_err(|e| Error::execution(format!("failed to kill sandbox process: {e}")))?;
        child
            .wait()
            .await
            .map_err(|e| Error::execution(format!("failed to reap sandbox process: {e}")))?;
        group.mark_reaped();
        Ok(())
    }
}

/// Process group led by the sandbox process.
///
/// The group id equals the leader's pid, which cannot be reused until the
/// leader is reaped. The group is therefore only signalled while the leader
/// is unreaped, and it is killed on drop.
struct ProcessGroup {
    leader: Option<u32>,
    live: bool,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            leader,
            live: leader.is_some(),
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn mark_reaped(&mut self) {
        self.live = false;
    }

    /// Wait for the leader to exit while leaving it reapable
    async fn leader_exited(&self) -> std::io::Result<()> {
        match self.leader {
            Some(pid) if self.live => wait_exited_unreaped(pid).await,
            _ => Err(std::io::Error::other("process group leader already reaped")),
        }
    }

    fn kill(&self) {
        #[cfg(unix)]
        {
            if let (true, Some(pid)) = (self.live, self.leader) {
                kill_process_group(pid);
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
async fn wait_exited_unreaped(pid: u32) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || loop {
        // SAFETY: siginfo_t is plain data and all-zero is a valid value
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: WNOWAIT leaves the child a zombie, so tokio still reaps it
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let error = std::io::Error::last_os_error();
        if error.kind() != std::io::ErrorKind::Interrupted {
            return Err(error);
        }
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(not(unix))]
async fn wait_exited_unreaped(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::other("process groups are unix only"))
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the unreaped leader reserves the id
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::trace!(pgid, "Process group already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec() -> SessionSpec {
        SessionSpec {
            kernel: "python3".to_string(),
            budget: Duration::from_secs(15),
            working_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn test_nbconvert_args_carry_budget_and_kernel() {
        let args = nbconvert_args(&spec());
        assert!(args.contains(&"--execute".to_string()));
        assert!(args.contains(&"--stdin".to_string()));
        assert!(args.contains(&"--ExecutePreprocessor.timeout=15".to_string()));
        assert!(args.contains(&"--ExecutePreprocessor.kernel_name=python3".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_diagnostic_keeps_tail() {
        use std::os::unix::process::ExitStatusExt;

        let mut stderr = String::new();
        for i in 0..30 {
            stderr.push_str(&format!("line {i}\n\n"));
        }
        stderr.push_str(
            "nbclient.exceptions.CellTimeoutError: A cell timed out while it was being executed, after 1 seconds.\n",
        );
        let message = diagnostic(&stderr, ExitStatus::from_raw(256));

        assert_eq!(message.lines().count(), DIAGNOSTIC_TAIL_LINES);
        assert!(message.ends_with("after 1 seconds."));
        assert!(message.contains("A cell timed out"));
        assert!(!message.contains("line 0\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_diagnostic_falls_back_to_status() {
        use std::os::unix::process::ExitStatusExt;

        let message = diagnostic("  \n", ExitStatus::from_raw(256));
        assert!(message.starts_with("sandbox process exited with"));
    }

    #[cfg(target_os = "linux")]
    mod group {
        use crate::document::Notebook;
        use crate::process::ProcessSandbox;
        use crate::session::{Sandbox, SessionSpec};
        use std::fs;
        use std::path::Path;
        use std::time::Duration;
        use tempfile::TempDir;

        const NOTEBOOK: &str = r#"{"nbformat": 4, "nbformat_minor": 5, "cells": []}"#;

        fn scripted(dir: &Path, script: &str) -> (ProcessSandbox, SessionSpec) {
            fs::write(dir.join("nbconvert"), script).unwrap();
            let spec = SessionSpec {
                kernel: "python3".to_string(),
                budget: Duration::from_secs(15),
                working_dir: dir.to_path_buf(),
            };
            (ProcessSandbox::new("sh"), spec)
        }

        async fn read_pid(path: &Path) -> i32 {
            for _ in 0..50 {
                if let Some(pid) = fs::read_to_string(path)
                    .ok()
                    .and_then(|text| text.trim().parse().ok())
                {
                    return pid;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            panic!("{} was never written", path.display());
        }

        // Exited or a zombie waiting for init
        fn is_dead(pid: i32) -> bool {
            match fs::read_to_string(format!("/proc/{pid}/stat")) {
                Err(_) => true,
                Ok(stat) => stat
                    .rsplit(')')
                    .next()
                    .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            }
        }

        async fn wait_dead(pid: i32) -> bool {
            for _ in 0..50 {
                if is_dead(pid) {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            false
        }

        #[tokio::test]
        async fn test_stray_kernel_is_killed_when_nbconvert_exits() {
            let dir = TempDir::new().unwrap();
            let (sandbox, spec) = scripted(
                dir.path(),
                "cat > /dev/null\nsleep 60 > /dev/null 2>&1 &\necho $! > kernel.pid\nexit 0\n",
            );
            let notebook =
                Notebook::parse(Path::new("basic.ipynb"), NOTEBOOK.to_string()).unwrap();

            let mut session = sandbox.start(&spec).await.unwrap();
            session.execute(&notebook).await.unwrap();

            let kernel = read_pid(&dir.path().join("kernel.pid")).await;
            assert!(wait_dead(kernel).await, "kernel {kernel} outlived nbconvert");

            // The leader is reaped, so teardown has nothing left to signal
            for resource in session.into_resources() {
                resource.release().await.unwrap();
            }
        }

        #[tokio::test]
        async fn test_dropping_a_session_kills_its_group() {
            let dir = TempDir::new().unwrap();
            let (sandbox, spec) = scripted(
                dir.path(),
                "sleep 60 > /dev/null 2>&1 &\necho $! > kernel.pid\nwait\n",
            );

            let session = sandbox.start(&spec).await.unwrap();
            let kernel = read_pid(&dir.path().join("kernel.pid")).await;
            drop(session);

            assert!(wait_dead(kernel).await, "kernel {kernel} outlived its session");
        }

        #[tokio::test]
        async fn test_release_kills_a_running_session() {
            let dir = TempDir::new().unwrap();
            let (sandbox, spec) = scripted(
                dir.path(),
                "sleep 60 > /dev/null 2>&1 &\necho $! > kernel.pid\nwait\n",
            );

            let session = sandbox.start(&spec).await.unwrap();
            let kernel = read_pid(&dir.path().join("kernel.pid")).await;
            for resource in session.into_resources() {
                resource.release().await.unwrap();
            }

            assert!(wait_dead(kernel).await, "kernel {kernel} survived teardown");
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_start_error() {
        let sandbox = ProcessSandbox::new("nbrun-definitely-not-installed");
        let error = match sandbox.start(&spec()).await {
            Ok(_) => panic!("spawning a missing program must fail"),
            Err(e) => e,
        };
        assert!(matches!(error, Error::SandboxStart { .. }));
    }
}
