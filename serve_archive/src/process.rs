//! Ownership of the external compression process.
//!
//! A [`ZipJob`] is created per request and torn down exactly once through
//! [`ArchiveJob::terminate`]. The child is spawned with `kill_on_drop`, so a
//! job that is dropped without being terminated (aborted task, panic) still
//! does not leave a running process behind.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::ArchiveError;

// Diagnostics kept for the teardown log
const STDERR_TAIL: usize = 16 * 1024;

// How long a process that already closed stdout gets to exit on its own
const EXIT_GRACE: Duration = Duration::from_secs(5);

const STDERR_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Spawned,
    Running,
    Completed,
    Killed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Killed | JobState::Failed)
    }
}

/// One running compression, owned by a single request.
#[async_trait]
pub trait ArchiveJob: Send {
    /// Next chunk of archive bytes, `None` once the output is exhausted.
    ///
    /// Chunks are `chunk_size` long except for the last one.
    async fn read(&mut self, chunk_size: usize) -> Result<Option<Bytes>, ArchiveError>;

    /// Stop the process if it is still running, reap it and release its
    /// pipes. Safe to call any number of times.
    async fn terminate(&mut self) -> JobState;

    fn state(&self) -> JobState;

    /// Exit status once the process has been reaped.
    fn exit_status(&self) -> Option<ExitStatus> {
        None
    }
}

/// Starts compression jobs for archive directories.
pub trait Launcher: Send + Sync {
    fn start(&self, dir: &Path) -> Result<Box<dyn ArchiveJob>, ArchiveError>;
}

/// Runs `<program> -r - .` inside the archive directory.
#[derive(Debug, Clone)]
pub struct ZipLauncher {
    program: String,
    args: Vec<String>,
}

impl ZipLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_args(program, ["-r", "-", "."])
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Launcher for ZipLauncher {
    fn start(&self, dir: &Path) -> Result<Box<dyn ArchiveJob>, ArchiveError> {
        let job = ZipJob::spawn(&self.program, &self.args, dir)?;
        Ok(Box::new(job))
    }
}

pub struct ZipJob {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    dir: PathBuf,
    state: JobState,
    exit: Option<ExitStatus>,
    reached_eof: bool,
}

impl ZipJob {
    pub fn spawn(program: &str, args: &[String], dir: &Path) -> Result<Self, ArchiveError> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ArchiveError::Spawn)?;

        let stdout = child.stdout.take();
        // Drain diagnostics concurrently so a full pipe cannot stall the tool
        let stderr = child.stderr.take().map(|err| tokio::spawn(collect_stderr(err)));

        tracing::debug!(
            pid = ?child.id(),
            program,
            dir = %dir.display(),
            "Compression process started"
        );

        Ok(Self {
            child,
            stdout,
            stderr,
            dir: dir.to_path_buf(),
            state: JobState::Spawned,
            exit: None,
            reached_eof: false,
        })
    }

    async fn join_stderr(&mut self) -> String {
        let Some(mut handle) = self.stderr.take() else {
            return String::new();
        };
        match tokio::time::timeout(STDERR_JOIN_TIMEOUT, &mut handle).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "stderr collector failed");
                String::new()
            }
            Err(_) => {
                // Something else still holds the pipe open
                handle.abort();
                String::new()
            }
        }
    }
}

#[async_trait]
impl ArchiveJob for ZipJob {
    async fn read(&mut self, chunk_size: usize) -> Result<Option<Bytes>, ArchiveError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; chunk_size];
        let mut filled = 0;
        while filled < chunk_size {
            let n = stdout
                .read(&mut buf[filled..])
                .await
                .map_err(ArchiveError::Read)?;
            if n == 0 {
                self.reached_eof = true;
                break;
            }
            filled += n;
        }

        if self.state == JobState::Spawned {
            self.state = JobState::Running;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(Bytes::from(buf)))
    }

    async fn terminate(&mut self) -> JobState {
        if self.state.is_terminal() {
            return self.state;
        }

        let mut exited = match self.child.try_wait() {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "Could not poll compression process");
                None
            }
        };

        // Output is complete, let the tool finish writing its exit status
        if exited.is_none() && self.reached_eof {
            if let Ok(Ok(status)) = tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
                exited = Some(status);
            }
        }

        let killed = exited.is_none();
        if killed {
            if let Err(err) = self.child.start_kill() {
                tracing::warn!(error = %err, "Could not kill compression process");
            }
        }

        let status = self.child.wait().await;
        self.exit = status.as_ref().ok().copied();
        self.stdout = None;
        let diagnostics = self.join_stderr().await;

        self.state = match status {
            _ if killed => {
                tracing::debug!(dir = %self.dir.display(), "Compression process killed");
                JobState::Killed
            }
            Ok(status) if status.success() && self.reached_eof => JobState::Completed,
            // Exited on its own but the output was never fully consumed
            Ok(status) if status.success() => JobState::Killed,
            Ok(status) => {
                let err = ArchiveError::ProcessExit {
                    status: Some(status),
                };
                tracing::error!(
                    error = %err,
                    dir = %self.dir.display(),
                    stderr = %diagnostics,
                    "Archive may be truncated"
                );
                JobState::Failed
            }
            Err(err) => {
                tracing::error!(error = %err, "Could not reap compression process");
                JobState::Failed
            }
        };

        if !diagnostics.is_empty() && self.state != JobState::Failed {
            tracing::debug!(stderr = %diagnostics, "Compression process diagnostics");
        }

        self.state
    }

    fn state(&self) -> JobState {
        self.state
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }
}

async fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL {
                    let excess = tail.len() - STDERR_TAIL;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}
