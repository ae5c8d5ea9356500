//! Shared helpers for the HTTP level tests.

use std::path::Path;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serve_archive::process::{ArchiveJob, JobState, Launcher, ZipLauncher};
use serve_archive::ArchiveError;
use tokio::sync::mpsc;

/// Wraps a real launcher and reports every start and terminate call.
pub struct SpyLauncher {
    inner: ZipLauncher,
    starts: AtomicUsize,
    terminations: mpsc::UnboundedSender<JobState>,
}

impl SpyLauncher {
    pub fn new(inner: ZipLauncher) -> (Arc<Self>, mpsc::UnboundedReceiver<JobState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let spy = Arc::new(Self {
            inner,
            starts: AtomicUsize::new(0),
            terminations: tx,
        });
        (spy, rx)
    }

    /// Runs `script` with `sh -c` inside the archive directory.
    #[allow(dead_code)]
    pub fn shell(script: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<JobState>) {
        Self::new(ZipLauncher::with_args("sh", ["-c", script]))
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl Launcher for SpyLauncher {
    fn start(&self, dir: &Path) -> Result<Box<dyn ArchiveJob>, ArchiveError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.start(dir)?;
        Ok(Box::new(SpyJob {
            inner,
            terminations: self.terminations.clone(),
        }))
    }
}

struct SpyJob {
    inner: Box<dyn ArchiveJob>,
    terminations: mpsc::UnboundedSender<JobState>,
}

#[async_trait]
impl ArchiveJob for SpyJob {
    async fn read(&mut self, chunk_size: usize) -> Result<Option<Bytes>, ArchiveError> {
        self.inner.read(chunk_size).await
    }

    async fn terminate(&mut self) -> JobState {
        let state = self.inner.terminate().await;
        let _ = self.terminations.send(state);
        state
    }

    fn state(&self) -> JobState {
        self.inner.state()
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        self.inner.exit_status()
    }
}

/// Root folder with one archive directory holding `payload.bin`.
#[allow(dead_code)]
pub fn archive_root(identifier: &str, payload: &[u8]) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join(identifier);
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("payload.bin"), payload).unwrap();
    root
}

/// True when the real `zip` tool is installed.
#[allow(dead_code)]
pub fn zip_available() -> bool {
    std::process::Command::new("zip")
        .arg("-v")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
