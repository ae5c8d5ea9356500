//! Pump from the compression output into the response body.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::ArchiveError;
use crate::process::ArchiveJob;

/// Bytes moved from the process to the response per write.
pub const CHUNK_SIZE: usize = 200 * 1024;

/// Sender half of a streamed response body.
pub type BodySender = mpsc::Sender<Result<Bytes, io::Error>>;

/// Where archive chunks go. Closing is how a client disconnect shows up.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Waits until the chunk is accepted.
    async fn send(&mut self, chunk: Bytes) -> Result<(), ArchiveError>;

    /// Resolves once nobody is reading anymore.
    async fn closed(&self);
}

#[async_trait]
impl ChunkSink for BodySender {
    async fn send(&mut self, chunk: Bytes) -> Result<(), ArchiveError> {
        mpsc::Sender::send(self, Ok(chunk))
            .await
            .map_err(|_| ArchiveError::StreamInterrupted)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

/// Per response transfer settings and counters.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub chunk_size: usize,
    pub delay: Duration,
    pub bytes_sent: u64,
    pub chunks_sent: u64,
}

impl StreamSession {
    pub fn new(delay: Duration) -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            delay,
            bytes_sent: 0,
            chunks_sent: 0,
        }
    }
}

/// Move every chunk of `job` into `sink` in order, sleeping `session.delay`
/// after each write.
///
/// Returns `StreamInterrupted` as soon as the sink closes, even while waiting
/// on the process or the throttle. The job is left for the caller to
/// terminate.
pub async fn transmit<S>(
    job: &mut dyn ArchiveJob,
    sink: &mut S,
    session: &mut StreamSession,
) -> Result<(), ArchiveError>
where
    S: ChunkSink + ?Sized,
{
    loop {
        let chunk = tokio::select! {
            read = job.read(session.chunk_size) => read?,
            _ = sink.closed() => return Err(ArchiveError::StreamInterrupted),
        };
        let Some(chunk) = chunk else {
            return Ok(());
        };

        let len = chunk.len() as u64;
        tracing::info!(chunk = session.chunks_sent + 1, bytes = len, "Sending archive chunk");
        sink.send(chunk).await?;
        session.bytes_sent += len;
        session.chunks_sent += 1;

        if !session.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(session.delay) => {}
                _ = sink.closed() => return Err(ArchiveError::StreamInterrupted),
            }
        }
    }
}
