use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Everything that can go wrong while serving one archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive {identifier} does not exist or was removed")]
    NotFound { identifier: String },

    #[error("failed to start compression process: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to read compression output: {0}")]
    Read(#[source] io::Error),

    #[error("download was interrupted")]
    StreamInterrupted,

    #[error("compression process did not finish cleanly ({})", describe_exit(.status))]
    ProcessExit { status: Option<ExitStatus> },

    #[error("index page unavailable: {0}")]
    IndexUnavailable(#[source] io::Error),
}

fn describe_exit(status: &Option<ExitStatus>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "exit status unknown".to_string(),
    }
}

impl ArchiveError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        ArchiveError::NotFound {
            identifier: identifier.into(),
        }
    }
}

impl warp::reject::Reject for ArchiveError {}
