use std::convert::Infallible;
use std::io;

use percent_encoding::percent_decode_str;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;
use warp::http::{header, HeaderValue, StatusCode};
use warp::hyper::Body;
use warp::{Rejection, Reply};

use crate::error::ArchiveError;
use crate::locator::locate;
use crate::process::{ArchiveJob, JobState, Launcher};
use crate::state::ServerState;
use crate::transmit::{transmit, BodySender, StreamSession};

pub async fn handle_archive(raw: String, state: ServerState) -> Result<warp::reply::Response, Rejection> {
    let config = state.config();

    // Path params arrive still percent-encoded
    let identifier = match percent_decode_str(&raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            tracing::info!(identifier = %raw, "Archive identifier is not valid UTF-8");
            return Err(warp::reject::custom(ArchiveError::not_found(raw)));
        }
    };

    // Resolve before spawning anything
    let dir = match locate(&config.loading_path, &identifier).await {
        Ok(dir) => dir,
        Err(err) => {
            tracing::info!(identifier = %identifier, "Archive not found");
            return Err(warp::reject::custom(err));
        }
    };

    let job = match state.launcher().start(&dir) {
        Ok(job) => job,
        Err(err) => {
            tracing::error!(identifier = %identifier, error = %err, "Cannot start compression");
            return Err(warp::reject::custom(err));
        }
    };

    // One chunk in flight between the pump and hyper
    let (tx, rx) = mpsc::channel(1);
    let session = StreamSession::new(config.delay);
    let span = tracing::info_span!("archive", identifier = %identifier);
    tokio::spawn(pump(job, tx, session).instrument(span));

    let mut response = warp::reply::Response::new(Body::wrap_stream(ReceiverStream::new(rx)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"photos.zip\""),
    );

    Ok(response)
}

/// Drive one transfer to the end and always tear the process down.
///
/// Failures after the headers went out are pushed into the body as an error
/// so the connection is aborted instead of ending like a complete archive.
pub async fn pump(
    mut job: Box<dyn ArchiveJob>,
    mut body: BodySender,
    mut session: StreamSession,
) -> Result<u64, ArchiveError> {
    let result = transmit(job.as_mut(), &mut body, &mut session).await;
    let state = job.terminate().await;

    let err = match (result, state) {
        (Ok(()), JobState::Completed) => {
            tracing::info!(
                bytes = session.bytes_sent,
                chunks = session.chunks_sent,
                "Archive sent"
            );
            return Ok(session.bytes_sent);
        }
        (Ok(()), _) => ArchiveError::ProcessExit {
            status: job.exit_status(),
        },
        (Err(ArchiveError::StreamInterrupted), _) => {
            tracing::warn!(bytes = session.bytes_sent, "Download was interrupted");
            return Err(ArchiveError::StreamInterrupted);
        }
        (Err(err), _) => err,
    };

    tracing::error!(error = %err, bytes = session.bytes_sent, "Aborting archive transfer");
    let _ = body.send(Err(io::Error::other(err.to_string()))).await;
    Err(err)
}

// Map rejections onto plain text responses
pub async fn recover(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(err) = rejection.find::<ArchiveError>() {
        match err {
            ArchiveError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
        }
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        tracing::warn!(rejection = ?rejection, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(message, status))
}
