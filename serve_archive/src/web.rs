use warp::{Rejection, Reply};

use crate::error::ArchiveError;
use crate::state::ServerState;

// Serve the index page, read fresh from disk on every request
pub async fn handle_index(state: ServerState) -> Result<impl Reply, Rejection> {
    let path = &state.config().index_path;
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(warp::reply::html(contents)),
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "Cannot read index page");
            Err(warp::reject::custom(ArchiveError::IndexUnavailable(err)))
        }
    }
}
