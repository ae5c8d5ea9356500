use std::convert::Infallible;

use warp::{Filter, Reply};

use crate::handlers::{handle_archive, recover};
use crate::state::ServerState;
use crate::web::handle_index;

/// `GET /` and `GET /archive/{identifier}/`.
pub fn routes(state: ServerState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(state.with_state())
        .and_then(handle_index);

    // Matches with or without the trailing slash
    let archive = warp::path!("archive" / String)
        .and(warp::get())
        .and(state.with_state())
        .and_then(handle_archive);

    index
        .or(archive)
        .recover(recover)
        .with(warp::trace::request())
}
