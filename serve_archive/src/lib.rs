//! On-demand zip archives of server side directories, streamed over HTTP.
//!
//! `GET /archive/{identifier}/` compresses `{loading_path}/{identifier}` by
//! running `zip -r - .` and pipes its output to the client in 200 KiB chunks,
//! optionally throttled by a delay after every chunk.

pub mod config;
pub mod error;
pub mod handlers;
pub mod locator;
pub mod logging;
pub mod process;
pub mod routes;
pub mod state;
pub mod transmit;
pub mod web;

pub use config::{Args, ServerConfig};
pub use error::ArchiveError;
pub use routes::routes;
pub use state::ServerState;
