use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command line flags.
#[derive(Debug, Parser)]
#[command(name = "serve_archive")]
#[command(about = "Streams zip archives of directories over HTTP", long_about = None)]
pub struct Args {
    /// Folder that holds one directory per archive
    #[arg(short = 'p', long, default_value = "test_photos")]
    pub loading_path: PathBuf,

    /// Enable info level logging
    #[arg(short, long)]
    pub logging: bool,

    /// Seconds to wait after each sent chunk
    #[arg(short, long, default_value_t = 1)]
    pub delay: u64,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Page served at `/`
    #[arg(long, default_value = "index.html")]
    pub index: PathBuf,

    /// Compression tool, invoked as `<program> -r - .`
    #[arg(long, default_value = "zip")]
    pub zip_program: String,
}

/// Settings shared read-only by every request.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub loading_path: PathBuf,
    pub delay: Duration,
    pub logging: bool,
    pub bind_address: SocketAddr,
    pub index_path: PathBuf,
    pub zip_program: String,
}

impl ServerConfig {
    pub fn new(loading_path: impl Into<PathBuf>) -> Self {
        Self {
            loading_path: loading_path.into(),
            delay: Duration::ZERO,
            logging: false,
            bind_address: ([0, 0, 0, 0], 8080).into(),
            index_path: PathBuf::from("index.html"),
            zip_program: "zip".to_string(),
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            loading_path: args.loading_path,
            delay: Duration::from_secs(args.delay),
            logging: args.logging,
            bind_address: SocketAddr::new(args.host, args.port),
            index_path: args.index,
            zip_program: args.zip_program,
        }
    }
}
