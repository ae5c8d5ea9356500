use std::sync::Arc;

use warp::Filter;

use crate::config::ServerConfig;
use crate::process::{Launcher, ZipLauncher};

/// Read-only context handed to every request.
#[derive(Clone)]
pub struct ServerState {
    config: Arc<ServerConfig>,
    launcher: Arc<dyn Launcher>,
}

impl ServerState {
    pub fn new(config: ServerConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config: Arc::new(config),
            launcher,
        }
    }

    /// State that compresses with the configured zip program.
    pub fn from_config(config: ServerConfig) -> Self {
        let launcher = Arc::new(ZipLauncher::new(config.zip_program.clone()));
        Self::new(config, launcher)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn launcher(&self) -> &dyn Launcher {
        self.launcher.as_ref()
    }

    pub fn with_state(&self) -> impl Filter<Extract = (ServerState,), Error = std::convert::Infallible> + Clone {
        let state = self.clone();
        warp::any().map(move || state.clone())
    }
}
