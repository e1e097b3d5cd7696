//! Application context: configuration plus logger, built once per process.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, Config};
use crate::logging::{self, Logger, TracingLogger};

/// Handle passed by reference into every command.
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub logger: Arc<dyn Logger>,
}

impl AppContext {
    /// Build a context from an already-loaded config. Does not touch global state.
    pub fn new(config: Config, logger: Arc<dyn Logger>) -> Self {
        let config_path = config.base_dir.join("hx.toml");
        Self {
            config,
            config_path,
            logger,
        }
    }

    /// Load config from `config_path` and install the tracing subscriber.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = config::load_config(config_path)?;
        logging::init_tracing(&config.log, &config.log_path())?;
        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            logger: Arc::new(TracingLogger),
        })
    }
}
