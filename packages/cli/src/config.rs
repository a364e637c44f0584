// ABOUTME: Server configuration loaded from the environment
// ABOUTME: Port, CORS origin and database path, each overridable from the command line

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;

use pmstation_config::{constants, env as config_env};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub cors_origin: String,
    pub database_path: PathBuf,
    /// Directory of `<category>/<id>.json` templates replacing the built-in prompts
    pub prompts_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var(constants::PORT) {
            Ok(raw) => raw.trim().parse::<u16>()?,
            Err(_) => constants::DEFAULT_PORT,
        };
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let cors_origin =
            config_env::env_string_or(constants::CORS_ORIGIN, constants::DEFAULT_CORS_ORIGIN);

        let database_path = config_env::env_string(constants::PMSTATION_DATABASE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(pmstation_core::default_database_path);

        let prompts_dir = config_env::env_string(constants::PMSTATION_PROMPTS_DIR).map(PathBuf::from);

        Ok(Config {
            port,
            cors_origin,
            database_path,
            prompts_dir,
        })
    }

    /// Apply command line overrides
    pub fn with_overrides(
        mut self,
        port: Option<u16>,
        database: Option<PathBuf>,
        prompts: Option<PathBuf>,
    ) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(database) = database {
            self.database_path = database;
        }
        if prompts.is_some() {
            self.prompts_dir = prompts;
        }
        self
    }
}
