use core::net::SocketAddr;
use std::{env, fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::database::Database;

/// The environment variable that overrides the MongoDB connection string.
pub const DATABASE_URI_VARIABLE: &str = "MONGODB_URI";

/// The server's authorization config.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer tokens that may manage backups. No tokens rejects every request.
    pub admin_tokens: Vec<String>,
}

/// The server's config
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// The address to listen for requests on.
    pub socket_address: SocketAddr,

    /// The directory to store backups in.
    pub backup_directory: PathBuf,

    /// The directory to write log files to.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,

    /// The server's authorization config.
    #[serde(default)]
    pub auth: AuthConfig,

    /// The database to back up.
    pub database: Database,
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    /// Tries to load a config from a toml file.
    pub fn load_toml(file_path: PathBuf) -> Result<Self, LoadConfigError> {
        if !file_path.exists() {
            return Err(LoadConfigError::NoFile);
        }

        let contents = fs::read_to_string(file_path).map_err(LoadConfigError::Read)?;
        let config = toml::from_str(&contents)?;

        Ok(config)
    }

    /// Apply overrides from environment variables.
    pub fn apply_environment(&mut self) {
        if let Ok(uri) = env::var(DATABASE_URI_VARIABLE) {
            self.override_database_uri(uri);
        }
    }

    /// Override the connection string of a MongoDB database.
    pub fn override_database_uri(&mut self, uri: String) {
        if let Database::Mongo(mongo) = &mut self.database {
            info!("Using the database connection string from {DATABASE_URI_VARIABLE}");
            mongo.uri = uri;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backup_directory: PathBuf::from("backups"),
            log_directory: default_log_directory(),
            auth: AuthConfig::default(),
            database: Database::default(),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("The file does not exist.")]
    NoFile,

    #[error("Failed to read the file:\n{0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to deserialize the file:\n{0}")]
    Deserialize(#[from] toml::de::Error),
}
