//! Local configuration
//!
//! Stored as `config.json` in the data directory (default `~/.unlisted`).
//! A missing file means defaults; `init` writes one out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DaemonError;
use crate::service::{KeyAlgorithm, DEFAULT_API_URL};

/// File name of the configuration inside a data directory
pub const CONFIG_FILE: &str = "config.json";

/// Default prefix of per-contact keypair names
pub const DEFAULT_KEYPAIR_PREFIX: &str = "unlisted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage service RPC endpoint
    pub api_url: String,
    /// Keypairs are named `{keypair_prefix}.{display_name}`
    pub keypair_prefix: String,
    /// Algorithm for newly generated contact keypairs
    pub key_algorithm: KeyAlgorithm,
    /// Per-request timeout for the storage service client
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            keypair_prefix: DEFAULT_KEYPAIR_PREFIX.to_string(),
            key_algorithm: KeyAlgorithm::default(),
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Name of the keypair that publishes our file list for `display_name`.
    pub fn keypair_name(&self, display_name: &str) -> String {
        format!("{}.{}", self.keypair_prefix, display_name)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read the configuration in `data_dir`, falling back to defaults when
    /// there is none.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, DaemonError> {
        let path = data_dir.as_ref().join(CONFIG_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!(?path, "Loaded config");
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Create `data_dir` and write this configuration into it.
    pub fn init(&self, data_dir: impl AsRef<Path>) -> Result<PathBuf, DaemonError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| DaemonError::InitFailed(Arc::new(e)))?;
        let path = self.save(data_dir)?;
        info!(?path, "Initialised data directory");
        Ok(path)
    }

    /// Overwrite the config file in an existing `data_dir`.
    pub fn save(&self, data_dir: impl AsRef<Path>) -> Result<PathBuf, DaemonError> {
        let path = data_dir.as_ref().join(CONFIG_FILE);
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| DaemonError::FailedToAlterConfigFile(Arc::new(e)))?;
        std::fs::write(&path, data)
            .map_err(|e| DaemonError::FailedToAlterConfigFile(Arc::new(e)))?;
        Ok(path)
    }
}

/// `~/.unlisted`, or `.unlisted` in the working directory without a home.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".unlisted")
}
