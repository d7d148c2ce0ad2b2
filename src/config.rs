//! Engine configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default:
//!
//! ```json
//! {
//!   "manager": { "default_timeout_secs": 30, "validate_existing_transaction": false },
//!   "backend": { "pool_size": 10, "acquire_timeout_ms": 30000, "savepoints": true },
//!   "logging": { "level": "info", "format": "pretty" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogConfig;
use crate::storage::{MemoryBackend, MemoryBackendConfig};
use crate::transaction::{ManagerConfig, TransactionManager, TIMEOUT_DEFAULT};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration of the transfer engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub manager: ManagerConfig,
    pub backend: MemoryBackendConfig,
    pub logging: LogConfig,
}

impl EngineConfig {
    /// Read and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_manager(mut self, manager: ManagerConfig) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_backend(mut self, backend: MemoryBackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.pool_size == 0 {
            return Err(ConfigError::Invalid("backend.pool_size must be at least 1".into()));
        }
        if self.manager.default_timeout_secs < TIMEOUT_DEFAULT {
            return Err(ConfigError::Invalid(format!(
                "manager.default_timeout_secs must be -1 or non-negative, got {}",
                self.manager.default_timeout_secs
            )));
        }
        Ok(())
    }

    /// Build a memory backend and a manager over it.
    pub fn build(&self) -> (MemoryBackend, TransactionManager) {
        let backend = MemoryBackend::with_config(self.backend.clone());
        let manager = TransactionManager::with_config(backend.clone(), self.manager.clone());
        (backend, manager)
    }
}
