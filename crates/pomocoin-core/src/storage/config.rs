//! TOML-based application configuration.
//!
//! Stores process-level preferences:
//! - Ledger constants (starting coins, task completion bonus)
//! - Log filter for the CLI subscriber
//! - Database file name inside the data directory
//!
//! Configuration is stored at `<data_dir>/config.toml`. User-facing timer
//! settings are a separate document in the store, see [`crate::Settings`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{data_dir, json_path};
use crate::error::{ConfigError, Result};

/// Progress ledger constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Coins in a freshly created progress document.
    #[serde(default = "default_initial_coins")]
    pub initial_coins: u64,
    /// Coins awarded per completed task.
    #[serde(default = "default_task_completion_bonus")]
    pub task_completion_bonus: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `POMOCOIN_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// SQLite file name, relative to the data directory.
    #[serde(default = "default_database")]
    pub database: String,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_initial_coins() -> u64 {
    100
}
fn default_task_completion_bonus() -> u64 {
    5
}
fn default_log_filter() -> String {
    "warn".into()
}
fn default_database() -> String {
    "pomocoin.db".into()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_coins: default_initial_coins(),
            task_completion_bonus: default_task_completion_bonus(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default config");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        json_path::get_value(self, key)
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        *self = json_path::with_value(self, key, value)?;
        self.save()
    }
}
