mod config;
pub mod database;
pub(crate) mod json_path;
mod memory;

pub use config::{Config, LedgerConfig, LoggingConfig, StorageConfig};
pub use database::Database;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{ConfigError, Result, StorageError};

/// Well-known document keys.
pub mod keys {
    pub const PROGRESS: &str = "progress";
    pub const TIMER_SNAPSHOT: &str = "timer_snapshot";
    pub const TIMER_POSITION: &str = "timer_position";
    pub const SETTINGS: &str = "settings";
}

/// Key-value persistence over named JSON documents.
///
/// Implementations must be shareable between the timer engine and the
/// ledger, which both hold an `Arc<dyn KvStore>`.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a document.
///
/// Absent keys and unparsable payloads come back as `Ok(None)`; corrupt data
/// is treated as absent rather than fatal. A failing store is an error, never
/// an absent document.
///
/// # Errors
/// Returns [`CoreError::Storage`](crate::error::CoreError::Storage) if the
/// store read fails.
pub fn read_document<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unparsable document");
            Ok(None)
        }
    }
}

/// Encode and write a document.
pub fn write_document<T: Serialize>(store: &dyn KvStore, key: &str, doc: &T) -> Result<()> {
    let json = serde_json::to_string(doc)?;
    store.set(key, &json)?;
    Ok(())
}

/// Returns the data directory and creates it if needed.
///
/// `POMOCOIN_DATA_DIR` wins outright. Otherwise `~/.config/pomocoin[-dev]/`
/// based on `POMOCOIN_ENV` (set it to `dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POMOCOIN_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join(".config");
            let env = std::env::var("POMOCOIN_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomocoin-dev")
            } else {
                base_dir.join("pomocoin")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
