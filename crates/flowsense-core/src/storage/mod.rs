mod config;
pub mod database;
mod sink;

pub use config::{BreaksConfig, Config, FlowConfig, SessionConfig};
pub use database::{Database, Stats};
pub use sink::{MemorySink, SnapshotSink};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the FlowSense data directory, creating it if needed.
///
/// `FLOWSENSE_DATA_DIR` overrides the location. Otherwise this is
/// `~/.config/flowsense[-dev]/`, with the `-dev` suffix when
/// `FLOWSENSE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FLOWSENSE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FLOWSENSE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("flowsense-dev")
            } else {
                base_dir.join("flowsense")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
