//! Core error types for flowsense-core.
//!
//! Invalid lifecycle transitions are not errors here: they surface as
//! [`SessionEvent::TransitionRejected`](crate::events::SessionEvent) and
//! leave state unchanged. The types below cover storage, configuration
//! and the terminal persistence write.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionSnapshot;

/// Core error type for flowsense-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot sink errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row could not be decoded back into a snapshot
    #[error("Corrupt session row '{id}': {message}")]
    CorruptRow { id: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Data directory could not be resolved or created
    #[error("Cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Errors returned by a [`SnapshotSink`](crate::storage::SnapshotSink).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Sink is temporarily unable to accept writes
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(DatabaseError::QueryFailed(err))
    }
}

/// Errors from [`SessionOrchestrator`](crate::orchestrator::SessionOrchestrator)
/// operations that cannot be expressed as advisory events.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The terminal snapshot was produced but could not be written.
    ///
    /// The snapshot is handed back so the caller can retry or keep it.
    #[error("Final write of session {} failed: {source}", snapshot.id)]
    FinalPersist {
        snapshot: Box<SessionSnapshot>,
        #[source]
        source: StoreError,
    },
}
