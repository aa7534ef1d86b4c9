//! Error types for AtlasLog
//!
//! Provides a unified error type for all operations.

use std::num::ParseIntError;

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for AtlasLog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Recovery Errors
    // -------------------------------------------------------------------------
    /// A directory entry looked like `<name>-<id>` but the id was not a number.
    #[error("Corrupt map name '{name}': {source}")]
    CorruptMapName {
        name: String,
        #[source]
        source: ParseIntError,
    },

    // -------------------------------------------------------------------------
    // Map Errors
    // -------------------------------------------------------------------------
    #[error("Map data corruption detected: {0}")]
    Corruption(String),

    #[error("Map '{0}' is closed")]
    MapClosed(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Log storage is closed")]
    Closed,
}

impl From<bincode::Error> for LogError {
    fn from(err: bincode::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}
