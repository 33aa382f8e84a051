//! Error types for mongo_db_dump

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dump operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Configuration file not found: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("{reason}")]
    Connection { reason: String },

    #[error("Unable to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Mongo shell command failed: {reason}")]
    Shell { reason: String },

    #[error("Mail delivery failed: {reason}")]
    Mail { reason: String },

    #[error("Program lock in place for id: {flavor}")]
    LockHeld { flavor: String },
}

/// Result type alias for dump operations
pub type Result<T> = std::result::Result<T, Error>;
