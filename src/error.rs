//! Typed failures of the record store and settings file.

use std::path::PathBuf;

use uuid::Uuid;

use crate::period::YearMonth;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another record already covers this store and month.
    #[error("a record already exists for this store this month ({store_id}, {month})")]
    Conflict { store_id: Uuid, month: YearMonth },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}
