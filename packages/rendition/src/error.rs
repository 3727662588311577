use std::time::Duration;

use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;

/// Failures of the derived-asset store (blob bytes or metadata rows).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Value out of range for column {0}")]
    OutOfRange(&'static str),
}

#[derive(Debug, Error)]
pub enum RenditionError {
    #[error("Invalid dimensions: cannot fit {width}x{height} into a {size}px box")]
    InvalidDimensions { width: u32, height: u32, size: u32 },

    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Regeneration timed out after {0:?}")]
    Timeout(Duration),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, RenditionError>;
