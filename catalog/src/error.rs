//! Error taxonomy for the catalog engine (§7).

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the catalog engine.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File, directory, or database-file access failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Front-matter, chunk-cache layout, or vision multi-vector blob did
    /// not parse.
    #[error("format error: {0}")]
    Format(String),

    /// The embedding provider failed after retries.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Incompatible `schema_version`, or the catalog's persisted
    /// `model_id`/dimension does not match what the caller requested.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid options or an adapter capability mismatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying SQLite store reported an error.
    #[error("database error: {0}")]
    Database(String),

    /// Operation was aborted cooperatively via a cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result alias used throughout the catalog engine.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Wraps an [`std::io::Error`] with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<catalog_core::CoreError> for CatalogError {
    fn from(err: catalog_core::CoreError) -> Self {
        match err {
            catalog_core::CoreError::Io { path, source } => Self::Io { path, source },
            catalog_core::CoreError::Format(msg) => Self::Format(msg),
            catalog_core::CoreError::Embedding(msg) => Self::Embedding(msg),
            catalog_core::CoreError::Schema(msg) => Self::Schema(msg),
            catalog_core::CoreError::Configuration(msg) => Self::Configuration(msg),
            catalog_core::CoreError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}
