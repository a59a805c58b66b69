//! Error taxonomy shared by every crate in the workspace.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by adapters and, transitively, by the catalog engine.
///
/// Mirrors the kinds the rest of the workspace tags its failures with so a
/// caller can match on `kind()` regardless of which crate raised the error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// File, directory, subprocess pipe, or socket access failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path (or descriptive pseudo-path, e.g. `"<vision worker stdin>"`) involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A payload did not parse into the shape this layer expected.
    #[error("format error: {0}")]
    Format(String),

    /// The upstream embedding provider failed: non-2xx status, dimension
    /// mismatch, or a NaN component, after retries were exhausted.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The catalog's persisted schema/model identity is incompatible with
    /// what the caller requested.
    #[error("schema error: {0}")]
    Schema(String),

    /// An adapter or caller was used in a way its contract forbids (e.g.
    /// calling `embed_documents` on a vision adapter).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation was aborted cooperatively via a cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result alias used throughout `catalog-core`.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Wraps an [`std::io::Error`] with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
