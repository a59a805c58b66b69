//! Embedding adapter abstractions and wire clients shared by the hybrid
//! catalog engine.
//!
//! This crate owns the boundary between the catalog and whatever actually
//! produces vectors: an [`error`] taxonomy every other crate in the
//! workspace re-exports from, a dense [`text`] adapter talking to an
//! OpenAI-compatible embedding HTTP endpoint, and a multi-vector [`vision`]
//! adapter talking to a subprocess over the [`protocol`] described in the
//! interface contract.
//!
//! Text and vision are deliberately two traits rather than one dynamically
//! dispatched adapter: a dense embedder returns one vector per input, a
//! vision embedder returns a variable-length list of token vectors per
//! input, and conflating them behind a single `embed(&self) -> Embedding`
//! signature would push the "is this query text or an image" check to
//! runtime where it belongs at the type level instead.

pub mod error;
pub mod protocol;
pub mod text;
pub mod vision;

pub use error::{CoreError, Result};
pub use text::{HttpTextEmbedder, TextEmbedder, Vector};
pub use vision::{MultiVector, PageExtractor, SubprocessVisionWorker, VisionEmbedder};
