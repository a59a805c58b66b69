//! The vision worker's newline-delimited JSON-RPC protocol (§6).
//!
//! A closed, enumerated message set — REDESIGN FLAG: no free-form method
//! names reach the wire without being validated against [`Method`] first.

use serde::{Deserialize, Serialize};

/// The methods the vision worker accepts, one per child-process call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Liveness probe.
    Health,
    /// Multi-vector embed a batch of page images.
    EmbedImages,
    /// Multi-vector embed a single query string.
    EmbedQuery,
    /// Multi-vector embed a batch of query strings.
    EmbedQueries,
    /// Rasterize a PDF into page images.
    ExtractPages,
    /// Ask the worker to exit cleanly.
    Shutdown,
}

impl Method {
    /// The wire name used in the `method` field of a request.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::EmbedImages => "embed_images",
            Self::EmbedQuery => "embed_query",
            Self::EmbedQueries => "embed_queries",
            Self::ExtractPages => "extract_pages",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A request sent to the worker on its stdin, one JSON object per line.
#[derive(Debug, Serialize)]
pub struct Request {
    /// Monotonic request id, echoed back in the response.
    pub id: u64,
    /// The enumerated method name.
    pub method: &'static str,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

impl Request {
    /// Builds a request for `method` with the given `params`.
    #[must_use]
    pub fn new(id: u64, method: Method, params: serde_json::Value) -> Self {
        Self {
            id,
            method: method.as_str(),
            params,
        }
    }
}

/// A response read from the worker's stdout, one JSON object per line.
#[derive(Debug, Deserialize)]
pub struct Response {
    /// Echoes the request's id.
    pub id: u64,
    /// The successful payload, when present.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// The error message, when present.
    #[serde(default)]
    pub error: Option<String>,
}

/// The worker's first line on startup: `{"ready": true, "model": ..., "device": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyNotice {
    /// Always `true`; the field exists so the shape is self-describing on
    /// the wire.
    pub ready: bool,
    /// The model identifier the worker loaded.
    pub model: String,
    /// The compute device the worker is using (e.g. `"cpu"`, `"cuda:0"`).
    pub device: String,
}

/// Payload of a successful `embed_images`/`embed_query`/`embed_queries`
/// response: nested float32 arrays plus a parallel vector-count list.
#[derive(Debug, Deserialize)]
pub struct EmbeddingsPayload {
    /// `embeddings[i]` is the flattened list of token vectors for input `i`.
    pub embeddings: Vec<Vec<Vec<f32>>>,
    /// `num_vectors[i]` is `embeddings[i].len()`, provided redundantly by
    /// the wire protocol for cheap validation.
    pub num_vectors: Vec<usize>,
}

/// Payload of a successful `extract_pages` response.
#[derive(Debug, Deserialize)]
pub struct ExtractPagesPayload {
    /// Deterministically named, 0-based-page-indexed image paths.
    pub paths: Vec<String>,
}
