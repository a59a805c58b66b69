//! The dense text-embedding adapter.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde::Deserialize;
use serde_json::json;

use crate::error::{CoreError, Result};

/// A single dense embedding vector, L2-normalized so dot product equals
/// cosine similarity.
pub type Vector = Vec<f32>;

/// Uniform surface over a text-dense embedding provider.
///
/// Implementations must return vectors whose length equals
/// [`embedding_dim`](TextEmbedder::embedding_dim) and that are L2-normalized.
pub trait TextEmbedder: Send + Sync {
    /// Prepares the adapter for use (e.g. a warm-up ping). The default
    /// implementation is a no-op.
    fn init(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Embeds a single query string.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vector>> + Send;

    /// Embeds a batch of document strings, preserving input order.
    fn embed_documents(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vector>>> + Send;

    /// The dimension every returned vector must have.
    fn embedding_dim(&self) -> usize;

    /// Stable identifier for the underlying model, persisted in catalog
    /// metadata so a model change can be detected.
    fn model_id(&self) -> &str;

    /// Releases any held resources (sockets, processes). Default is a no-op.
    fn dispose(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Client for the OpenAI-compatible text embedding HTTP endpoint described
/// in the interface contract: `POST {base_url} {"model", "input"}` expecting
/// `{"data": [{"embedding": [...]}]}`.
#[derive(Debug, Clone)]
pub struct HttpTextEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpTextEmbedder {
    /// Builds a client against `base_url` (typically `$EMBEDDING_SERVER_URL`,
    /// defaulting to `http://localhost:8100`) for the given `model` whose
    /// declared dimension is `dim`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dim: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dim,
        }
    }

    /// Reads `EMBEDDING_SERVER_URL` from the environment, falling back to
    /// the documented default.
    #[must_use]
    pub fn from_env(model: impl Into<String>, dim: usize) -> Self {
        let base_url = std::env::var("EMBEDDING_SERVER_URL")
            .unwrap_or_else(|_| "http://localhost:8100".to_string());
        Self::new(base_url, model, dim)
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let body = json!({ "model": self.model, "input": input });

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_once(&body).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if attempt >= 4 => return Err(err),
                Err(err) => {
                    let delay = backoff.next_backoff().unwrap_or(Duration::from_millis(500));
                    tracing::warn!(attempt, error = %err, "embedding request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_once(&self, body: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.base_url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::Embedding(format!(
                "upstream status {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Embedding(format!("bad response body: {e}")))?;

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        for vector in &vectors {
            if vector.len() != self.dim {
                return Err(CoreError::Embedding(format!(
                    "dimension mismatch: expected {}, got {}",
                    self.dim,
                    vector.len()
                )));
            }
            if vector.iter().any(|v| v.is_nan()) {
                return Err(CoreError::Embedding("embedding contains NaN".to_string()));
            }
        }

        Ok(vectors)
    }
}

impl TextEmbedder for HttpTextEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.request(json!(text)).await?;
        vectors
            .pop()
            .ok_or_else(|| CoreError::Embedding("empty response for query".to_string()))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(json!(texts)).await
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// L2-normalizes a vector in place. A zero vector is left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector {
            *v /= norm;
        }
    }
}

/// Dot product of two equal-length, L2-normalized vectors (cosine similarity).
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_is_noop() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let mut a = vec![1.0, 2.0, 3.0];
        normalize(&mut a);
        let b = a.clone();
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
    }
}
