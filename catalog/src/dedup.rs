//! Content hashing used for the file digest and the chunk cache key.

use xxhash_rust::xxh3::xxh3_64;

/// Computes a hex-encoded content digest of raw file bytes.
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:016x}", xxh3_64(bytes))
}

/// Computes the chunk cache key `digest(chunk_text ∥ model_id)`.
///
/// `∥` is realized as a length-prefixed concatenation so that no pair of
/// distinct `(text, model_id)` inputs can collide by boundary-shifting
/// (e.g. `("ab", "c")` vs `("a", "bc")`).
#[must_use]
pub fn cache_key(chunk_text: &str, model_id: &str) -> String {
    let mut buf = Vec::with_capacity(chunk_text.len() + model_id.len() + 8);
    buf.extend_from_slice(&(chunk_text.len() as u64).to_le_bytes());
    buf.extend_from_slice(chunk_text.as_bytes());
    buf.extend_from_slice(model_id.as_bytes());
    format!("{:016x}", xxh3_64(&buf))
}
