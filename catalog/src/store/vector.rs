//! The vector sidecar: a plain table mapping chunk rowid to a dense
//! embedding, searched by brute force (the required baseline at the
//! specified scale, §1 Non-goals), with an optional clustered ANN assist
//! for large catalogs.

use rusqlite::Connection;

use crate::error::Result;

/// Encodes a vector as a little-endian float32 blob.
#[must_use]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decodes a little-endian float32 blob back into a vector.
#[must_use]
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Inserts or replaces the sidecar row for `chunk_id`.
pub fn put(conn: &Connection, chunk_id: i64, embedding: &[f32]) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO chunk_vectors (chunk_id, embedding) VALUES (?1, ?2)",
        (chunk_id, encode_vector(embedding)),
    )?;
    Ok(())
}

/// Brute-force `k` nearest neighbors by L2 distance, ascending (closest
/// first). Embeddings are assumed L2-normalized, so the caller can convert
/// distance to cosine similarity via `sim = 1 - 0.5 * dist^2` (§4.8).
pub fn knn(conn: &Connection, query: &[f32], k: usize) -> Result<Vec<(i64, f32)>> {
    let mut stmt = conn.prepare("SELECT chunk_id, embedding FROM chunk_vectors")?;
    let rows = stmt.query_map([], |row| {
        let chunk_id: i64 = row.get(0)?;
        let blob: Vec<u8> = row.get(1)?;
        Ok((chunk_id, blob))
    })?;

    let mut scored = Vec::new();
    for row in rows {
        let (chunk_id, blob) = row?;
        let vector = decode_vector(&blob);
        let dist = l2_distance(query, &vector);
        scored.push((chunk_id, dist));
    }

    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(k);
    Ok(scored)
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Removes the sidecar row for `chunk_id`, if present.
pub fn delete(conn: &Connection, chunk_id: i64) -> Result<()> {
    conn.execute("DELETE FROM chunk_vectors WHERE chunk_id = ?1", [chunk_id])?;
    Ok(())
}
