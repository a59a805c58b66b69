//! Optional clustered ANN assist over the vector sidecar (§1 Non-goals:
//! "brute force with the optional clustered ANN assist is acceptable").
//!
//! Brute force (`vector::knn`) remains the default and the only behavior
//! this crate's tests pin; this index is an opt-in accelerator for
//! catalogs large enough that a full scan is the bottleneck, built from
//! the same chunk vectors already persisted in `chunk_vectors`.

use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::RwLock;

use crate::error::Result;
use crate::store::vector::decode_vector;

#[derive(Debug, Clone)]
struct EmbeddingPoint(Vec<f32>);

impl Point for EmbeddingPoint {
    // Euclidean distance, not `1 - dot`: callers (dense::search) apply the
    // same `sim = 1 - 0.5 * dist^2` conversion to both this and
    // `vector::knn`'s brute-force distance, so the two paths must return
    // the same metric or an ANN-accelerated search silently skews scores.
    fn distance(&self, other: &Self) -> f32 {
        let dot: f32 = self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum();
        (2.0 - 2.0 * dot).max(0.0).sqrt()
    }
}

/// A rebuildable approximate index over a snapshot of the chunk vectors.
///
/// Callers rebuild it whenever they choose (e.g. once per search session,
/// or after N inserts); it is never the only path to a result, so a stale
/// or absent index degrades to brute force rather than to incorrectness.
pub struct ClusteredAnnIndex {
    inner: RwLock<Option<HnswMap<EmbeddingPoint, i64>>>,
}

impl std::fmt::Debug for ClusteredAnnIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusteredAnnIndex")
            .field("built", &self.inner.read().is_some())
            .finish()
    }
}

impl Default for ClusteredAnnIndex {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl ClusteredAnnIndex {
    /// Builds (or rebuilds) the index from `(chunk_id, embedding_blob)`
    /// rows, typically a full scan of `chunk_vectors`.
    pub fn rebuild(&self, rows: impl Iterator<Item = (i64, Vec<u8>)>) {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for (chunk_id, blob) in rows {
            points.push(EmbeddingPoint(decode_vector(&blob)));
            values.push(chunk_id);
        }
        if points.is_empty() {
            *self.inner.write() = None;
            return;
        }
        let map = Builder::default().build(points, values);
        *self.inner.write() = Some(map);
    }

    /// Returns up to `k` approximate nearest neighbors, or `None` if the
    /// index hasn't been built yet (caller should fall back to brute
    /// force).
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Option<Vec<(i64, f32)>> {
        let guard = self.inner.read();
        let map = guard.as_ref()?;
        let mut search = Search::default();
        let point = EmbeddingPoint(query.to_vec());
        let hits: Vec<(i64, f32)> = map
            .search(&point, &mut search)
            .take(k)
            .map(|item| (*item.value, item.distance))
            .collect();
        Some(hits)
    }

    /// Whether [`rebuild`](Self::rebuild) has produced a usable index.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.inner.read().is_some()
    }
}

/// Loads every chunk vector from the store for a [`ClusteredAnnIndex`]
/// rebuild.
pub fn snapshot_vectors(conn: &rusqlite::Connection) -> Result<Vec<(i64, Vec<u8>)>> {
    let mut stmt = conn.prepare("SELECT chunk_id, embedding FROM chunk_vectors")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::migrate;
    use crate::store::vector::put;
    use rusqlite::Connection;

    #[test]
    fn point_distance_matches_brute_force_l2_scale() {
        // Same scale as `vector::l2_distance` so `dense::search`'s
        // `sim = 1 - 0.5 * dist^2` conversion gives identical scores
        // whether a query is served by the ANN index or brute force.
        let a = EmbeddingPoint(vec![1.0, 0.0]);
        let b = EmbeddingPoint(vec![0.0, 1.0]);
        assert!((a.distance(&b) - std::f32::consts::SQRT_2).abs() < 1e-6);
        assert!(a.distance(&a) < 1e-6);
    }

    #[test]
    fn unbuilt_index_returns_none() {
        let index = ClusteredAnnIndex::default();
        assert!(index.search(&[1.0, 0.0], 1).is_none());
        assert!(!index.is_built());
    }

    #[test]
    fn rebuild_then_search_finds_nearest() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO files (id, path, digest, size, mtime_ms, indexed_at_ms) VALUES (1, 'a', 'd', 0, 0, 0)",
            [],
        )
        .unwrap();
        for id in 1..=3 {
            conn.execute(
                "INSERT INTO chunks (id, file_id, ordinal, text, cache_key, section_context) VALUES (?1, 1, ?1, 't', 'k', 's')",
                [id],
            )
            .unwrap();
        }
        put(&conn, 1, &[1.0, 0.0]).unwrap();
        put(&conn, 2, &[0.0, 1.0]).unwrap();
        put(&conn, 3, &[-1.0, 0.0]).unwrap();

        let index = ClusteredAnnIndex::default();
        index.rebuild(snapshot_vectors(&conn).unwrap().into_iter());
        assert!(index.is_built());

        let hits = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].0, 1);
    }
}
