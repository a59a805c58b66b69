//! Dense search lane (C8, §4.8): embed the query, brute-force (or ANN
//! assisted) nearest neighbors, convert distance to cosine similarity,
//! apply metadata filters.

use std::collections::HashMap;

use catalog_core::TextEmbedder;
use rusqlite::Connection;

use crate::error::Result;
use crate::store::{vector, CatalogStore};

/// One dense-lane hit, before fusion.
#[derive(Debug, Clone)]
pub struct DenseHit {
    /// Chunk rowid.
    pub chunk_id: i64,
    /// Cosine similarity in `[-1, 1]` (`1 - 0.5 * dist^2` for L2-normalized
    /// vectors, per §4.8).
    pub score: f32,
}

/// Runs the dense lane for `query_text` against `store`, embedding with
/// `embedder` and widening the candidate pool to
/// `max(200, 2 * top_k)` before filtering so that `top_k` filtered results
/// remain reachable (§4.8). Returns the full widened, filtered set rather
/// than truncating to `top_k`: the fuser needs ranks beyond `top_k` from
/// this lane to fuse correctly against the other lanes, and final
/// truncation happens once, after fusion.
pub async fn search<E: TextEmbedder>(
    store: &CatalogStore,
    embedder: &E,
    query_text: &str,
    top_k: usize,
    filters: &HashMap<String, String>,
) -> Result<Vec<DenseHit>> {
    let query_vector = embedder
        .embed_query(query_text)
        .await
        .map_err(|e| crate::error::CatalogError::Embedding(e.to_string()))?;

    let candidate_k = top_k.max(200).max(top_k * 2);
    let raw = match store.ann().search(&query_vector, candidate_k) {
        Some(hits) => hits,
        None => vector::knn(store.connection(), &query_vector, candidate_k)?,
    };

    let mut hits: Vec<DenseHit> = raw
        .into_iter()
        .map(|(chunk_id, dist)| DenseHit {
            chunk_id,
            score: 1.0 - 0.5 * dist * dist,
        })
        .collect();

    if !filters.is_empty() {
        hits.retain(|hit| chunk_matches_filters(store.connection(), hit.chunk_id, filters).unwrap_or(false));
    }

    Ok(hits)
}

fn chunk_matches_filters(conn: &Connection, chunk_id: i64, filters: &HashMap<String, String>) -> Result<bool> {
    let metadata_json: Option<String> = conn
        .query_row(
            "SELECT f.metadata_json FROM chunks c JOIN files f ON f.id = c.file_id WHERE c.id = ?1",
            [chunk_id],
            |row| row.get(0),
        )
        .ok();
    let Some(metadata_json) = metadata_json else {
        return Ok(filters.is_empty());
    };
    let metadata: crate::types::Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    Ok(filters.iter().all(|(key, value)| metadata.get(key) == Some(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::chunks;
    use crate::types::Metadata;
    use std::future::Future;

    struct FakeEmbedder;

    impl TextEmbedder for FakeEmbedder {
        fn embed_query(&self, _text: &str) -> impl Future<Output = catalog_core::Result<Vec<f32>>> + Send {
            async { Ok(vec![1.0, 0.0]) }
        }

        fn embed_documents(&self, _texts: &[String]) -> impl Future<Output = catalog_core::Result<Vec<Vec<f32>>>> + Send {
            async { Ok(Vec::new()) }
        }

        fn embedding_dim(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn dense_search_returns_closest_first() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let file_id = chunks::upsert_file(store.connection(), "a.md", "d", 0, 0, 0, &Metadata::new()).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 0, "near", "a.md", &[1.0, 0.0], "k1", "ctx", None).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 1, "far", "a.md", &[0.0, 1.0], "k2", "ctx", None).unwrap();

        let hits = search(&mut store, &FakeEmbedder, "query", 10, &HashMap::new()).await.unwrap();
        assert_eq!(hits[0].score, 1.0);
    }

    #[tokio::test]
    async fn dense_search_applies_metadata_filters() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("lang".to_string(), "en".to_string());
        let file_id = chunks::upsert_file(store.connection(), "a.md", "d", 0, 0, 0, &metadata).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 0, "hit", "a.md", &[1.0, 0.0], "k1", "ctx", None).unwrap();

        let mut filters = HashMap::new();
        filters.insert("lang".to_string(), "fr".to_string());
        let hits = search(&mut store, &FakeEmbedder, "query", 10, &filters).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn dense_search_returns_the_full_widened_pool_not_just_top_k() {
        // A chunk ranked beyond top_k must still come back so the fuser can
        // weigh it against the other lanes; only `rank::search` truncates.
        let mut store = CatalogStore::open_in_memory().unwrap();
        let file_id = chunks::upsert_file(store.connection(), "a.md", "d", 0, 0, 0, &Metadata::new()).unwrap();
        for i in 0..5 {
            chunks::insert_chunk(store.connection(), file_id, i, "chunk", "a.md", &[1.0, 0.0], "k", "ctx", None)
                .unwrap();
        }

        let hits = search(&mut store, &FakeEmbedder, "query", 2, &HashMap::new()).await.unwrap();
        assert!(hits.len() > 2, "expected the widened candidate pool, got {}", hits.len());
    }
}
