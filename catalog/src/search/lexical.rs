//! Lexical search lane (C9, §4.9): build the FTS5 match expression, score
//! via BM25, widen the candidate pool past `top_k` the same way the dense
//! lane does.

use crate::error::Result;
use crate::store::{lexical, CatalogStore};

/// One lexical-lane hit, before fusion.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    /// Chunk rowid.
    pub chunk_id: i64,
    /// BM25-derived score, normalized into `[0, 1]` over the returned set.
    pub score: f32,
}

/// Runs the lexical lane for `query_text`, widening the candidate pool to
/// `max(200, 2 * top_k)` the same as the dense lane (§4.9).
pub fn search(store: &CatalogStore, query_text: &str, top_k: usize) -> Result<Vec<LexicalHit>> {
    let expr = lexical::build_match_expression(query_text);
    let candidate_k = top_k.max(200).max(top_k * 2);
    let raw = lexical::lexical_match(store.connection(), &expr, candidate_k)?;
    Ok(raw.into_iter().map(|(chunk_id, score)| LexicalHit { chunk_id, score }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::chunks;
    use crate::types::Metadata;

    #[test]
    fn lexical_search_finds_matching_chunk() {
        let store = CatalogStore::open_in_memory().unwrap();
        let file_id = chunks::upsert_file(store.connection(), "a.md", "d", 0, 0, 0, &Metadata::new()).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 0, "the quick brown fox", "a.md", &[0.0], "k1", "ctx", None).unwrap();

        let hits = search(&store, "fox", 10).unwrap();
        assert_eq!(hits[0].chunk_id, 1);
    }

    #[test]
    fn lexical_search_with_no_matches_is_empty() {
        let store = CatalogStore::open_in_memory().unwrap();
        let hits = search(&store, "nonexistent", 10).unwrap();
        assert!(hits.is_empty());
    }
}
