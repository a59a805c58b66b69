//! Vision search lane (C10, §4.10): MaxSim late-interaction scoring over
//! per-page token vectors, with a two-stage pre-filter above
//! `vision_full_scan_threshold` pages.

use catalog_core::{MultiVector, VisionEmbedder};

use crate::error::Result;
use crate::store::{pages, CatalogStore};

/// One vision-lane hit, before fusion.
#[derive(Debug, Clone)]
pub struct VisionHit {
    /// Owning document (file) id.
    pub document_id: i64,
    /// 0-based page index.
    pub page_index: u32,
    /// MaxSim score.
    pub score: f32,
}

/// Runs the vision lane for `query_text` across every page in the
/// catalog. Above `full_scan_threshold` pages, a cheap mean-pooled dot
/// product first narrows the field to `candidate_pool` pages before the
/// full token-level MaxSim pass runs only on those (§4.10).
pub async fn search<V: VisionEmbedder>(
    store: &CatalogStore,
    worker: &V,
    query_text: &str,
    top_k: usize,
    full_scan_threshold: usize,
) -> Result<Vec<VisionHit>> {
    let query_vectors = worker
        .embed_query(query_text)
        .await
        .map_err(|e| crate::error::CatalogError::Embedding(e.to_string()))?;

    let all_pages = pages::list_all_with_vectors(store.connection(), worker.embedding_dim())?;

    let candidates: Vec<_> = if all_pages.len() > full_scan_threshold {
        let candidate_pool = top_k * 4;
        let pooled_query = mean_pool(&query_vectors);
        let mut prefiltered: Vec<_> = all_pages
            .into_iter()
            .map(|(record, vectors)| {
                let pooled_page = mean_pool(&vectors);
                let coarse_score = dot(&pooled_query, &pooled_page);
                (record, vectors, coarse_score)
            })
            .collect();
        prefiltered.sort_by(|a, b| b.2.total_cmp(&a.2));
        prefiltered.truncate(candidate_pool);
        prefiltered.into_iter().map(|(record, vectors, _)| (record, vectors)).collect()
    } else {
        all_pages
    };

    let mut scored: Vec<VisionHit> = candidates
        .into_iter()
        .map(|(record, vectors)| VisionHit {
            document_id: record.document_id,
            page_index: record.page_index,
            score: maxsim(&query_vectors, &vectors),
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    Ok(scored)
}

/// Late-interaction MaxSim: for every query token vector, take its best
/// dot product against any page token vector, then sum across query
/// tokens.
fn maxsim(query: &MultiVector, page: &MultiVector) -> f32 {
    if page.is_empty() {
        return 0.0;
    }
    query
        .iter()
        .map(|q| page.iter().map(|p| dot(q, p)).fold(f32::NEG_INFINITY, f32::max))
        .sum()
}

fn mean_pool(vectors: &MultiVector) -> Vec<f32> {
    if vectors.is_empty() {
        return Vec::new();
    }
    let dim = vectors[0].len();
    let mut pooled = vec![0.0_f32; dim];
    for vector in vectors {
        for (acc, v) in pooled.iter_mut().zip(vector) {
            *acc += v;
        }
    }
    let count = vectors.len() as f32;
    for v in &mut pooled {
        *v /= count;
    }
    pooled
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::chunks;
    use crate::types::Metadata;
    use std::future::Future;
    use std::path::{Path, PathBuf};

    struct FakeVision;

    impl VisionEmbedder for FakeVision {
        fn embed_query(&self, _text: &str) -> impl Future<Output = catalog_core::Result<MultiVector>> + Send {
            async { Ok(vec![vec![1.0, 0.0]]) }
        }

        fn embed_images(&self, _paths: &[PathBuf]) -> impl Future<Output = catalog_core::Result<Vec<MultiVector>>> + Send {
            async { Ok(Vec::new()) }
        }

        fn embedding_dim(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            "fake-vision"
        }
    }

    #[tokio::test]
    async fn vision_search_prefers_higher_maxsim() {
        let store = CatalogStore::open_in_memory().unwrap();
        chunks::upsert_file(store.connection(), "a.pdf", "d", 0, 0, 0, &Metadata::new()).unwrap();
        let page1 = pages::upsert(store.connection(), 1, 0, "h1", "p0.png").unwrap();
        pages::put_vectors(store.connection(), page1, &[vec![1.0, 0.0]]).unwrap();
        let page2 = pages::upsert(store.connection(), 1, 1, "h2", "p1.png").unwrap();
        pages::put_vectors(store.connection(), page2, &[vec![0.0, 1.0]]).unwrap();

        let hits = search(&store, &FakeVision, "query", 10, 5000).await.unwrap();
        assert_eq!(hits[0].page_index, 0);
    }

    #[test]
    fn maxsim_is_zero_for_empty_page() {
        assert_eq!(maxsim(&vec![vec![1.0, 0.0]], &Vec::new()), 0.0);
    }
}
