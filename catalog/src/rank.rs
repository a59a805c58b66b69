//! Hybrid ranker (C11, §4.11): RRF fusion across lanes, the documented
//! weighted-blend alternative for `text` mode, recency modulation,
//! dedup, and cross-catalog merge.

use std::collections::HashMap;
use std::path::Path;

use catalog_core::{TextEmbedder, VisionEmbedder};
use rusqlite::Connection;

use crate::config::{FusionMode, SearchMode, SearchOptions};
use crate::error::Result;
use crate::search::{dense, lexical, vision};
use crate::store::CatalogStore;
use crate::types::{ResultId, SearchResult};

/// Reciprocal Rank Fusion constant, fixed per §4.11.
const K_RRF: f32 = 60.0;

/// Milliseconds in a day, used to convert a half-life from days to ms.
const MS_PER_DAY: f64 = 86_400_000.0;

/// One lane's ranked output, reduced to the unified [`ResultId`] plus its
/// 1-based rank and raw lane score (needed for the weighted-blend path).
struct LaneHit {
    id: ResultId,
    rank: usize,
    score: f32,
}

fn to_lane_hits<T>(items: Vec<T>, key: impl Fn(&T) -> ResultId, score: impl Fn(&T) -> f32) -> Vec<LaneHit> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| LaneHit {
            id: key(&item),
            rank: i + 1,
            score: score(&item),
        })
        .collect()
}

/// Runs every lane `options.mode` calls for, fuses them, applies recency
/// modulation, and returns the top `options.top_k` results for a single
/// catalog.
pub async fn search<E: TextEmbedder, V: VisionEmbedder>(
    store: &CatalogStore,
    text_embedder: Option<&E>,
    vision_embedder: Option<&V>,
    query: &str,
    options: &SearchOptions,
    now_ms: i64,
    vision_full_scan_threshold: usize,
) -> Result<Vec<SearchResult>> {
    let has_pages = catalog_has_pages(store.connection())?;
    let effective_mode = match options.mode {
        SearchMode::Hybrid if !has_pages => SearchMode::Text,
        other => other,
    };

    let mut dense_hits = Vec::new();
    let mut lexical_hits = Vec::new();
    let mut vision_hits = Vec::new();

    if matches!(effective_mode, SearchMode::Text | SearchMode::Hybrid) {
        if let Some(embedder) = text_embedder {
            dense_hits = dense::search(store, embedder, query, options.top_k, &options.filters).await?;
        }
        lexical_hits = lexical::search(store, query, options.top_k)?;
    }

    if matches!(effective_mode, SearchMode::Vision | SearchMode::Hybrid) {
        if let Some(worker) = vision_embedder {
            vision_hits = vision::search(store, worker, query, options.top_k, vision_full_scan_threshold).await?;
        }
    }

    let dense_lane = to_lane_hits(dense_hits, |h| ResultId::Chunk { chunk_id: h.chunk_id }, |h| h.score);
    let lexical_lane = to_lane_hits(lexical_hits, |h| ResultId::Chunk { chunk_id: h.chunk_id }, |h| h.score);
    let vision_lane = to_lane_hits(
        vision_hits,
        |h| ResultId::Page {
            document_id: h.document_id,
            page_index: h.page_index,
        },
        |h| h.score,
    );

    let use_weighted_blend = matches!(effective_mode, SearchMode::Text)
        && matches!(options.fusion_mode, FusionMode::WeightedBlend);

    let fused: HashMap<ResultId, f32> = if use_weighted_blend {
        weighted_blend(&dense_lane, &lexical_lane)
    } else {
        let mut lanes: Vec<&[LaneHit]> = Vec::new();
        if !dense_lane.is_empty() {
            lanes.push(&dense_lane);
        }
        if !lexical_lane.is_empty() {
            lanes.push(&lexical_lane);
        }
        if !vision_lane.is_empty() {
            lanes.push(&vision_lane);
        }
        reciprocal_rank_fusion(&lanes)
    };

    let mut results = materialize(store.connection(), fused)?;
    apply_recency(&mut results, options.recency_weight, options.half_life_days, now_ms);
    results.retain(|r| r.score >= options.threshold);
    sort_results(&mut results);
    results.truncate(options.top_k);
    Ok(results)
}

/// RRF across an arbitrary number of lanes: `score(d) = Σ 1/(k_rrf + rank)`
/// over every lane `d` appears in (§4.11). Ties within a lane's own
/// ordering are the lane's concern; fusion just consumes rank order.
fn reciprocal_rank_fusion(lanes: &[&[LaneHit]]) -> HashMap<ResultId, f32> {
    let mut scores: HashMap<ResultId, f32> = HashMap::new();
    for lane in lanes {
        for hit in *lane {
            *scores.entry(hit.id.clone()).or_insert(0.0) += 1.0 / (K_RRF + hit.rank as f32);
        }
    }
    scores
}

/// The historical `0.6 * dense + 0.4 * lexical` blend, the documented
/// alternative to RRF selectable via [`FusionMode::WeightedBlend`] in
/// `text` mode only (§4.11 "Text mode simple path").
fn weighted_blend(dense_lane: &[LaneHit], lexical_lane: &[LaneHit]) -> HashMap<ResultId, f32> {
    let mut scores: HashMap<ResultId, f32> = HashMap::new();
    for hit in dense_lane {
        *scores.entry(hit.id.clone()).or_insert(0.0) += 0.6 * hit.score;
    }
    for hit in lexical_lane {
        *scores.entry(hit.id.clone()).or_insert(0.0) += 0.4 * hit.score;
    }
    scores
}

/// Resolves each fused [`ResultId`] into a display-ready [`SearchResult`]
/// (path, snippet, content-timestamp), dropping ids the store no longer
/// recognizes (e.g. deleted between lane scan and materialization).
fn materialize(conn: &Connection, fused: HashMap<ResultId, f32>) -> Result<Vec<SearchResult>> {
    let mut results = Vec::with_capacity(fused.len());
    for (id, score) in fused {
        let resolved = match &id {
            ResultId::Chunk { chunk_id } => resolve_chunk(conn, *chunk_id)?
                .map(|(path, snippet, content_ts_ms, ordinal)| (path, snippet, content_ts_ms, Some(ordinal))),
            ResultId::Page { document_id, page_index } => resolve_page(conn, *document_id, *page_index)?
                .map(|(path, snippet, content_ts_ms)| (path, snippet, content_ts_ms, None)),
        };
        if let Some((path, snippet, content_ts_ms, ordinal)) = resolved {
            results.push(SearchResult {
                id,
                path,
                snippet,
                score,
                content_ts_ms,
                ordinal,
            });
        }
    }
    Ok(results)
}

fn resolve_chunk(conn: &Connection, chunk_id: i64) -> Result<Option<(String, String, Option<i64>, usize)>> {
    use rusqlite::OptionalExtension;
    let row = conn
        .query_row(
            "SELECT f.path, c.text, c.content_ts_ms, c.ordinal FROM chunks c JOIN files f ON f.id = c.file_id WHERE c.id = ?1",
            [chunk_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, i64>(3)? as usize,
                ))
            },
        )
        .optional()?;
    Ok(row)
}

fn resolve_page(conn: &Connection, document_id: i64, page_index: u32) -> Result<Option<(String, String, Option<i64>)>> {
    use rusqlite::OptionalExtension;
    let row = conn
        .query_row(
            "SELECT f.path, pi.image_path, f.indexed_at_ms FROM page_images pi JOIN files f ON f.id = pi.document_id
             WHERE pi.document_id = ?1 AND pi.page_index = ?2",
            (document_id, page_index),
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, Option<i64>>(2)?)),
        )
        .optional()?;
    Ok(row)
}

/// Recency modulation (§4.11): `boost = 1/(1 + age_days/half_life)` when a
/// content-timestamp is present, else `1` (recency never penalizes
/// missing timestamps); `final = score * (1 - w_r + w_r * boost)`.
fn apply_recency(results: &mut [SearchResult], recency_weight: f32, half_life_days: f32, now_ms: i64) {
    let half_life_ms = f64::from(half_life_days) * MS_PER_DAY;
    for result in results {
        let boost = match result.content_ts_ms {
            Some(ts) if half_life_ms > 0.0 => {
                let age_days = (now_ms - ts).max(0) as f64 / half_life_ms;
                (1.0 / (1.0 + age_days)) as f32
            }
            _ => 1.0,
        };
        result.score *= 1.0 - recency_weight + recency_weight * boost;
    }
}

/// Ties broken by ascending result identity, per §4.11's tie-break rule.
fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

fn catalog_has_pages(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM page_images", [], |row| row.get(0))?;
    Ok(count > 0)
}

/// Merges already-fused, already-recency-modulated per-catalog result
/// lists: concatenate, re-sort by `final` descending, deduplicate by the
/// "stronger identity" (same file path + chunk ordinal, or same document
/// path + page index), and truncate to `top_k` (§4.11 "Cross-catalog
/// merge"). Preserves the top-K invariant (testable property 10): a
/// result is only dropped in favor of a strictly higher-scoring
/// duplicate, never an arbitrary one.
#[must_use]
pub fn merge_cross_catalog(per_catalog: Vec<Vec<SearchResult>>, top_k: usize) -> Vec<SearchResult> {
    let mut all: Vec<SearchResult> = per_catalog.into_iter().flatten().collect();
    sort_results(&mut all);

    let mut seen: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(all.len());
    for result in all {
        let strong_key = match &result.id {
            ResultId::Chunk { .. } => (result.path.clone(), format!("chunk:{}", result.ordinal.unwrap_or(0))),
            ResultId::Page { page_index, .. } => (result.path.clone(), format!("page:{page_index}")),
        };
        if seen.insert(strong_key) {
            deduped.push(result);
        }
    }

    deduped.truncate(top_k);
    deduped
}

/// Whether `path` (as persisted in a file record) lies under `root`,
/// usable by a caller composing its own metadata filters beyond the
/// simple key-equals predicate already applied by the dense lane.
#[must_use]
pub fn path_is_under(path: &str, root: &Path) -> bool {
    Path::new(path).starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::chunks;
    use crate::types::Metadata;
    use std::future::Future;

    struct FakeText;
    impl TextEmbedder for FakeText {
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

    struct FakeVision;
    impl VisionEmbedder for FakeVision {
        fn embed_query(&self, _text: &str) -> impl Future<Output = catalog_core::Result<catalog_core::MultiVector>> + Send {
            async { Ok(vec![vec![1.0, 0.0]]) }
        }
        fn embed_images(
            &self,
            _paths: &[std::path::PathBuf],
        ) -> impl Future<Output = catalog_core::Result<Vec<catalog_core::MultiVector>>> + Send {
            async { Ok(Vec::new()) }
        }
        fn embedding_dim(&self) -> usize {
            2
        }
        fn model_id(&self) -> &str {
            "fake-vision"
        }
    }

    #[test]
    fn rrf_of_disjoint_top1s_all_equal() {
        // Testable scenario (f): three lanes return disjoint top-1s; each
        // gets exactly one contribution at rank 1.
        let a = vec![LaneHit { id: ResultId::Chunk { chunk_id: 1 }, rank: 1, score: 1.0 }];
        let b = vec![LaneHit { id: ResultId::Chunk { chunk_id: 2 }, rank: 1, score: 1.0 }];
        let c = vec![LaneHit {
            id: ResultId::Page { document_id: 1, page_index: 0 },
            rank: 1,
            score: 1.0,
        }];
        let lanes: Vec<&[LaneHit]> = vec![&a, &b, &c];
        let fused = reciprocal_rank_fusion(&lanes);
        let expected = 1.0 / 61.0;
        for (_, score) in &fused {
            assert!((score - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn recency_boost_matches_spec_fixed_points() {
        // Testable property 8.
        let half_life_days = 90.0;
        let now = 1_700_000_000_000_i64;
        let mut results = vec![
            SearchResult {
                id: ResultId::Chunk { chunk_id: 1 },
                path: "a".into(),
                snippet: "s".into(),
                score: 1.0,
                content_ts_ms: Some(now),
                ordinal: Some(0),
            },
            SearchResult {
                id: ResultId::Chunk { chunk_id: 2 },
                path: "b".into(),
                snippet: "s".into(),
                score: 1.0,
                content_ts_ms: Some(now - (90.0 * MS_PER_DAY) as i64),
                ordinal: Some(0),
            },
            SearchResult {
                id: ResultId::Chunk { chunk_id: 3 },
                path: "c".into(),
                snippet: "s".into(),
                score: 1.0,
                content_ts_ms: None,
                ordinal: Some(0),
            },
        ];
        apply_recency(&mut results, 0.15, half_life_days, now);
        assert!((results[0].score - 1.0).abs() < 1e-4);
        assert!((results[1].score - (1.0 - 0.15 + 0.15 * 0.5)).abs() < 1e-4);
        assert!((results[2].score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn recency_dominance_matches_documented_ratio() {
        // Testable scenario (d).
        let now = 1_700_000_000_000_i64;
        let mut results = vec![
            SearchResult {
                id: ResultId::Chunk { chunk_id: 1 },
                path: "fresh".into(),
                snippet: "s".into(),
                score: 1.0,
                content_ts_ms: Some(now),
                ordinal: Some(0),
            },
            SearchResult {
                id: ResultId::Chunk { chunk_id: 2 },
                path: "old".into(),
                snippet: "s".into(),
                score: 1.0,
                content_ts_ms: Some(now - (180.0 * MS_PER_DAY) as i64),
                ordinal: Some(0),
            },
        ];
        apply_recency(&mut results, 0.15, 90.0, now);
        let ratio = results[0].score / results[1].score;
        assert!((ratio - 1.15).abs() < 0.01);
    }

    #[test]
    fn merge_cross_catalog_keeps_distinct_chunks_with_identical_text() {
        // Two distinct chunks of one file that happen to share identical
        // text must not be merged; identity is path + ordinal, not text.
        let first = SearchResult {
            id: ResultId::Chunk { chunk_id: 1 },
            path: "a.md".into(),
            snippet: "repeated boilerplate line".into(),
            score: 0.9,
            content_ts_ms: None,
            ordinal: Some(0),
        };
        let second = SearchResult {
            id: ResultId::Chunk { chunk_id: 2 },
            path: "a.md".into(),
            snippet: "repeated boilerplate line".into(),
            score: 0.8,
            content_ts_ms: None,
            ordinal: Some(1),
        };
        let merged = merge_cross_catalog(vec![vec![first, second]], 10);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_cross_catalog_preserves_top_k_and_dedups() {
        // high/low_dup share path + ordinal (the stronger identity per
        // §4.11) despite distinct chunk ids and snippets, so only the
        // higher-scoring one should survive dedup.
        let high = SearchResult {
            id: ResultId::Chunk { chunk_id: 1 },
            path: "a.md".into(),
            snippet: "same chunk, catalog one".into(),
            score: 0.9,
            content_ts_ms: None,
            ordinal: Some(0),
        };
        let low_dup = SearchResult {
            id: ResultId::Chunk { chunk_id: 2 },
            path: "a.md".into(),
            snippet: "same chunk, catalog two".into(),
            score: 0.1,
            content_ts_ms: None,
            ordinal: Some(0),
        };
        let other = SearchResult {
            id: ResultId::Chunk { chunk_id: 3 },
            path: "b.md".into(),
            snippet: "different".into(),
            score: 0.5,
            content_ts_ms: None,
            ordinal: Some(0),
        };
        let merged = merge_cross_catalog(vec![vec![high.clone(), other.clone()], vec![low_dup]], 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].score, 0.9);
    }

    #[tokio::test]
    async fn text_mode_with_zero_recency_is_score_pure_function() {
        // Testable property 6.
        let store = CatalogStore::open_in_memory().unwrap();
        let file_id = chunks::upsert_file(store.connection(), "a.md", "d", 0, 0, 0, &Metadata::new()).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 0, "the quick fox", "a.md", &[1.0, 0.0], "k1", "ctx", Some(1_000)).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 1, "a lazy dog", "a.md", &[0.0, 1.0], "k2", "ctx", Some(9_999_999)).unwrap();

        let options = SearchOptions::builder().top_k(10).recency_weight(0.0).build();
        let results = search(&store, Some(&FakeText), None::<&FakeVision>, "fox", &options, 5_000_000, 5_000)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].snippet, "the quick fox");
    }

    #[tokio::test]
    async fn hybrid_mode_without_pages_behaves_as_text() {
        let store = CatalogStore::open_in_memory().unwrap();
        let file_id = chunks::upsert_file(store.connection(), "a.md", "d", 0, 0, 0, &Metadata::new()).unwrap();
        chunks::insert_chunk(store.connection(), file_id, 0, "hello world", "a.md", &[1.0, 0.0], "k1", "ctx", None).unwrap();

        let options = SearchOptions::builder().mode(SearchMode::Hybrid).build();
        let results = search(&store, Some(&FakeText), None::<&FakeVision>, "hello", &options, 0, 5_000)
            .await
            .unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn weighted_blend_uses_060_040_split() {
        let dense_lane = vec![LaneHit { id: ResultId::Chunk { chunk_id: 1 }, rank: 1, score: 1.0 }];
        let lexical_lane = vec![LaneHit { id: ResultId::Chunk { chunk_id: 1 }, rank: 1, score: 1.0 }];
        let fused = weighted_blend(&dense_lane, &lexical_lane);
        assert!((fused[&ResultId::Chunk { chunk_id: 1 }] - 1.0).abs() < 1e-6);
    }
}
