//! Incremental content-addressed indexing and hybrid (dense + lexical +
//! vision) retrieval over on-disk catalogs.
//!
//! A catalog is a single SQLite file holding four cooperating stores
//! behind one connection (§3, §4.5): the `files`/`chunks` relational
//! tables, a dense vector sidecar, an FTS5 lexical shadow, and — for PDF
//! sources — per-page multi-vector rows. [`index::run`] drives the
//! incremental pipeline (walk → change-detect → chunk → embed → commit);
//! [`vision_index::run`] does the same for PDF pages; [`rank::search`]
//! and [`search_catalogs`] answer queries by fusing the dense, lexical,
//! and vision lanes under [`config::SearchOptions`].

pub mod cancel;
pub mod chunk;
pub mod config;
pub mod dedup;
pub mod error;
pub mod index;
pub mod rank;
pub mod search;
pub mod store;
pub mod timestamp;
pub mod types;
pub mod vision_index;
pub mod walk;

use std::path::{Path, PathBuf};

use catalog_core::{TextEmbedder, VisionEmbedder};
use futures::future::join_all;

pub use cancel::CancellationToken;
pub use config::{FusionMode, IndexingOptions, SearchMode, SearchOptions};
pub use error::{CatalogError, Result};
pub use index::{IndexProgress, IndexStage};
pub use store::CatalogStore;
pub use types::{ChunkRecord, FileRecord, IndexRunSummary, Metadata, ResultId, SearchResult, Vector};

/// Opens the catalog file at `<root>/indexes/<name>.db`, matching the
/// storage layout contracted in §6.
pub fn catalog_path(root: &Path, name: &str) -> PathBuf {
    root.join("indexes").join(format!("{name}.db"))
}

/// Deletes every on-disk artifact of a catalog by name: the database file
/// and its WAL/shared-memory siblings (§3, §6, testable property 9 — a
/// deleted catalog behaves as if it never existed).
pub fn delete_catalog(root: &Path, name: &str) -> Result<()> {
    CatalogStore::delete_catalog_files(&catalog_path(root, name))
}

/// Runs [`rank::search`] against every catalog in `catalogs` concurrently
/// (§5 "lanes for different catalogs MAY run in parallel") and merges the
/// per-catalog fused lists into one top-`top_k` list (§4.11
/// "Cross-catalog merge"). A catalog whose search fails (schema mismatch,
/// missing file) is reported as a catalog-level failure in the returned
/// `failures` list; the others still contribute results (§7 "Per-catalog
/// errors during search ... other catalogs continue").
pub async fn search_catalogs<E, V>(
    catalogs: &[(String, PathBuf)],
    text_embedder: Option<&E>,
    vision_embedder: Option<&V>,
    query: &str,
    options: &SearchOptions,
    now_ms: i64,
    vision_full_scan_threshold: usize,
) -> (Vec<SearchResult>, Vec<(String, CatalogError)>)
where
    E: TextEmbedder,
    V: VisionEmbedder,
{
    let futures = catalogs.iter().map(|(name, path)| async move {
        let result = run_single_catalog_search(
            path,
            text_embedder,
            vision_embedder,
            query,
            options,
            now_ms,
            vision_full_scan_threshold,
        )
        .await;
        (name.clone(), result)
    });

    let mut per_catalog = Vec::new();
    let mut failures = Vec::new();
    for (name, result) in join_all(futures).await {
        match result {
            Ok(results) => per_catalog.push(results),
            Err(err) => failures.push((name, err)),
        }
    }

    let merged = rank::merge_cross_catalog(per_catalog, options.top_k);
    (merged, failures)
}

async fn run_single_catalog_search<E: TextEmbedder, V: VisionEmbedder>(
    path: &Path,
    text_embedder: Option<&E>,
    vision_embedder: Option<&V>,
    query: &str,
    options: &SearchOptions,
    now_ms: i64,
    vision_full_scan_threshold: usize,
) -> Result<Vec<SearchResult>> {
    let store = CatalogStore::open(path)?;
    rank::search(
        &store,
        text_embedder,
        vision_embedder,
        query,
        options,
        now_ms,
        vision_full_scan_threshold,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_path_follows_layout_contract() {
        let root = Path::new("/home/user/.retrieval-skill");
        let path = catalog_path(root, "notes");
        assert_eq!(path, Path::new("/home/user/.retrieval-skill/indexes/notes.db"));
    }
}
