//! Incremental indexer (C6, §4.6): walk → change-detect → chunk → embed
//! (with per-chunk cache) → commit.

use std::collections::HashSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use catalog_core::TextEmbedder;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::chunk::MarkdownChunker;
use crate::config::IndexingOptions;
use crate::dedup::cache_key;
use crate::error::{CatalogError, Result};
use crate::store::{chunks, meta_keys, CatalogStore};
use crate::timestamp::extract_content_timestamp;
use crate::types::IndexRunSummary;
use crate::walk::{read_and_digest, walk, WalkedFile};

/// Reported at each top-level step of a run; suitable for a progress bar
/// or a structured log sink.
#[derive(Debug, Clone)]
pub struct IndexProgress {
    /// Files processed so far.
    pub processed: usize,
    /// Total files discovered by the walk.
    pub total: usize,
    /// The file currently being processed, if any.
    pub current_file: Option<String>,
    /// What step the current file is at.
    pub stage: IndexStage,
}

/// The step within a single file's reindex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStage {
    /// The directory walk is still enumerating files.
    Scanning,
    /// Splitting a file's text into chunks.
    Chunking,
    /// Calling the embedding provider for this file's uncached chunks.
    Embedding,
    /// Committing chunks into the store.
    Committing,
    /// The whole run has finished.
    Done,
    /// The file was left untouched this run.
    Skipped {
        /// Why the file did not need reindexing.
        reason: String,
    },
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Opens (or creates) the catalog's identity metadata and verifies it
/// matches `model_id`/`dim`. On a brand-new catalog (or one whose
/// identity was cleared by [`reset_identity`]) the identity is recorded;
/// on an existing one, a mismatch is a [`CatalogError::Schema`] per the
/// "model identifier changes between runs" open question (§9).
pub fn ensure_identity(
    store: &CatalogStore,
    index_name: &str,
    source_directory: &Path,
    model_id: &str,
    dim: usize,
) -> Result<()> {
    let existing_model = store.get_meta(meta_keys::MODEL_ID)?.filter(|s| !s.is_empty());

    let Some(existing_model) = existing_model else {
        store.set_meta(meta_keys::INDEX_NAME, index_name)?;
        store.set_meta(meta_keys::SOURCE_DIRECTORY, &source_directory.to_string_lossy())?;
        store.set_meta(meta_keys::MODEL_ID, model_id)?;
        store.set_meta(meta_keys::EMBEDDING_DIM, &dim.to_string())?;
        return Ok(());
    };

    let existing_dim: usize = store
        .get_meta(meta_keys::EMBEDDING_DIM)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if existing_model != model_id || existing_dim != dim {
        return Err(CatalogError::Schema(format!(
            "catalog model identity {existing_model}@{existing_dim} does not match requested {model_id}@{dim}; call reset_identity to rebuild under the new model"
        )));
    }
    Ok(())
}

/// Clears the persisted model identity, allowing the next
/// [`ensure_identity`] call to adopt a new model. Does not delete any
/// chunk data; a full reindex under the new model will still delete and
/// re-embed every file's chunks because cache keys are model-scoped.
pub fn reset_identity(store: &CatalogStore) -> Result<()> {
    store.set_meta(meta_keys::MODEL_ID, "")?;
    store.set_meta(meta_keys::EMBEDDING_DIM, "0")?;
    Ok(())
}

/// Runs one incremental indexing pass over `source_directory` into
/// `store`, embedding with `embedder` under `options`.
///
/// Establishes the catalog's model identity (§4.6 step 1) before the walk:
/// a brand-new catalog records `index_name`/`source_directory`/`model_id`/
/// `embedding_dim`; an existing one rejects a model or dimension change
/// with [`CatalogError::Schema`] rather than silently mixing incompatible
/// vectors.
///
/// `on_progress` is invoked at each step; `cancel` is checked between
/// files (and, within a file, before issuing the embedding call).
pub async fn run<E: TextEmbedder>(
    store: &mut CatalogStore,
    index_name: &str,
    source_directory: &Path,
    embedder: &E,
    options: &IndexingOptions,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(IndexProgress),
) -> Result<IndexRunSummary> {
    ensure_identity(store, index_name, source_directory, embedder.model_id(), embedder.embedding_dim())?;

    on_progress(IndexProgress {
        processed: 0,
        total: 0,
        current_file: None,
        stage: IndexStage::Scanning,
    });

    let extensions = ["md", "markdown", "txt"];
    let walked = walk(source_directory, &extensions)?;
    let on_disk: HashSet<String> = walked.iter().map(|f| f.path.to_string_lossy().into_owned()).collect();

    let mut summary = IndexRunSummary::default();

    let missing = chunks::find_missing(store.connection(), &on_disk)?;
    for file in &missing {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        let file_id = file.id;
        store.transaction(|tx| {
            chunks::delete_file_cascade(tx, file_id)?;
            chunks::delete_file(tx, file_id)?;
            Ok(())
        })?;
        summary.pruned += 1;
    }

    let chunker = MarkdownChunker;
    let total = walked.len();

    for (processed, file) in walked.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }

        let path_str = file.path.to_string_lossy().into_owned();
        on_progress(IndexProgress {
            processed,
            total,
            current_file: Some(path_str.clone()),
            stage: IndexStage::Scanning,
        });

        let outcome = index_one_file(
            store,
            &chunker,
            embedder,
            options,
            file,
            &path_str,
            cancel,
            &mut on_progress,
        )
        .await;

        match outcome {
            Ok(FileOutcome::Skipped { reason }) => {
                on_progress(IndexProgress {
                    processed: processed + 1,
                    total,
                    current_file: Some(path_str),
                    stage: IndexStage::Skipped { reason },
                });
                summary.skipped += 1;
            }
            Ok(FileOutcome::Indexed) => {
                summary.indexed += 1;
            }
            Err(CatalogError::Cancelled) => return Err(CatalogError::Cancelled),
            Err(err) => {
                warn!(path = %path_str, error = %err, "indexing failed for file, leaving prior state untouched");
                summary.failed += 1;
            }
        }
    }

    store.set_meta(meta_keys::LAST_INDEXED_AT, &now_ms().to_string())?;
    let total_files = chunks::list_files(store.connection())?.len();
    let total_chunks = chunks::count_chunks(store.connection())?;
    store.set_meta(meta_keys::TOTAL_FILES, &total_files.to_string())?;
    store.set_meta(meta_keys::TOTAL_CHUNKS, &total_chunks.to_string())?;

    on_progress(IndexProgress {
        processed: total,
        total,
        current_file: None,
        stage: IndexStage::Done,
    });

    Ok(summary)
}

enum FileOutcome {
    Skipped { reason: String },
    Indexed,
}

#[allow(clippy::too_many_arguments)]
async fn index_one_file<E: TextEmbedder>(
    store: &mut CatalogStore,
    chunker: &MarkdownChunker,
    embedder: &E,
    options: &IndexingOptions,
    file: &WalkedFile,
    path_str: &str,
    cancel: &CancellationToken,
    on_progress: &mut impl FnMut(IndexProgress),
) -> Result<FileOutcome> {
    let existing = chunks::get_file_by_path(store.connection(), path_str)?;

    if let Some(existing) = &existing {
        if existing.mtime_ms == file.mtime_ms {
            return Ok(FileOutcome::Skipped {
                reason: "mtime unchanged".to_string(),
            });
        }
    }

    let (bytes, digest) = read_and_digest(&file.path)?;

    if let Some(existing) = &existing {
        if existing.digest == digest {
            chunks::touch_mtime(store.connection(), existing.id, file.mtime_ms)?;
            return Ok(FileOutcome::Skipped {
                reason: "digest unchanged".to_string(),
            });
        }
    }

    let text = String::from_utf8(bytes).map_err(|e| CatalogError::Format(e.to_string()))?;

    on_progress(IndexProgress {
        processed: 0,
        total: 0,
        current_file: Some(path_str.to_string()),
        stage: IndexStage::Chunking,
    });

    let stem = file
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (front_matter, spans) = chunker.chunk_file(&stem, &text, options)?;
    let metadata = chunks::metadata_from_front_matter(&front_matter);
    let content_ts_ms = extract_content_timestamp(&front_matter, Some(file.mtime_ms));

    let model_id = embedder.model_id().to_string();
    let mut to_embed: Vec<(usize, String)> = Vec::new();
    let mut resolved: Vec<Option<Vec<f32>>> = vec![None; spans.len()];
    let mut cache_keys: Vec<String> = Vec::with_capacity(spans.len());

    for (i, span) in spans.iter().enumerate() {
        let key = cache_key(&span.text, &model_id);
        if let Some(cached) = chunks::lookup_cached_embedding(store.connection(), &key)? {
            resolved[i] = Some(cached);
        } else {
            to_embed.push((i, span.text.clone()));
        }
        cache_keys.push(key);
    }

    if !to_embed.is_empty() {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        on_progress(IndexProgress {
            processed: 0,
            total: 0,
            current_file: Some(path_str.to_string()),
            stage: IndexStage::Embedding,
        });
        let texts: Vec<String> = to_embed.iter().map(|(_, t)| t.clone()).collect();
        let embeddings = embedder
            .embed_documents(&texts)
            .await
            .map_err(|e| CatalogError::Embedding(e.to_string()))?;
        if embeddings.len() != to_embed.len() {
            return Err(CatalogError::Embedding(
                "embedding provider returned a different count than requested".to_string(),
            ));
        }
        for ((i, _), embedding) in to_embed.iter().zip(embeddings) {
            resolved[*i] = Some(embedding);
        }
    }

    debug!(path = %path_str, chunks = spans.len(), cache_misses = to_embed.len(), "committing file");
    on_progress(IndexProgress {
        processed: 0,
        total: 0,
        current_file: Some(path_str.to_string()),
        stage: IndexStage::Committing,
    });

    let existing_id = existing.as_ref().map(|f| f.id);
    let mtime_ms = file.mtime_ms;
    let size = file.size;
    let indexed_at = now_ms();
    let path_owned = path_str.to_string();

    store.transaction(|tx| {
        if let Some(id) = existing_id {
            chunks::delete_file_cascade(tx, id)?;
        }
        let file_id = chunks::upsert_file(tx, &path_owned, &digest, size, mtime_ms, indexed_at, &metadata)?;
        for (ordinal, (span, key)) in spans.iter().zip(&cache_keys).enumerate() {
            let embedding = resolved[ordinal]
                .as_ref()
                .ok_or_else(|| CatalogError::Embedding("missing resolved embedding".to_string()))?;
            chunks::insert_chunk(
                tx,
                file_id,
                ordinal,
                &span.text,
                &path_owned,
                embedding,
                key,
                &span.section_context,
                content_ts_ms,
            )?;
        }
        Ok(())
    })?;

    Ok(FileOutcome::Indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::future::Future;

    struct FakeEmbedder {
        dim: usize,
    }

    impl TextEmbedder for FakeEmbedder {
        fn embed_query(&self, text: &str) -> impl Future<Output = catalog_core::Result<Vec<f32>>> + Send {
            let dim = self.dim;
            let len = text.len();
            async move { Ok(vec![(len % 7) as f32; dim]) }
        }

        fn embed_documents(&self, texts: &[String]) -> impl Future<Output = catalog_core::Result<Vec<Vec<f32>>>> + Send {
            let dim = self.dim;
            let vectors: Vec<Vec<f32>> = texts.iter().map(|t| vec![(t.len() % 7) as f32; dim]).collect();
            async move { Ok(vectors) }
        }

        fn embedding_dim(&self) -> usize {
            self.dim
        }

        fn model_id(&self) -> &str {
            "fake-model"
        }
    }

    #[tokio::test]
    async fn reindexing_unchanged_directory_is_a_noop_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "## Heading\n\nSome body text.").unwrap();

        let mut store = CatalogStore::open_in_memory().unwrap();
        let embedder = FakeEmbedder { dim: 4 };
        let options = IndexingOptions::default();
        let cancel = CancellationToken::new();

        let first = run(&mut store, "notes", dir.path(), &embedder, &options, &cancel, |_| {}).await.unwrap();
        assert_eq!(first.indexed, 1);

        let second = run(&mut store, "notes", dir.path(), &embedder, &options, &cancel, |_| {}).await.unwrap();
        assert_eq!(second.indexed, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn pruning_deletes_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let doomed = dir.path().join("gone.md");
        fs::write(&doomed, "content").unwrap();

        let mut store = CatalogStore::open_in_memory().unwrap();
        let embedder = FakeEmbedder { dim: 4 };
        let options = IndexingOptions::default();
        let cancel = CancellationToken::new();

        run(&mut store, "notes", dir.path(), &embedder, &options, &cancel, |_| {}).await.unwrap();
        fs::remove_file(&doomed).unwrap();

        let summary = run(&mut store, "notes", dir.path(), &embedder, &options, &cancel, |_| {}).await.unwrap();
        assert_eq!(summary.pruned, 1);
    }

    #[tokio::test]
    async fn content_change_triggers_full_reinsert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "## Heading\n\nOriginal body.").unwrap();

        let mut store = CatalogStore::open_in_memory().unwrap();
        let embedder = FakeEmbedder { dim: 4 };
        let options = IndexingOptions::default();
        let cancel = CancellationToken::new();

        run(&mut store, "notes", dir.path(), &embedder, &options, &cancel, |_| {}).await.unwrap();

        fs::write(&path, "## Heading\n\nOriginal body.\n\nA new paragraph entirely.").unwrap();
        let file = fs::File::open(&path).unwrap();
        file.set_modified(SystemTime::now() + std::time::Duration::from_secs(1)).unwrap();

        let summary = run(&mut store, "notes", dir.path(), &embedder, &options, &cancel, |_| {}).await.unwrap();
        assert_eq!(summary.indexed, 1);

        let record = chunks::get_file_by_path(store.connection(), &path.to_string_lossy())
            .unwrap()
            .unwrap();
        let chunk_list = chunks::list_chunks(store.connection(), record.id).unwrap();
        assert!(chunk_list.iter().any(|c| c.text.contains("new paragraph")));
    }

    #[test]
    fn ensure_identity_records_then_rejects_mismatch() {
        let store = CatalogStore::open_in_memory().unwrap();
        ensure_identity(&store, "notes", Path::new("/tmp/notes"), "model-a", 4).unwrap();
        assert!(ensure_identity(&store, "notes", Path::new("/tmp/notes"), "model-a", 4).is_ok());
        assert!(ensure_identity(&store, "notes", Path::new("/tmp/notes"), "model-b", 8).is_err());

        reset_identity(&store).unwrap();
        assert!(ensure_identity(&store, "notes", Path::new("/tmp/notes"), "model-b", 8).is_ok());
    }
}
