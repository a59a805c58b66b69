//! Vision (PDF page) indexer (C7, §4.7): extract pages → batch → embed →
//! per-page image hash + upsert `page_images`/`page_vectors`.

use std::collections::HashSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use catalog_core::{PageExtractor, VisionEmbedder};
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::config::IndexingOptions;
use crate::dedup::content_digest;
use crate::error::{CatalogError, Result};
use crate::store::{chunks, pages, CatalogStore};
use crate::types::IndexRunSummary;
use crate::walk::{read_and_digest, walk, WalkedFile};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Runs one vision indexing pass over `source_directory`'s PDF files into
/// `store`, rendering pages via `worker` and rasterized images into
/// `render_dir`.
///
/// Per-page skip is keyed on `(document_id, page_index, image_hash)`: a
/// page whose rendered image is byte-identical to what's stored is never
/// re-embedded, even when the rest of the document changed. A page whose
/// embedding comes back with a NaN component is skipped with a warning
/// rather than failing the whole document (§9).
pub async fn run<V: VisionEmbedder + PageExtractor>(
    store: &mut CatalogStore,
    source_directory: &Path,
    render_dir: &Path,
    worker: &V,
    options: &IndexingOptions,
    cancel: &CancellationToken,
) -> Result<IndexRunSummary> {
    let walked = walk(source_directory, &["pdf"])?;
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

    std::fs::create_dir_all(render_dir).map_err(|e| CatalogError::io(render_dir, e))?;

    for file in &walked {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        match index_one_document(store, render_dir, worker, options, file, cancel).await {
            Ok(true) => summary.indexed += 1,
            Ok(false) => summary.skipped += 1,
            Err(CatalogError::Cancelled) => return Err(CatalogError::Cancelled),
            Err(err) => {
                warn!(path = %file.path.display(), error = %err, "vision indexing failed for document");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

async fn index_one_document<V: VisionEmbedder + PageExtractor>(
    store: &mut CatalogStore,
    render_dir: &Path,
    worker: &V,
    options: &IndexingOptions,
    file: &WalkedFile,
    cancel: &CancellationToken,
) -> Result<bool> {
    let path_str = file.path.to_string_lossy().into_owned();
    let existing = chunks::get_file_by_path(store.connection(), &path_str)?;

    if let Some(existing) = &existing {
        if existing.mtime_ms == file.mtime_ms {
            return Ok(false);
        }
    }

    let (_, digest) = read_and_digest(&file.path)?;
    if let Some(existing) = &existing {
        if existing.digest == digest {
            chunks::touch_mtime(store.connection(), existing.id, file.mtime_ms)?;
            return Ok(false);
        }
    }

    let document_dir = render_dir.join(&digest);
    let image_paths = worker
        .extract_pages(&file.path, &document_dir)
        .await
        .map_err(|e| CatalogError::Embedding(e.to_string()))?;

    let file_id = chunks::upsert_file(
        store.connection(),
        &path_str,
        &digest,
        file.size,
        file.mtime_ms,
        now_ms(),
        &crate::types::Metadata::new(),
    )?;

    let mut pending: Vec<(u32, std::path::PathBuf, String)> = Vec::new();
    for (index, image_path) in image_paths.iter().enumerate() {
        let page_index = index as u32;
        let image_bytes = std::fs::read(image_path).map_err(|e| CatalogError::io(image_path.clone(), e))?;
        let image_hash = content_digest(&image_bytes);

        if let Some(existing_page) = pages::get(store.connection(), file_id, page_index)? {
            if existing_page.image_hash == image_hash {
                continue;
            }
        }
        pending.push((page_index, image_path.clone(), image_hash));
    }

    for batch in pending.chunks(options.vision_batch_size.max(1)) {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        let batch_paths: Vec<std::path::PathBuf> = batch.iter().map(|(_, p, _)| p.clone()).collect();
        let embedded: Vec<Option<catalog_core::MultiVector>> = match worker.embed_images(&batch_paths).await {
            Ok(vectors) => vectors.into_iter().map(Some).collect(),
            Err(_) => {
                // A component of the batch produced a bad vector (e.g. NaN);
                // retry one page at a time so a single bad page doesn't
                // drop the rest of the document.
                embed_one_at_a_time(worker, batch).await
            }
        };

        for ((page_index, image_path, image_hash), vectors) in batch.iter().zip(embedded) {
            let Some(vectors) = vectors else {
                warn!(page_index, "skipping page with invalid embedding");
                continue;
            };
            let page_id = pages::upsert(
                store.connection(),
                file_id,
                *page_index,
                image_hash,
                &image_path.to_string_lossy(),
            )?;
            pages::put_vectors(store.connection(), page_id, &vectors)?;
        }
    }

    Ok(true)
}

async fn embed_one_at_a_time<V: VisionEmbedder>(
    worker: &V,
    batch: &[(u32, std::path::PathBuf, String)],
) -> Vec<Option<catalog_core::MultiVector>> {
    let mut out = Vec::with_capacity(batch.len());
    for (page_index, path, _) in batch {
        match worker.embed_images(std::slice::from_ref(path)).await {
            Ok(mut vectors) => out.push(vectors.pop()),
            Err(err) => {
                warn!(page_index, error = %err, "page embedding failed, skipping");
                out.push(None);
            }
        }
    }
    out
}
