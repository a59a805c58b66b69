//! Shared entity types (§3).

use std::collections::BTreeMap;

/// Key/value metadata, the front-matter-derived subset persisted per file.
pub type Metadata = BTreeMap<String, String>;

/// A row in the catalog's file table.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Database rowid.
    pub id: i64,
    /// Absolute source path, unique within a catalog.
    pub path: String,
    /// Hex content digest of the file's current bytes.
    pub digest: String,
    /// Byte size.
    pub size: u64,
    /// Modification time, epoch milliseconds.
    pub mtime_ms: i64,
    /// When this record was last (re)indexed, epoch milliseconds.
    pub indexed_at_ms: i64,
    /// Front-matter-derived metadata bag.
    pub metadata: Metadata,
}

/// A bounded text span belonging to one file at a given ordinal index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Database rowid, shared by the lexical and vector sidecars.
    pub id: i64,
    /// Owning file id.
    pub file_id: i64,
    /// 0-based ordinal within the file.
    pub ordinal: usize,
    /// Chunk text, including its section-context prefix.
    pub text: String,
    /// `digest(chunk_text ∥ model_id)`.
    pub cache_key: String,
    /// `"{document_title} | {heading_path}"`.
    pub section_context: String,
    /// Canonical content-timestamp, file-level granularity.
    pub content_ts_ms: Option<i64>,
}

/// A single dense embedding vector, L2-normalized.
pub type Vector = Vec<f32>;

/// Result identity unifying chunk- and page-keyed lanes (§4.11).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultId {
    /// A chunk-lane hit.
    Chunk {
        /// Chunk rowid.
        chunk_id: i64,
    },
    /// A vision-lane hit.
    Page {
        /// Document (file) id.
        document_id: i64,
        /// 0-based page index.
        page_index: u32,
    },
}

/// One fused search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The unified identity of this result.
    pub id: ResultId,
    /// Owning file's source path.
    pub path: String,
    /// For chunk results, the chunk text; for page results, the image path.
    pub snippet: String,
    /// Final score after RRF/blend + recency modulation.
    pub score: f32,
    /// Content-timestamp used for the recency boost, when present.
    pub content_ts_ms: Option<i64>,
    /// The chunk's ordinal within its file, for chunk results; `None` for
    /// page results. Part of the cross-catalog "stronger identity" (same
    /// path + ordinal), distinct from chunk text so two chunks that happen
    /// to share text are never merged.
    pub ordinal: Option<usize>,
}

/// Summary returned by one indexing run (§4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexRunSummary {
    /// Files chunked, embedded, and committed.
    pub indexed: usize,
    /// Files whose mtime or digest was unchanged.
    pub skipped: usize,
    /// Files present in the catalog but absent on disk.
    pub pruned: usize,
    /// Files that failed to read, parse, or embed.
    pub failed: usize,
}
