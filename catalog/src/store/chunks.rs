//! File and chunk CRUD, including the cascading delete contract (§4.5).

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{CatalogError, Result};
use crate::types::{ChunkRecord, FileRecord, Metadata};

use super::{lexical, pages, vector};

/// Looks up the existing file record for `path`, if any.
pub fn get_file_by_path(conn: &Connection, path: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        "SELECT id, path, digest, size, mtime_ms, indexed_at_ms, metadata_json FROM files WHERE path = ?1",
        [path],
        map_file_row,
    )
    .optional()
    .map_err(Into::into)
}

fn map_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let metadata_json: String = row.get(6)?;
    let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        digest: row.get(2)?,
        size: row.get(3)?,
        mtime_ms: row.get(4)?,
        indexed_at_ms: row.get(5)?,
        metadata,
    })
}

/// Inserts or updates the file record for `path`, returning its rowid.
#[allow(clippy::too_many_arguments)]
pub fn upsert_file(
    conn: &Connection,
    path: &str,
    digest: &str,
    size: u64,
    mtime_ms: i64,
    indexed_at_ms: i64,
    metadata: &Metadata,
) -> Result<i64> {
    let metadata_json = serde_json::to_string(metadata).map_err(|e| CatalogError::Format(e.to_string()))?;
    conn.execute(
        "INSERT INTO files (path, digest, size, mtime_ms, indexed_at_ms, metadata_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(path) DO UPDATE SET
            digest = excluded.digest,
            size = excluded.size,
            mtime_ms = excluded.mtime_ms,
            indexed_at_ms = excluded.indexed_at_ms,
            metadata_json = excluded.metadata_json",
        (path, digest, size, mtime_ms, indexed_at_ms, &metadata_json),
    )?;
    let id = conn.query_row("SELECT id FROM files WHERE path = ?1", [path], |row| row.get(0))?;
    Ok(id)
}

/// Updates only `mtime_ms` for an existing file, the fast-path skip when
/// content is unchanged but the OS-reported mtime moved (§4.6 step 4).
pub fn touch_mtime(conn: &Connection, file_id: i64, mtime_ms: i64) -> Result<()> {
    conn.execute(
        "UPDATE files SET mtime_ms = ?1 WHERE id = ?2",
        (mtime_ms, file_id),
    )?;
    Ok(())
}

/// Removes every chunk (and its lexical/vector sidecar rows) and every
/// page (and its page-vector row) belonging to `file_id`. The file row
/// itself is left untouched — callers that are deleting the file outright
/// (prune) must also call [`delete_file`].
pub fn delete_file_cascade(conn: &Connection, file_id: i64) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.text, f.path FROM chunks c JOIN files f ON f.id = c.file_id WHERE c.file_id = ?1",
    )?;
    let chunk_rows: Vec<(i64, String, String)> = stmt
        .query_map([file_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    for (chunk_id, text, path) in &chunk_rows {
        lexical::delete(conn, *chunk_id, text, path)?;
        vector::delete(conn, *chunk_id)?;
    }
    conn.execute("DELETE FROM chunks WHERE file_id = ?1", [file_id])?;

    let page_ids: Vec<i64> = conn
        .prepare("SELECT id FROM page_images WHERE document_id = ?1")?
        .query_map([file_id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    for page_id in page_ids {
        conn.execute("DELETE FROM page_vectors WHERE page_id = ?1", [page_id])?;
    }
    conn.execute("DELETE FROM page_images WHERE document_id = ?1", [file_id])?;

    Ok(())
}

/// Deletes the file row itself. Call after [`delete_file_cascade`] when
/// the file is gone from disk, not merely content-changed.
pub fn delete_file(conn: &Connection, file_id: i64) -> Result<()> {
    conn.execute("DELETE FROM files WHERE id = ?1", [file_id])?;
    Ok(())
}

/// Inserts one chunk and its lexical + vector sidecar rows atomically
/// (the caller wraps the whole per-file reindex in one transaction).
#[allow(clippy::too_many_arguments)]
pub fn insert_chunk(
    conn: &Connection,
    file_id: i64,
    ordinal: usize,
    text: &str,
    path: &str,
    embedding: &[f32],
    cache_key: &str,
    section_context: &str,
    content_ts_ms: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO chunks (file_id, ordinal, text, cache_key, section_context, content_ts_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (file_id, ordinal as i64, text, cache_key, section_context, content_ts_ms),
    )?;
    let chunk_id = conn.last_insert_rowid();
    lexical::insert(conn, chunk_id, text, path)?;
    vector::put(conn, chunk_id, embedding)?;
    Ok(chunk_id)
}

/// Looks up a cached embedding by cache key, reused across files within
/// the catalog (testable property 2: cache hit rate = 1 for an unchanged
/// file re-indexed with an unchanged model).
pub fn lookup_cached_embedding(conn: &Connection, cache_key: &str) -> Result<Option<Vec<f32>>> {
    let chunk_id: Option<i64> = conn
        .query_row("SELECT id FROM chunks WHERE cache_key = ?1 LIMIT 1", [cache_key], |row| row.get(0))
        .optional()?;
    let Some(chunk_id) = chunk_id else {
        return Ok(None);
    };
    let blob: Option<Vec<u8>> = conn
        .query_row(
            "SELECT embedding FROM chunk_vectors WHERE chunk_id = ?1",
            [chunk_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(blob.map(|b| vector::decode_vector(&b)))
}

/// Lists every file currently recorded in the catalog.
pub fn list_files(conn: &Connection) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, digest, size, mtime_ms, indexed_at_ms, metadata_json FROM files ORDER BY path",
    )?;
    let rows = stmt.query_map([], map_file_row)?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// Returns the file records whose path is no longer present in
/// `paths_on_disk`, candidates for pruning (§4.6 step 3).
pub fn find_missing(conn: &Connection, paths_on_disk: &std::collections::HashSet<String>) -> Result<Vec<FileRecord>> {
    Ok(list_files(conn)?
        .into_iter()
        .filter(|f| !paths_on_disk.contains(&f.path))
        .collect())
}

/// Lists every chunk of `file_id`, ordinal-ascending.
pub fn list_chunks(conn: &Connection, file_id: i64) -> Result<Vec<ChunkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_id, ordinal, text, cache_key, section_context, content_ts_ms
         FROM chunks WHERE file_id = ?1 ORDER BY ordinal",
    )?;
    let rows = stmt.query_map([file_id], |row| {
        Ok(ChunkRecord {
            id: row.get(0)?,
            file_id: row.get(1)?,
            ordinal: row.get::<_, i64>(2)? as usize,
            text: row.get(3)?,
            cache_key: row.get(4)?,
            section_context: row.get(5)?,
            content_ts_ms: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

/// Counts chunks across the whole catalog.
pub fn count_chunks(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?)
}

/// Parses a `metadata_json`-shaped front-matter bag into [`Metadata`].
#[must_use]
pub fn metadata_from_front_matter(front_matter: &BTreeMap<String, String>) -> Metadata {
    front_matter.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::migrate;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn upsert_file_is_idempotent_on_path() {
        let conn = setup();
        let id1 = upsert_file(&conn, "a.md", "d1", 10, 100, 1000, &Metadata::new()).unwrap();
        let id2 = upsert_file(&conn, "a.md", "d2", 20, 200, 2000, &Metadata::new()).unwrap();
        assert_eq!(id1, id2);

        let file = get_file_by_path(&conn, "a.md").unwrap().unwrap();
        assert_eq!(file.digest, "d2");
    }

    #[test]
    fn insert_chunk_populates_all_three_tables() {
        let conn = setup();
        let file_id = upsert_file(&conn, "a.md", "d1", 10, 100, 1000, &Metadata::new()).unwrap();
        let chunk_id = insert_chunk(&conn, file_id, 0, "hello world", "a.md", &[1.0, 0.0], "key1", "a.md | a.md", Some(1000)).unwrap();

        assert_eq!(list_chunks(&conn, file_id).unwrap().len(), 1);
        let cached = lookup_cached_embedding(&conn, "key1").unwrap();
        assert_eq!(cached, Some(vec![1.0, 0.0]));
        assert!(chunk_id > 0);
    }

    #[test]
    fn delete_file_cascade_removes_chunks_and_sidecars() {
        let conn = setup();
        let file_id = upsert_file(&conn, "a.md", "d1", 10, 100, 1000, &Metadata::new()).unwrap();
        insert_chunk(&conn, file_id, 0, "hello", "a.md", &[1.0, 0.0], "key1", "ctx", None).unwrap();

        delete_file_cascade(&conn, file_id).unwrap();

        assert!(list_chunks(&conn, file_id).unwrap().is_empty());
        assert_eq!(count_chunks(&conn).unwrap(), 0);
        // File row itself survives the cascade.
        assert!(get_file_by_path(&conn, "a.md").unwrap().is_some());
    }

    #[test]
    fn find_missing_detects_files_absent_from_disk() {
        let conn = setup();
        upsert_file(&conn, "a.md", "d1", 10, 100, 1000, &Metadata::new()).unwrap();
        upsert_file(&conn, "b.md", "d2", 10, 100, 1000, &Metadata::new()).unwrap();

        let on_disk: std::collections::HashSet<String> = ["a.md".to_string()].into_iter().collect();
        let missing = find_missing(&conn, &on_disk).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].path, "b.md");
    }

    #[test]
    fn cache_hit_avoids_recomputation() {
        let conn = setup();
        let file_id = upsert_file(&conn, "a.md", "d1", 10, 100, 1000, &Metadata::new()).unwrap();
        insert_chunk(&conn, file_id, 0, "same text", "a.md", &[0.5, 0.5], "stable-key", "ctx", None).unwrap();

        assert!(lookup_cached_embedding(&conn, "stable-key").unwrap().is_some());
        assert!(lookup_cached_embedding(&conn, "missing-key").unwrap().is_none());
    }
}
