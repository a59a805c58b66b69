//! Forward-only SQL migrations, gated by `PRAGMA user_version` (§4.5).
//!
//! Each migration is idempotent under re-run (`CREATE TABLE IF NOT EXISTS`,
//! `CREATE VIRTUAL TABLE IF NOT EXISTS`) and never drops a column — only
//! additive changes are permitted once a version has shipped.

use rusqlite::Connection;

use crate::error::Result;

/// The schema version this build of the engine expects.
pub const CURRENT_VERSION: i64 = 1;

const MIGRATIONS: &[&str] = &[
    // v1: base schema.
    r#"
    CREATE TABLE IF NOT EXISTS catalog_meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS files (
        id            INTEGER PRIMARY KEY,
        path          TEXT NOT NULL UNIQUE,
        digest        TEXT NOT NULL,
        size          INTEGER NOT NULL,
        mtime_ms      INTEGER NOT NULL,
        indexed_at_ms INTEGER NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id              INTEGER PRIMARY KEY,
        file_id         INTEGER NOT NULL REFERENCES files(id),
        ordinal         INTEGER NOT NULL,
        text            TEXT NOT NULL,
        cache_key       TEXT NOT NULL,
        section_context TEXT NOT NULL,
        content_ts_ms   INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id);
    CREATE INDEX IF NOT EXISTS idx_chunks_cache_key ON chunks(cache_key);

    CREATE TABLE IF NOT EXISTS chunk_vectors (
        chunk_id  INTEGER PRIMARY KEY REFERENCES chunks(id),
        embedding BLOB NOT NULL
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
        text,
        path,
        content=''
    );

    CREATE TABLE IF NOT EXISTS page_images (
        id          INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL REFERENCES files(id),
        page_index  INTEGER NOT NULL,
        image_hash  TEXT NOT NULL,
        image_path  TEXT NOT NULL,
        UNIQUE(document_id, page_index)
    );

    CREATE TABLE IF NOT EXISTS page_vectors (
        page_id INTEGER PRIMARY KEY REFERENCES page_images(id),
        vectors BLOB NOT NULL
    );
    "#,
];

/// Opens (creating if absent) the schema at the connection's current
/// version, running any migrations between its stored `user_version` and
/// [`CURRENT_VERSION`] in order.
pub fn migrate(conn: &Connection) -> Result<()> {
    let stored_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if stored_version > CURRENT_VERSION {
        return Err(crate::error::CatalogError::Schema(format!(
            "catalog schema version {stored_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    for version in (stored_version as usize)..MIGRATIONS.len() {
        conn.execute_batch(MIGRATIONS[version])?;
        conn.pragma_update(None, "user_version", (version as i64) + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn newer_stored_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1).unwrap();
        assert!(migrate(&conn).is_err());
    }
}
