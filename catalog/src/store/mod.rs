//! The catalog store: relational + vector + lexical schema, migrations,
//! transactional upserts, and cascading deletes (C5, §4.5).

pub mod ann;
pub mod chunks;
pub mod lexical;
pub mod pages;
mod schema;
pub mod vector;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};

use crate::error::{CatalogError, Result};

pub use ann::ClusteredAnnIndex;

/// Well-known metadata keys persisted per catalog (§6).
pub mod meta_keys {
    /// The forward-only migration version (mirrors `PRAGMA user_version`).
    pub const SCHEMA_VERSION: &str = "schema_version";
    /// The catalog's own name.
    pub const INDEX_NAME: &str = "index_name";
    /// The directory this catalog was built from.
    pub const SOURCE_DIRECTORY: &str = "source_directory";
    /// The text embedding model identity used for every chunk vector.
    pub const MODEL_ID: &str = "model_id";
    /// The declared dense embedding dimension.
    pub const EMBEDDING_DIM: &str = "embedding_dim";
    /// Epoch-ms timestamp of the last completed indexing run.
    pub const LAST_INDEXED_AT: &str = "last_indexed_at";
    /// Total file count as of the last completed run.
    pub const TOTAL_FILES: &str = "total_files";
    /// Total chunk count as of the last completed run.
    pub const TOTAL_CHUNKS: &str = "total_chunks";
}

/// A single catalog's storage handle: one SQLite connection, WAL mode, a
/// shared-cache-free single-writer posture per §5.
pub struct CatalogStore {
    conn: Connection,
    path: PathBuf,
    ann: ClusteredAnnIndex,
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl CatalogStore {
    /// Opens (creating if absent) the catalog at `path`, running
    /// migrations and switching on WAL so readers see snapshot isolation
    /// against an in-flight writer (§5).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            path,
            ann: ClusteredAnnIndex::default(),
        })
    }

    /// Opens an in-memory catalog, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::new(),
            ann: ClusteredAnnIndex::default(),
        })
    }

    /// The path this catalog is stored at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Direct access to the underlying connection, for the indexer and
    /// search lanes.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The optional clustered ANN assist built from this store's current
    /// vectors; absent until [`rebuild_ann`](Self::rebuild_ann) is called.
    #[must_use]
    pub fn ann(&self) -> &ClusteredAnnIndex {
        &self.ann
    }

    /// Rebuilds the clustered ANN assist from a fresh snapshot of
    /// `chunk_vectors`.
    pub fn rebuild_ann(&self) -> Result<()> {
        let rows = ann::snapshot_vectors(&self.conn)?;
        self.ann.rebuild(rows.into_iter());
        Ok(())
    }

    /// Runs `f` inside one transaction, committing on `Ok` and rolling
    /// back on `Err` — the "single file reindex in one transaction"
    /// contract (§4.5, §4.6).
    pub fn transaction<T>(&mut self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Reads a metadata value.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM catalog_meta WHERE key = ?1", [key], |row| row.get(0))
            .optional()?)
    }

    /// Writes a metadata value.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO catalog_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, value),
        )?;
        Ok(())
    }

    /// Deletes every on-disk sibling of a catalog file: the database
    /// itself, its WAL journal, and its shared-memory index (§3
    /// "Catalog deletion removes all four storage artifacts", §6).
    pub fn delete_catalog_files(path: &Path) -> Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let sibling = append_suffix(path, suffix);
            if sibling.exists() {
                std::fs::remove_file(&sibling).map_err(|e| CatalogError::io(sibling, e))?;
            }
        }
        Ok(())
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_round_trips() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.set_meta(meta_keys::MODEL_ID, "text-embed-v1").unwrap();
        assert_eq!(store.get_meta(meta_keys::MODEL_ID).unwrap(), Some("text-embed-v1".to_string()));
    }

    #[test]
    fn missing_meta_key_is_none() {
        let store = CatalogStore::open_in_memory().unwrap();
        assert_eq!(store.get_meta("nonexistent").unwrap(), None);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        let result: Result<()> = store.transaction(|tx| {
            tx.execute(
                "INSERT INTO files (path, digest, size, mtime_ms, indexed_at_ms) VALUES ('a', 'd', 0, 0, 0)",
                [],
            )?;
            Err(CatalogError::Cancelled)
        });
        assert!(result.is_err());
        assert!(store.get_meta("anything").unwrap().is_none());
        let count: i64 = store.connection().query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn delete_catalog_files_removes_db_and_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cat.db");
        {
            let _store = CatalogStore::open(&db_path).unwrap();
        }
        std::fs::write(append_suffix(&db_path, "-wal"), b"fake wal").unwrap();
        std::fs::write(append_suffix(&db_path, "-shm"), b"fake shm").unwrap();

        CatalogStore::delete_catalog_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!append_suffix(&db_path, "-wal").exists());
        assert!(!append_suffix(&db_path, "-shm").exists());
    }
}
