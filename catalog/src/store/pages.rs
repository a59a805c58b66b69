//! Page image and page vector storage for the vision lane (§3, §4.7).

use rusqlite::{Connection, OptionalExtension};

use crate::error::{CatalogError, Result};

/// A persisted page row.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Database rowid.
    pub id: i64,
    /// Owning document (file) id.
    pub document_id: i64,
    /// 0-based page index.
    pub page_index: u32,
    /// Content hash of the rendered page image.
    pub image_hash: String,
    /// Path to the rendered page image.
    pub image_path: String,
}

/// Returns the existing page row for `(document_id, page_index)`, if any.
pub fn get(conn: &Connection, document_id: i64, page_index: u32) -> Result<Option<PageRecord>> {
    conn.query_row(
        "SELECT id, document_id, page_index, image_hash, image_path FROM page_images
         WHERE document_id = ?1 AND page_index = ?2",
        (document_id, page_index),
        |row| {
            Ok(PageRecord {
                id: row.get(0)?,
                document_id: row.get(1)?,
                page_index: row.get(2)?,
                image_hash: row.get(3)?,
                image_path: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Upserts `(document_id, page_index, image_hash, image_path)`, returning
/// the page's rowid.
pub fn upsert(
    conn: &Connection,
    document_id: i64,
    page_index: u32,
    image_hash: &str,
    image_path: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO page_images (document_id, page_index, image_hash, image_path)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(document_id, page_index) DO UPDATE SET
            image_hash = excluded.image_hash,
            image_path = excluded.image_path",
        (document_id, page_index, image_hash, image_path),
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM page_images WHERE document_id = ?1 AND page_index = ?2",
        (document_id, page_index),
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Packs a page's token vectors: a `u32` vector count header followed by
/// `num_vectors * dim * f32`, little-endian throughout (§4.7).
#[must_use]
pub fn encode_page_vectors(vectors: &[Vec<f32>]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + vectors.iter().map(|v| v.len() * 4).sum::<usize>());
    buf.extend_from_slice(&(vectors.len() as u32).to_le_bytes());
    for vector in vectors {
        for component in vector {
            buf.extend_from_slice(&component.to_le_bytes());
        }
    }
    buf
}

/// Unpacks the layout written by [`encode_page_vectors`]. `dim` is the
/// declared per-token dimension needed to split the flat float stream
/// back into individual vectors.
pub fn decode_page_vectors(bytes: &[u8], dim: usize) -> Result<Vec<Vec<f32>>> {
    if bytes.len() < 4 {
        return Err(CatalogError::Format("page vector blob too short".to_string()));
    }
    let num_vectors = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let expected_len = 4 + num_vectors * dim * 4;
    if bytes.len() != expected_len {
        return Err(CatalogError::Format(format!(
            "page vector blob length {} does not match header (expected {expected_len})",
            bytes.len()
        )));
    }

    let mut vectors = Vec::with_capacity(num_vectors);
    let mut offset = 4;
    for _ in 0..num_vectors {
        let mut vector = Vec::with_capacity(dim);
        for _ in 0..dim {
            let chunk = &bytes[offset..offset + 4];
            vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            offset += 4;
        }
        vectors.push(vector);
    }
    Ok(vectors)
}

/// Inserts or replaces a page's token-vector row.
pub fn put_vectors(conn: &Connection, page_id: i64, vectors: &[Vec<f32>]) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO page_vectors (page_id, vectors) VALUES (?1, ?2)",
        (page_id, encode_page_vectors(vectors)),
    )?;
    Ok(())
}

/// Lists every page of `document_id` with its decoded token vectors.
pub fn list_with_vectors(conn: &Connection, document_id: i64, dim: usize) -> Result<Vec<(PageRecord, Vec<Vec<f32>>)>> {
    let mut stmt = conn.prepare(
        "SELECT pi.id, pi.document_id, pi.page_index, pi.image_hash, pi.image_path, pv.vectors
         FROM page_images pi JOIN page_vectors pv ON pv.page_id = pi.id
         WHERE pi.document_id = ?1",
    )?;
    let rows = stmt.query_map([document_id], |row| {
        let record = PageRecord {
            id: row.get(0)?,
            document_id: row.get(1)?,
            page_index: row.get(2)?,
            image_hash: row.get(3)?,
            image_path: row.get(4)?,
        };
        let blob: Vec<u8> = row.get(5)?;
        Ok((record, blob))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (record, blob) = row?;
        out.push((record, decode_page_vectors(&blob, dim)?));
    }
    Ok(out)
}

/// Lists every page across the whole catalog, used by the vision search
/// lane's candidate scan (§4.10).
pub fn list_all_with_vectors(conn: &Connection, dim: usize) -> Result<Vec<(PageRecord, Vec<Vec<f32>>)>> {
    let mut stmt = conn.prepare(
        "SELECT pi.id, pi.document_id, pi.page_index, pi.image_hash, pi.image_path, pv.vectors
         FROM page_images pi JOIN page_vectors pv ON pv.page_id = pi.id",
    )?;
    let rows = stmt.query_map([], |row| {
        let record = PageRecord {
            id: row.get(0)?,
            document_id: row.get(1)?,
            page_index: row.get(2)?,
            image_hash: row.get(3)?,
            image_path: row.get(4)?,
        };
        let blob: Vec<u8> = row.get(5)?;
        Ok((record, blob))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (record, blob) = row?;
        out.push((record, decode_page_vectors(&blob, dim)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::migrate;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO files (id, path, digest, size, mtime_ms, indexed_at_ms) VALUES (1, 'doc.pdf', 'd', 0, 0, 0)",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn page_vectors_round_trip() {
        let vectors = vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]];
        let encoded = encode_page_vectors(&vectors);
        let decoded = decode_page_vectors(&encoded, 3).unwrap();
        assert_eq!(decoded, vectors);
    }

    #[test]
    fn empty_page_vectors_round_trip() {
        let vectors: Vec<Vec<f32>> = Vec::new();
        let encoded = encode_page_vectors(&vectors);
        let decoded = decode_page_vectors(&encoded, 3).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn upsert_is_unique_on_document_and_page_index() {
        let conn = setup();
        let id1 = upsert(&conn, 1, 0, "hash1", "p0.png").unwrap();
        let id2 = upsert(&conn, 1, 0, "hash2", "p0-updated.png").unwrap();
        assert_eq!(id1, id2);

        let page = get(&conn, 1, 0).unwrap().unwrap();
        assert_eq!(page.image_hash, "hash2");
    }

    #[test]
    fn list_with_vectors_returns_decoded_pages() {
        let conn = setup();
        let page_id = upsert(&conn, 1, 0, "hash", "p0.png").unwrap();
        put_vectors(&conn, page_id, &[vec![1.0, 0.0]]).unwrap();

        let pages = list_with_vectors(&conn, 1, 2).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1, vec![vec![1.0, 0.0]]);
    }
}
