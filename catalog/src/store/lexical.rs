//! The lexical shadow: a contentless FTS5 virtual table keyed by chunk
//! rowid (§3 "Lexical entry", §4.5).
//!
//! A contentless FTS5 table stores no copy of the indexed text, so
//! deleting a row requires passing the original column values back as a
//! sentinel `'delete'` command — the "Contentless lexical index deletion"
//! redesign flag (§9). The indexer must look up a chunk's text and path
//! before deleting it.

use rusqlite::Connection;

use crate::error::Result;

/// Inserts a lexical shadow row for `chunk_id`.
pub fn insert(conn: &Connection, chunk_id: i64, text: &str, path: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO chunks_fts (rowid, text, path) VALUES (?1, ?2, ?3)",
        (chunk_id, text, path),
    )?;
    Ok(())
}

/// Deletes the lexical shadow row for `chunk_id` via the contentless
/// table's sentinel delete command. `text` and `path` must match the
/// values passed to [`insert`] exactly, or FTS5 rejects the delete.
pub fn delete(conn: &Connection, chunk_id: i64, text: &str, path: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO chunks_fts (chunks_fts, rowid, text, path) VALUES ('delete', ?1, ?2, ?3)",
        (chunk_id, text, path),
    )?;
    Ok(())
}

/// Escapes free-text query input into FTS5's query grammar: each token is
/// individually double-quoted (so operators, hyphens, and punctuation
/// can't be misread as FTS5 syntax) and tokens are joined with a bare
/// space, which FTS5 treats as `AND`. A phrase the caller already wrapped
/// in double quotes is preserved as one quoted unit instead of being
/// split into per-word tokens.
#[must_use]
pub fn build_match_expression(query: &str) -> String {
    let mut expr = String::new();
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            let mut phrase = String::new();
            for next in chars.by_ref() {
                if next == '"' {
                    break;
                }
                phrase.push(next);
            }
            if !phrase.trim().is_empty() {
                if !expr.is_empty() {
                    expr.push(' ');
                }
                expr.push('"');
                expr.push_str(&phrase.replace('"', "\"\""));
                expr.push('"');
            }
        } else if c.is_whitespace() {
            continue;
        } else {
            let mut token = String::from(c);
            while let Some(&next) = chars.peek() {
                if next.is_whitespace() || next == '"' {
                    break;
                }
                token.push(next);
                chars.next();
            }
            if !expr.is_empty() {
                expr.push(' ');
            }
            expr.push('"');
            expr.push_str(&token.replace('"', "\"\""));
            expr.push('"');
        }
    }
    expr
}

/// Matches `expr` against the lexical shadow, returning up to `k` hits
/// with normalized `[0, 1]` scores (min-max over the returned set; an
/// empty result set yields an empty list rather than dividing by zero).
pub fn lexical_match(conn: &Connection, expr: &str, k: usize) -> Result<Vec<(i64, f32)>> {
    if expr.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT rowid, bm25(chunks_fts) FROM chunks_fts WHERE chunks_fts MATCH ?1 ORDER BY bm25(chunks_fts) LIMIT ?2",
    )?;
    let rows = stmt.query_map((expr, k as i64), |row| {
        let chunk_id: i64 = row.get(0)?;
        // sqlite's bm25() is more negative for a better match; invert so
        // a higher raw score means a better match, matching §4.5's
        // "higher score = better" contract.
        let raw_score: f64 = row.get(1)?;
        Ok((chunk_id, -raw_score as f32))
    })?;

    let mut hits: Vec<(i64, f32)> = rows.collect::<rusqlite::Result<_>>()?;
    normalize_min_max(&mut hits);
    Ok(hits)
}

fn normalize_min_max(hits: &mut [(i64, f32)]) {
    if hits.is_empty() {
        return;
    }
    let min = hits.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = hits.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    for (_, score) in hits.iter_mut() {
        *score = if range > f32::EPSILON { (*score - min) / range } else { 1.0 };
    }
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
    fn insert_then_match_round_trips() {
        let conn = setup();
        insert(&conn, 1, "the quick brown fox", "a.md").unwrap();
        insert(&conn, 2, "a lazy dog sleeps", "b.md").unwrap();

        let hits = lexical_match(&conn, &build_match_expression("quick fox"), 10).unwrap();
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn delete_requires_matching_original_values() {
        let conn = setup();
        insert(&conn, 1, "the quick brown fox", "a.md").unwrap();
        delete(&conn, 1, "the quick brown fox", "a.md").unwrap();

        let hits = lexical_match(&conn, &build_match_expression("fox"), 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_result_set_normalizes_to_empty() {
        let conn = setup();
        let hits = lexical_match(&conn, &build_match_expression("nonexistent"), 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn scores_are_normalized_into_unit_range() {
        let conn = setup();
        insert(&conn, 1, "alpha beta gamma alpha beta alpha", "a.md").unwrap();
        insert(&conn, 2, "alpha only mentioned once here", "b.md").unwrap();

        let hits = lexical_match(&conn, &build_match_expression("alpha"), 10).unwrap();
        for (_, score) in &hits {
            assert!((0.0..=1.0).contains(score));
        }
    }

    #[test]
    fn quoted_phrase_is_preserved_as_one_unit() {
        let expr = build_match_expression("\"rust programming\" tutorial");
        assert!(expr.contains("\"rust programming\""));
        assert!(expr.contains("\"tutorial\""));
    }

    #[test]
    fn metacharacters_are_escaped_per_token() {
        let expr = build_match_expression("foo* OR bar");
        assert_eq!(expr, "\"foo*\" \"OR\" \"bar\"");
    }
}
