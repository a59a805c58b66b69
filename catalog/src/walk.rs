//! Content hasher & file walker (C1, §4.1).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::dedup::content_digest;
use crate::error::{CatalogError, Result};

/// A file discovered by [`walk`], before it has been hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Byte size.
    pub size: u64,
    /// Modification time, epoch milliseconds.
    pub mtime_ms: i64,
}

/// Default suffixes walked when no allow-list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "pdf"];

/// Recursively enumerates `root`, yielding every regular file whose
/// extension (case-insensitive) is in `extensions`.
///
/// Symlink cycles are broken by tracking visited canonical paths; a
/// symlink whose target has already been visited is skipped rather than
/// followed again. Results are sorted by path for deterministic runs.
pub fn walk(root: &Path, extensions: &[&str]) -> Result<Vec<WalkedFile>> {
    let lowered: HashSet<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let mut visited_real_paths = HashSet::new();
    let mut stack = vec![root.to_path_buf()];
    let mut out = Vec::new();

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) => return Err(CatalogError::io(dir, source)),
        };

        for entry in entries {
            let entry = entry.map_err(|source| CatalogError::io(dir.clone(), source))?;
            let path = entry.path();

            let real_path = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !visited_real_paths.insert(real_path) {
                continue;
            }

            let file_type = entry
                .file_type()
                .map_err(|source| CatalogError::io(path.clone(), source))?;

            if file_type.is_dir() || (file_type.is_symlink() && path.is_dir()) {
                stack.push(path);
                continue;
            }

            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| lowered.contains(&ext.to_lowercase()));
            if !matches_extension {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|source| CatalogError::io(path.clone(), source))?;
            let mtime_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_millis() as i64);

            out.push(WalkedFile {
                path,
                size: metadata.len(),
                mtime_ms,
            });
        }
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

/// Reads `path` and returns its bytes alongside their content digest.
pub fn read_and_digest(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = std::fs::read(path).map_err(|source| CatalogError::io(path.to_path_buf(), source))?;
    let digest = content_digest(&bytes);
    Ok((bytes, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_matching_extensions_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "hello").unwrap();
        fs::write(dir.path().join("b.png"), "ignored").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "nested").unwrap();

        let files = walk(dir.path(), DEFAULT_EXTENSIONS).unwrap();
        let mut names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.md".to_string(), "c.txt".to_string()]);
    }

    #[test]
    fn results_are_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.md"), "z").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();

        let files = walk(dir.path(), DEFAULT_EXTENSIONS).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn digest_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "hello world").unwrap();
        let (_, d1) = read_and_digest(&path).unwrap();
        let (_, d2) = read_and_digest(&path).unwrap();
        assert_eq!(d1, d2);
    }
}
