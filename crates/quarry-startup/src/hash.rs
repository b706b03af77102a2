//! Workspace content hashing for staleness detection.

use std::path::Path;

use quarry_index::{ChunkSource, FsChunkSource};

use crate::error::{Result, StartupError};

/// Digest over the indexable files under `root`: relative paths and contents,
/// in sorted path order. Stable for unchanged content; changes whenever any
/// indexable file's content, name, or membership changes.
///
/// Files that disappear or turn unreadable between enumeration and hashing
/// are skipped rather than failing the whole pass.
///
/// # Errors
///
/// Returns an error only when file enumeration itself fails.
pub fn workspace_content_hash(root: &Path) -> Result<String> {
    let files = FsChunkSource::default()
        .enumerate_files(root)
        .map_err(|e| StartupError::Hash(e.to_string()))?;

    let mut hasher = blake3::Hasher::new();
    for path in files {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let Ok(contents) = std::fs::read(&path) else {
            tracing::warn!(file = %path.display(), "unreadable file skipped in content hash");
            continue;
        };
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(&contents);
        hasher.update(&[0]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_for_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        std::fs::write(dir.path().join("b.py"), "def b(): pass").unwrap();

        let first = workspace_content_hash(dir.path()).unwrap();
        let second = workspace_content_hash(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn changes_when_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let before = workspace_content_hash(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.rs"), "fn a() { changed(); }").unwrap();
        let after = workspace_content_hash(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn changes_when_file_added() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let before = workspace_content_hash(dir.path()).unwrap();

        std::fs::write(dir.path().join("new.rs"), "fn new() {}").unwrap();
        let after = workspace_content_hash(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn ignores_non_indexable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        let before = workspace_content_hash(dir.path()).unwrap();

        std::fs::write(dir.path().join("noise.log"), "churn").unwrap();
        let after = workspace_content_hash(dir.path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_workspace_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let hash = workspace_content_hash(dir.path()).unwrap();
        assert!(!hash.is_empty());
    }
}
