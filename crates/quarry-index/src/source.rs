//! Chunk source: file enumeration and chunk extraction.
//!
//! Language-aware parsing is an external concern; the built-in source walks
//! the tree with gitignore rules and splits files into blank-line-delimited
//! blocks, which is enough structure for embedding-based retrieval.

use std::path::{Path, PathBuf};

use quarry_store::CodeChunk;

use crate::error::{IndexError, Result};

/// Outcome of parsing one file. `errors` non-empty means the extraction was
/// partial; whether partial chunk sets are usable is the orchestrator's call
/// (`skip_syntax_errors`).
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub chunks: Vec<CodeChunk>,
    pub errors: Vec<String>,
}

/// Produces indexing units from a workspace.
pub trait ChunkSource: Send + Sync {
    /// Candidate files below `root`, gitignore and hidden rules applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk itself fails; a missing root is the
    /// caller's concern.
    fn enumerate_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Extract chunks from one file's content.
    fn parse(&self, path: &Path, content: &str, language: &str) -> ParseOutcome;

    /// Payload language tag for `path`.
    fn language_for(&self, path: &Path) -> String {
        detect_language(path).unwrap_or("text").to_string()
    }
}

/// Extensions accepted by the built-in source.
const INDEXABLE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "hpp", "cs", "rb", "php",
    "swift", "kt", "sh", "toml", "yaml", "yml", "json", "md",
];

/// Map a file extension to its payload language tag.
#[must_use]
pub fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    let lang = match ext {
        "rs" => "rust",
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "sh" => "bash",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        _ => return None,
    };
    Some(lang)
}

/// Whether the built-in source indexes `path`.
#[must_use]
pub fn is_indexable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INDEXABLE_EXTENSIONS.contains(&ext))
}

/// Filesystem chunk source: ignore-aware walk plus block splitting.
#[derive(Debug, Clone)]
pub struct FsChunkSource {
    /// Upper bound on lines per chunk; larger blocks are split.
    pub max_chunk_lines: usize,
}

impl Default for FsChunkSource {
    fn default() -> Self {
        Self {
            max_chunk_lines: 80,
        }
    }
}

impl ChunkSource for FsChunkSource {
    fn enumerate_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build()
        {
            let entry = entry.map_err(|e| IndexError::Enumeration(e.to_string()))?;
            if entry.file_type().is_some_and(|ft| ft.is_file()) && is_indexable(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse(&self, path: &Path, content: &str, language: &str) -> ParseOutcome {
        let file_path = path.to_string_lossy().to_string();
        ParseOutcome {
            chunks: split_blocks(content, &file_path, language, self.max_chunk_lines),
            errors: Vec::new(),
        }
    }
}

/// Split `content` into chunks at blank-line boundaries, merging small blocks
/// and splitting oversized ones so no chunk exceeds `max_lines`.
fn split_blocks(content: &str, file_path: &str, language: &str, max_lines: usize) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Vec::new();
    }
    let max_lines = max_lines.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < lines.len() {
        // Skip leading blanks.
        while start < lines.len() && lines[start].trim().is_empty() {
            start += 1;
        }
        if start >= lines.len() {
            break;
        }

        // Grow until a blank line past the window start, or the hard cap.
        let mut end = start + 1;
        while end < lines.len() && end - start < max_lines {
            if lines[end].trim().is_empty() && !lines[end - 1].trim().is_empty() {
                break;
            }
            end += 1;
        }

        let body = lines[start..end].join("\n");
        #[allow(clippy::cast_possible_truncation)]
        chunks.push(CodeChunk {
            file_path: file_path.to_string(),
            content: body,
            start_line: start as u32 + 1,
            end_line: end as u32,
            kind: "block".into(),
            language: language.to_string(),
            name: None,
            signature: None,
        });
        start = end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_by_extension() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some("rust"));
        assert_eq!(detect_language(Path::new("app.tsx")), Some("typescript"));
        assert_eq!(detect_language(Path::new("binary.dat")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn indexable_gate() {
        assert!(is_indexable(Path::new("a/b/c.py")));
        assert!(!is_indexable(Path::new("a/b/image.png")));
    }

    #[test]
    fn split_blocks_on_blank_lines() {
        let content = "fn a() {}\n\nfn b() {\n    body\n}\n";
        let chunks = split_blocks(content, "x.rs", "rust", 80);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "fn a() {}");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 1);
        assert_eq!(chunks[1].start_line, 3);
        assert_eq!(chunks[1].end_line, 5);
    }

    #[test]
    fn split_respects_max_lines() {
        let content = (0..10).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = split_blocks(&content, "x.rs", "rust", 4);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.end_line - chunk.start_line < 4);
            assert!(chunk.end_line >= chunk.start_line);
        }
    }

    #[test]
    fn line_ranges_are_one_based_and_ordered() {
        let content = "\n\nonly block\n";
        let chunks = split_blocks(content, "x.rs", "rust", 80);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 3);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn empty_and_blank_content_produce_no_chunks() {
        assert!(split_blocks("", "x.rs", "rust", 80).is_empty());
        assert!(split_blocks("\n  \n\n", "x.rs", "rust", 80).is_empty());
    }

    #[test]
    fn enumerate_respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        // gitignore rules only apply inside a repository.
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("keep.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("skip.log"), "noise").unwrap();
        std::fs::write(dir.path().join("ignored.rs"), "fn gone() {}").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "ignored.rs\n").unwrap();

        let source = FsChunkSource::default();
        let files = source.enumerate_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();
        assert_eq!(names, vec!["keep.rs"]);
    }
}
