//! Keeps quarry's state directory out of version control.

use std::path::Path;

use crate::config::CONFIG_DIR;
use crate::error::Result;

/// The line ensured in the workspace `.gitignore`.
const IGNORE_ENTRY: &str = ".quarry/";

/// Ensure `.gitignore` under `root` contains the state-directory entry
/// exactly once. Creates the file when missing; repeated calls add nothing.
///
/// # Errors
///
/// Returns an error if the ignore file cannot be read or written.
pub fn ensure_gitignore_entry(root: &Path) -> Result<()> {
    let path = root.join(".gitignore");
    let existing = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let already_listed = existing.lines().any(|line| {
        let line = line.trim();
        line == IGNORE_ENTRY || line == CONFIG_DIR
    });
    if already_listed {
        return Ok(());
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(IGNORE_ENTRY);
    updated.push('\n');
    std::fs::write(&path, updated)?;
    tracing::debug!(path = %path.display(), "added ignore entry");
    Ok(())
}
