//! Filesystem helpers for output naming.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// Maximum number of characters kept from a video title.
pub const MAX_TITLE_CHARS: usize = 100;

/// Characters rejected by at least one common filesystem.
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Turn an arbitrary video title into a file stem.
///
/// Removes filesystem-unsafe and control characters, truncates to
/// [`MAX_TITLE_CHARS`] and strips leading/trailing dots and spaces. Falls back
/// to `fallback` when nothing usable remains.
pub fn sanitize_title(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .take(MAX_TITLE_CHARS)
        .collect();

    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Create the output directory if needed and return its absolute path.
pub async fn ensure_output_dir(dir: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).await?;
    Ok(fs::canonicalize(dir).await?)
}

/// Pick a free `<stem>.<ext>` path in `dir`, appending ` (n)` on collision.
pub async fn allocate_output_path(dir: &Path, stem: &str, ext: &str) -> MediaResult<PathBuf> {
    fs::create_dir_all(dir).await?;

    let mut candidate = dir.join(format!("{}.{}", stem, ext));
    let mut n = 1u32;
    while fs::try_exists(&candidate).await? {
        candidate = dir.join(format!("{} ({}).{}", stem, n, ext));
        n += 1;
    }

    tracing::debug!(path = %candidate.display(), "Allocated output path");
    Ok(candidate)
}
