//! Video identifier helpers shared by the validator and the media crate.

/// YouTube video IDs are exactly this many characters.
pub const VIDEO_ID_LEN: usize = 11;

/// Fixed template prefix for canonical watch URLs.
const CANONICAL_WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Check that a candidate is a well-formed video ID:
/// exactly 11 characters from `[A-Za-z0-9_-]`.
pub fn is_valid_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN && is_valid_video_id_chars(candidate)
}

/// Check if string contains only valid YouTube ID characters
fn is_valid_video_id_chars(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Build the canonical watch URL for an already verified video ID.
///
/// Only the ID is interpolated; nothing else from user input reaches the URL
/// handed to the conversion tool.
pub fn canonical_watch_url(video_id: &str) -> String {
    format!("{}{}", CANONICAL_WATCH_PREFIX, video_id)
}
