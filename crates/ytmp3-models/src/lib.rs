//! Shared data models for the ytmp3 service.
//!
//! This crate provides:
//! - YouTube URL validation and normalization
//! - The host allow-list used by the validator
//! - Serde-serializable progress event schemas streamed to clients

pub mod event;
pub mod utils;
pub mod youtube_url;

// Re-export common types
pub use event::{event_schema, ProgressEvent};
pub use utils::{canonical_watch_url, is_valid_video_id, VIDEO_ID_LEN};
pub use youtube_url::{
    validate, CanonicalVideo, HostAllowList, RejectionReason, UrlLayout, ValidationResult,
    DEFAULT_ALLOWED_HOSTS, MAX_URL_LENGTH, MISSING_URL_MESSAGE,
};
