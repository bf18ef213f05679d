#![deny(unreachable_patterns)]
//! yt-dlp process supervision for audio conversion.
//!
//! This crate provides:
//! - Type-safe yt-dlp command building
//! - Progress parsing from `[download]` output lines
//! - Timeout and disconnect cancellation via tokio
//! - Title lookup and safe output file naming
//! - Per-job event channels feeding the stream publisher

pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod job;
pub mod metadata;
pub mod progress;

pub use channel::{event_channel, EventReceiver, EventSender, ProgressSink};
pub use command::{locate_binary, resolve_binary, title_lookup_args, YtDlpCommand};
pub use config::{default_download_dir, ConversionConfig, DEFAULT_EVENT_BUFFER};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{allocate_output_path, ensure_output_dir, sanitize_title, MAX_TITLE_CHARS};
pub use job::ConversionJob;
pub use metadata::fetch_title;
pub use progress::parse_progress;
