//! Conversion configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default capacity of the per-job event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 32;

/// Settings for the external conversion tool and its output.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Program name or path of the conversion tool
    pub binary: String,
    /// Arguments placed before all generated ones
    pub extra_args: Vec<String>,
    /// Target audio format; also used as the output file extension
    pub audio_format: String,
    /// Target audio quality/bitrate
    pub audio_quality: String,
    /// Browser to read cookies from (`--cookies-from-browser`)
    pub cookies_from_browser: Option<String>,
    /// Directory completed files are written to
    pub output_dir: PathBuf,
    /// Wall-clock limit for the conversion process; `None` disables it
    pub timeout: Option<Duration>,
    /// Limit for the title lookup call
    pub title_timeout: Duration,
    /// Kill the process when the client stream goes away
    pub cancel_on_disconnect: bool,
    /// Per-job event channel capacity
    pub event_buffer: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            extra_args: Vec::new(),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            cookies_from_browser: None,
            output_dir: default_download_dir(),
            timeout: Some(Duration::from_secs(1800)), // 30 minutes
            title_timeout: Duration::from_secs(60),
            cancel_on_disconnect: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ConversionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            binary: std::env::var("YTDLP_PATH").unwrap_or(defaults.binary),
            extra_args: std::env::var("YTDLP_EXTRA_ARGS")
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            audio_format: std::env::var("AUDIO_FORMAT").unwrap_or(defaults.audio_format),
            audio_quality: std::env::var("AUDIO_QUALITY").unwrap_or(defaults.audio_quality),
            cookies_from_browser: std::env::var("COOKIES_FROM_BROWSER")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            output_dir: std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            timeout: match std::env::var("CONVERSION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.timeout,
            },
            title_timeout: Duration::from_secs(
                std::env::var("TITLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            cancel_on_disconnect: std::env::var("CANCEL_ON_DISCONNECT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            event_buffer: std::env::var("EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_EVENT_BUFFER),
        }
    }

    /// File extension of produced files.
    pub fn output_extension(&self) -> &str {
        &self.audio_format
    }
}

/// `$HOME/Downloads/downloaded_songs`, or `./downloaded_songs` without a home.
pub fn default_download_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("downloaded_songs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::default();
        assert_eq!(config.binary, "yt-dlp");
        assert_eq!(config.output_extension(), "mp3");
        assert_eq!(config.audio_quality, "192K");
        assert!(!config.cancel_on_disconnect);
        assert!(config.output_dir.ends_with("downloaded_songs"));
    }
}
