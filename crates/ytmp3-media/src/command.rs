//! yt-dlp command builder.

use std::path::{Path, PathBuf};

use crate::config::ConversionConfig;
use crate::error::{MediaError, MediaResult};

/// Builder for an audio-only yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    /// Canonical video URL
    url: String,
    /// Output file path
    output: PathBuf,
    /// Arguments placed before the generated ones
    leading_args: Vec<String>,
    /// Target audio format
    audio_format: String,
    /// Target audio quality
    audio_quality: String,
    /// Browser to borrow cookies from
    cookies_from_browser: Option<String>,
}

impl YtDlpCommand {
    /// Create a new command with mp3/192K defaults.
    pub fn new(url: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            output: output.as_ref().to_path_buf(),
            leading_args: Vec::new(),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            cookies_from_browser: None,
        }
    }

    /// Create a command carrying every setting from `config`.
    pub fn from_config(
        config: &ConversionConfig,
        url: impl Into<String>,
        output: impl AsRef<Path>,
    ) -> Self {
        Self::new(url, output)
            .leading_args(config.extra_args.iter().cloned())
            .audio_format(config.audio_format.clone())
            .audio_quality(config.audio_quality.clone())
            .cookies_from_browser(config.cookies_from_browser.clone())
    }

    /// Add arguments placed before all generated ones.
    pub fn leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set audio format.
    pub fn audio_format(mut self, format: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self
    }

    /// Set audio quality.
    pub fn audio_quality(mut self, quality: impl Into<String>) -> Self {
        self.audio_quality = quality.into();
        self
    }

    /// Read cookies from a local browser profile.
    pub fn cookies_from_browser(mut self, browser: Option<String>) -> Self {
        self.cookies_from_browser = browser;
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.leading_args.clone();

        // One progress line per update instead of carriage-return rewrites
        args.push("--newline".to_string());
        args.push("--no-playlist".to_string());

        if let Some(browser) = &self.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        // Audio-only extraction
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push(self.audio_format.clone());
        args.push("--audio-quality".to_string());
        args.push(self.audio_quality.clone());

        args.push("-o".to_string());
        args.push(escape_output_template(&self.output.to_string_lossy()));

        // `--` keeps the URL from ever being read as an option
        args.push("--".to_string());
        args.push(self.url.clone());

        args
    }
}

/// Arguments for the metadata-only title lookup.
pub fn title_lookup_args(config: &ConversionConfig, url: &str) -> Vec<String> {
    let mut args = config.extra_args.clone();
    args.push("--get-title".to_string());
    args.push("--no-playlist".to_string());
    if let Some(browser) = &config.cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.clone());
    }
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// yt-dlp treats `-o` as a template; literal `%` must be doubled.
fn escape_output_template(path: &str) -> String {
    path.replace('%', "%%")
}

/// Resolve the conversion tool to an executable path.
pub fn resolve_binary(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::BinaryNotFound(binary.to_string()))
}

/// [`resolve_binary`] on the blocking pool.
///
/// The PATH scan stats every candidate directory, so async callers go
/// through here.
pub async fn locate_binary(binary: &str) -> MediaResult<PathBuf> {
    let name = binary.to_string();
    tokio::task::spawn_blocking(move || resolve_binary(&name))
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
}
