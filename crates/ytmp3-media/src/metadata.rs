//! Video title lookup.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::command::title_lookup_args;
use crate::config::ConversionConfig;
use crate::error::{MediaError, MediaResult};

/// Ask the conversion tool for the video's title.
///
/// Runs a metadata-only invocation bounded by `config.title_timeout`. The
/// child is killed if the lookup is abandoned.
pub async fn fetch_title(config: &ConversionConfig, binary: &Path, url: &str) -> MediaResult<String> {
    let args = title_lookup_args(config, url);
    debug!("Running title lookup: {} {}", binary.display(), args.join(" "));

    let output = Command::new(binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(config.title_timeout, output)
        .await
        .map_err(|_| {
            MediaError::title_lookup_failed(format!(
                "timed out after {} seconds",
                config.title_timeout.as_secs()
            ))
        })?
        .map_err(|e| MediaError::spawn(&config.binary, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Unknown error");
        return Err(MediaError::title_lookup_failed(last_line.trim()));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MediaError::title_lookup_failed("empty title"))
}
