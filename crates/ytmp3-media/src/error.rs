//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while supervising the conversion tool.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    BinaryNotFound(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Title lookup failed: {message}")]
    TitleLookupFailed { message: String },

    #[error("Conversion exited with non-zero status (exit code {exit_code:?})")]
    ConversionFailed { exit_code: Option<i32> },

    #[error("Download cancelled")]
    Cancelled,

    #[error("Download timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a spawn failure error.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a title lookup failure error.
    pub fn title_lookup_failed(message: impl Into<String>) -> Self {
        Self::TitleLookupFailed {
            message: message.into(),
        }
    }

    /// Message safe to show to the client.
    ///
    /// Exit codes stay in operator logs; the client only learns that the
    /// download failed.
    pub fn client_message(&self) -> String {
        match self {
            MediaError::ConversionFailed { .. } => {
                ytmp3_models::event::DOWNLOAD_FAILED_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}
