//! Progress event schemas streamed to clients.
//!
//! Every event serializes to a JSON object with a `status` tag and one
//! status-specific payload field:
//!
//! ```json
//! {"status":"fetching","message":"Getting video info..."}
//! {"status":"downloading","progress":42.5}
//! {"status":"success","result":"Download completed successfully. ..."}
//! {"status":"error","message":"Download failed"}
//! ```

use std::path::Path;

use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Message attached to the initial metadata-lookup event.
pub const FETCHING_MESSAGE: &str = "Getting video info...";

/// Client-facing message for a conversion that exited unsuccessfully.
pub const DOWNLOAD_FAILED_MESSAGE: &str = "Download failed";

/// One state transition of a conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Title/metadata lookup has begun
    Fetching { message: String },

    /// Conversion progress (0-100)
    Downloading { progress: f64 },

    /// Conversion finished; `result` names the output file
    Success { result: String },

    /// Job failed; terminal
    Error { message: String },
}

impl ProgressEvent {
    /// Create the metadata-lookup event.
    pub fn fetching() -> Self {
        ProgressEvent::Fetching {
            message: FETCHING_MESSAGE.to_string(),
        }
    }

    /// Create a progress event. Values are clamped into `[0, 100]`.
    pub fn downloading(percent: f64) -> Self {
        let progress = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        ProgressEvent::Downloading { progress }
    }

    /// Create the success event for a finished output file.
    pub fn success(output_path: &Path) -> Self {
        ProgressEvent::Success {
            result: format!(
                "Download completed successfully. You can find the file at:\n {}",
                output_path.display()
            ),
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    /// Generic failure for a conversion that exited non-zero.
    pub fn download_failed() -> Self {
        Self::error(DOWNLOAD_FAILED_MESSAGE)
    }

    /// Whether this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Success { .. } | ProgressEvent::Error { .. })
    }

    /// Value of the `status` tag.
    pub fn status(&self) -> &'static str {
        match self {
            ProgressEvent::Fetching { .. } => "fetching",
            ProgressEvent::Downloading { .. } => "downloading",
            ProgressEvent::Success { .. } => "success",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

/// JSON Schema of the event stream payloads, served to frontend tooling.
pub fn event_schema() -> RootSchema {
    schemars::schema_for!(ProgressEvent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_value(ProgressEvent::fetching()).unwrap(),
            json!({"status": "fetching", "message": "Getting video info..."})
        );
        assert_eq!(
            serde_json::to_value(ProgressEvent::downloading(12.3)).unwrap(),
            json!({"status": "downloading", "progress": 12.3})
        );
        assert_eq!(
            serde_json::to_value(ProgressEvent::download_failed()).unwrap(),
            json!({"status": "error", "message": "Download failed"})
        );

        let success = ProgressEvent::success(Path::new("/music/Song.mp3"));
        assert_eq!(
            serde_json::to_value(success).unwrap(),
            json!({
                "status": "success",
                "result": "Download completed successfully. You can find the file at:\n /music/Song.mp3"
            })
        );
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(
            ProgressEvent::downloading(130.0),
            ProgressEvent::Downloading { progress: 100.0 }
        );
        assert_eq!(
            ProgressEvent::downloading(-1.0),
            ProgressEvent::Downloading { progress: 0.0 }
        );
        assert_eq!(
            ProgressEvent::downloading(f64::NAN),
            ProgressEvent::Downloading { progress: 0.0 }
        );
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!ProgressEvent::fetching().is_terminal());
        assert!(!ProgressEvent::downloading(50.0).is_terminal());
        assert!(ProgressEvent::success(Path::new("a.mp3")).is_terminal());
        assert!(ProgressEvent::error("boom").is_terminal());
    }

    #[test]
    fn test_status_matches_tag() {
        for event in [
            ProgressEvent::fetching(),
            ProgressEvent::downloading(1.0),
            ProgressEvent::success(Path::new("a.mp3")),
            ProgressEvent::error("x"),
        ] {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["status"], event.status());
        }
    }

    #[test]
    fn test_event_schema_covers_every_status() {
        let schema = serde_json::to_value(event_schema()).unwrap();
        assert_eq!(schema["title"], "ProgressEvent");

        let text = schema.to_string();
        for status in ["fetching", "downloading", "success", "error"] {
            assert!(text.contains(&format!("\"{status}\"")), "missing {status}");
        }
        assert!(text.contains("\"progress\""));
    }
}
