//! Conversion request handler.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use tracing::info;
use ytmp3_media::ConversionJob;
use ytmp3_models::{event_schema, ProgressEvent, ValidationResult};

use crate::metrics;
use crate::sse::{into_sse, single_event};
use crate::state::AppState;

/// `POST /download` body.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadRequest {
    /// Anything other than a JSON string counts as missing
    #[serde(default)]
    pub url: Option<serde_json::Value>,
}

impl DownloadRequest {
    /// Lenient parse: a missing or malformed body yields no URL.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_ref().and_then(serde_json::Value::as_str)
    }
}

/// Validate the URL and stream the conversion's progress.
///
/// Always answers with an event stream. A rejected URL produces a single
/// `error` event and no process is started.
pub async fn download(
    State(state): State<AppState>,
    body: Bytes,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let request = DownloadRequest::from_body(&body);

    let events = match state.allowed_hosts.validate(request.url()) {
        ValidationResult::Rejected(reason) => {
            info!(reason = reason.as_str(), "Rejected download request");
            metrics::record_url_rejection(reason.as_str());
            single_event(ProgressEvent::error(reason.client_message(request.url())))
        }
        ValidationResult::Accepted(video) => {
            let job = ConversionJob::new(Arc::clone(&state.conversion), video);
            info!(
                job_id = job.job_id(),
                video_id = job.video().video_id(),
                layout = %job.video().layout(),
                "Starting conversion"
            );
            metrics::record_conversion_started();
            job.spawn()
        }
    };

    into_sse(events)
}

/// `GET /schema/events`: JSON Schema of the `data:` payloads.
pub async fn events_schema() -> impl IntoResponse {
    Json(event_schema())
}
