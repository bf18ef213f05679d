//! Server-sent event publisher.
//!
//! Turns a job's event channel into a `text/event-stream` response. Each
//! event becomes one `data: <json>` frame. The stream ends after the first
//! terminal event or when the channel closes, whichever comes first.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tracing::{debug, error};
use ytmp3_media::EventReceiver;
use ytmp3_models::ProgressEvent;

use crate::metrics;

/// Wrap an event channel in an SSE response with keep-alive comments.
pub fn into_sse(events: EventReceiver) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(events)).keep_alive(KeepAlive::default())
}

/// A stream that carries exactly one event and then ends.
pub fn single_event(event: ProgressEvent) -> EventReceiver {
    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 on a fresh channel: cannot fail
    let _ = tx.try_send(event);
    rx
}

struct Publisher {
    events: EventReceiver,
    _guard: ActiveStreamGuard,
}

/// Keeps the active-streams gauge accurate however the stream ends.
struct ActiveStreamGuard;

impl ActiveStreamGuard {
    fn new() -> Self {
        metrics::adjust_active_streams(1.0);
        Self
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        metrics::adjust_active_streams(-1.0);
    }
}

/// Convert the channel into SSE frames, stopping after the terminal event.
pub fn event_stream(events: EventReceiver) -> impl Stream<Item = Result<Event, Infallible>> {
    let publisher = Publisher {
        events,
        _guard: ActiveStreamGuard::new(),
    };

    stream::unfold(Some(publisher), |state| async move {
        let mut publisher = state?;
        let event = publisher.events.recv().await?;

        metrics::record_event_sent(event.status());
        let frame = to_frame(&event);

        if event.is_terminal() {
            debug!(status = event.status(), "Terminal event sent, closing stream");
            return Some((Ok(frame), None));
        }
        Some((Ok(frame), Some(publisher)))
    })
}

fn to_frame(event: &ProgressEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        error!("Failed to serialize progress event: {}", e);
        Event::default().data(r#"{"status":"error","message":"Internal error"}"#)
    })
}
