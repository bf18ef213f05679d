//! Per-job event channel.
//!
//! The job owns the single [`EventSender`]. Progress lines are forwarded by a
//! reader task through a [`ProgressSink`], which can only carry `Downloading`
//! events. The terminal event goes out through a consuming method, so nothing
//! can be sent by the job after it.
//!
//! Sends to a receiver that has gone away (client disconnected) are dropped
//! silently.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::debug;
use ytmp3_models::ProgressEvent;

/// Receiving half handed to the stream publisher.
pub type EventReceiver = mpsc::Receiver<ProgressEvent>;

/// Create a bounded event channel.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender {
            tx,
            fetching_sent: false,
        },
        rx,
    )
}

/// Job-side sending half.
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::Sender<ProgressEvent>,
    fetching_sent: bool,
}

impl EventSender {
    /// Announce the metadata lookup. Only the first call emits an event.
    pub async fn fetching(&mut self) {
        if self.fetching_sent {
            return;
        }
        self.fetching_sent = true;
        deliver(&self.tx, ProgressEvent::fetching()).await;
    }

    /// Handle for the output reader task.
    pub fn progress_sink(&self) -> ProgressSink {
        ProgressSink {
            tx: self.tx.clone(),
        }
    }

    /// End the sequence with a success event.
    pub async fn succeed(self, output_path: &Path) {
        self.finish(ProgressEvent::success(output_path)).await;
    }

    /// End the sequence with an error event.
    pub async fn fail(self, message: impl Into<String>) {
        self.finish(ProgressEvent::error(message)).await;
    }

    async fn finish(self, event: ProgressEvent) {
        deliver(&self.tx, event).await;
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Progress-only sender used by the output reader.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSink {
    /// Forward a progress percentage. Returns false once the receiver is gone.
    pub async fn progress(&self, percent: f64) -> bool {
        deliver(&self.tx, ProgressEvent::downloading(percent)).await
    }
}

async fn deliver(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) -> bool {
    let status = event.status();
    match tx.send(event).await {
        Ok(()) => true,
        Err(_) => {
            debug!(status, "Event receiver dropped, discarding event");
            false
        }
    }
}
