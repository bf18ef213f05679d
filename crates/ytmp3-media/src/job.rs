//! Conversion job supervision.
//!
//! A job runs the conversion tool for one validated video and reports its
//! lifecycle as [`ProgressEvent`](ytmp3_models::ProgressEvent)s:
//!
//! ```text
//! fetching -> downloading* -> success | error
//! ```
//!
//! Every sequence ends with exactly one terminal event. Resolution failures
//! are reported as a lone `error` with no preceding `fetching`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};
use uuid::Uuid;
use ytmp3_models::CanonicalVideo;

use crate::channel::{event_channel, EventReceiver, EventSender, ProgressSink};
use crate::command::{locate_binary, YtDlpCommand};
use crate::config::ConversionConfig;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{allocate_output_path, ensure_output_dir, sanitize_title};
use crate::metadata::fetch_title;
use crate::progress::parse_progress;

/// How long to keep draining output after the process was killed.
const READER_GRACE: Duration = Duration::from_secs(2);

/// One supervised conversion.
///
/// Log lines emitted while the job runs carry `job_id` and `video_id`
/// through the span returned by [`ConversionJob::span`].
pub struct ConversionJob {
    config: Arc<ConversionConfig>,
    video: CanonicalVideo,
    job_id: String,
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(Duration),
    Disconnected,
}

impl ConversionJob {
    pub fn new(config: Arc<ConversionConfig>, video: CanonicalVideo) -> Self {
        Self {
            config,
            video,
            job_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn video(&self) -> &CanonicalVideo {
        &self.video
    }

    pub fn span(&self) -> Span {
        info_span!("job", job_id = %self.job_id, video_id = %self.video.video_id())
    }

    /// Start the job in the background and return its event stream.
    ///
    /// The receiver yields the full sequence and then closes.
    pub fn spawn(self) -> EventReceiver {
        let (events, rx) = event_channel(self.config.event_buffer);
        let span = self.span();
        tokio::spawn(self.run(events).instrument(span));
        rx
    }

    /// Drive the job to completion, sending every event through `events`.
    pub async fn run(self, mut events: EventSender) {
        info!(url = %self.video.canonical_url(), "Conversion job started");

        let binary = match locate_binary(&self.config.binary).await {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "Conversion tool unavailable");
                events.fail(e.client_message()).await;
                return;
            }
        };

        events.fetching().await;

        match self.convert(&binary, &events).await {
            Ok(output) => {
                info!(output = %output.display(), "Conversion job completed");
                events.succeed(&output).await;
            }
            Err(e) => {
                error!(error = %e, "Conversion job failed");
                events.fail(e.client_message()).await;
            }
        }
    }

    async fn convert(&self, binary: &Path, events: &EventSender) -> MediaResult<PathBuf> {
        let url = self.video.canonical_url();
        let video_id = self.video.video_id();

        let title = match fetch_title(&self.config, binary, url).await {
            Ok(title) => title,
            Err(e) => {
                warn!(error = %e, fallback = video_id, "Title lookup failed, naming file after video ID");
                video_id.to_string()
            }
        };

        let stem = sanitize_title(&title, video_id);
        let output_dir = ensure_output_dir(&self.config.output_dir).await?;
        let output =
            allocate_output_path(&output_dir, &stem, self.config.output_extension()).await?;

        let args = YtDlpCommand::from_config(&self.config, url, &output).build_args();
        debug!("Running conversion: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn(&self.config.binary, e))?;

        info!(pid = ?child.id(), output = %output.display(), "Converting \"{}\"", stem);

        let reader = tokio::spawn(
            forward_progress(child.stdout.take(), child.stderr.take(), events.progress_sink())
                .in_current_span(),
        );

        let status = match self.wait_for_exit(&mut child, events).await {
            WaitOutcome::Exited(status) => {
                // Every progress line is forwarded before the terminal event
                // goes out, however slowly the client reads.
                let last_diagnostic = reader.await.ok().flatten();
                let status = status?;
                if !status.success() {
                    if let Some(line) = last_diagnostic {
                        warn!(exit_code = ?status.code(), "Conversion failed: {}", line);
                    }
                    return Err(MediaError::ConversionFailed {
                        exit_code: status.code(),
                    });
                }
                status
            }
            WaitOutcome::TimedOut(limit) => {
                warn!(limit_secs = limit.as_secs(), "Conversion timed out, killing process");
                kill_and_drain(&mut child, reader).await;
                return Err(MediaError::Timeout(limit.as_secs()));
            }
            WaitOutcome::Disconnected => {
                info!("Client disconnected, killing process");
                kill_and_drain(&mut child, reader).await;
                return Err(MediaError::Cancelled);
            }
        };

        debug!(exit_code = ?status.code(), "Conversion process exited");
        Ok(output)
    }

    /// Wait for the process, the wall-clock limit, or the client going away.
    async fn wait_for_exit(&self, child: &mut Child, events: &EventSender) -> WaitOutcome {
        let limit = self.config.timeout;
        let deadline = async {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancel_on_disconnect = self.config.cancel_on_disconnect;
        let disconnected = async {
            if cancel_on_disconnect {
                events.closed().await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = deadline => WaitOutcome::TimedOut(limit.unwrap_or_default()),
            _ = disconnected => WaitOutcome::Disconnected,
        }
    }
}

/// Kill the process, then give the reader a bounded window to finish.
async fn kill_and_drain(child: &mut Child, mut reader: JoinHandle<Option<String>>) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, pid = ?child.id(), "Failed to kill conversion process");
    }

    if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
        debug!("Output reader still busy after kill, aborting it");
        reader.abort();
    }
}

enum Source {
    Stdout,
    Stderr,
}

/// Read stdout and stderr until both close, forwarding progress.
///
/// Both pipes are drained so the child never blocks on a full buffer. Keeps
/// reading after the receiver is gone. Returns the last non-progress stderr
/// line for diagnostics.
async fn forward_progress(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    sink: ProgressSink,
) -> Option<String> {
    let mut stdout = stdout.map(|s| BufReader::new(s).split(b'\n'));
    let mut stderr = stderr.map(|s| BufReader::new(s).split(b'\n'));
    let mut receiver_open = true;
    let mut last_diagnostic = None;

    loop {
        let (source, segment) = tokio::select! {
            segment = next_segment(stdout.as_mut()), if stdout.is_some() => (Source::Stdout, segment),
            segment = next_segment(stderr.as_mut()), if stderr.is_some() => (Source::Stderr, segment),
            else => break,
        };

        let Some(bytes) = segment else {
            match source {
                Source::Stdout => stdout = None,
                Source::Stderr => stderr = None,
            }
            continue;
        };

        let line = String::from_utf8_lossy(&bytes);
        trace!("yt-dlp: {}", line.trim_end());

        let percentages = parse_progress(&line);
        if percentages.is_empty() {
            if matches!(source, Source::Stderr) && !line.trim().is_empty() {
                last_diagnostic = Some(line.trim().to_string());
            }
            continue;
        }

        for percent in percentages {
            if receiver_open {
                receiver_open = sink.progress(percent).await;
            }
        }
    }

    last_diagnostic
}

async fn next_segment<R>(split: Option<&mut Split<BufReader<R>>>) -> Option<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match split {
        Some(split) => split.next_segment().await.ok().flatten(),
        None => None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use ytmp3_models::{validate, ProgressEvent};

    const URL: &str = "https://youtu.be/d_HlPboLRL8";

    /// Writes the file named by `-o` after a short delay, like a real download.
    const WRITE_OUTPUT: &str = "out=''\nprev=''\nfor a in \"$@\"; do\n  if [ \"$prev\" = '-o' ]; then out=\"$a\"; fi\n  prev=\"$a\"\ndone\nsleep 0.2\necho '[download]  50.0%' >&2\necho '[download] 100.0%' >&2\n: > \"$out\"\nexit 0";

    fn video() -> CanonicalVideo {
        validate(Some(URL)).into_result().unwrap()
    }

    /// Fake conversion tool: answers the title lookup, then runs `download`.
    fn config_with_script(dir: &TempDir, title: &str, download: &str) -> ConversionConfig {
        let script = dir.path().join("fake-ytdlp.sh");
        let body = format!(
            "for a in \"$@\"; do\n  if [ \"$a\" = \"--get-title\" ]; then\n{}\n  fi\ndone\n{}\n",
            title, download
        );
        std::fs::write(&script, body).unwrap();
        ConversionConfig {
            binary: "/bin/sh".to_string(),
            extra_args: vec![script.to_string_lossy().into_owned()],
            output_dir: dir.path().join("out"),
            title_timeout: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    async fn collect(config: ConversionConfig) -> Vec<ProgressEvent> {
        let mut rx = ConversionJob::new(Arc::new(config), video()).spawn();
        let mut events = Vec::new();
        while let Some(event) = tokio::time::timeout(Duration::from_secs(20), rx.recv())
            .await
            .unwrap()
        {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_successful_conversion_sequence() {
        let dir = TempDir::new().unwrap();
        let config = config_with_script(
            &dir,
            "echo 'Test Song'; exit 0",
            "echo '[download]  12.3%' >&2\necho '[download]  87.0%' >&2\nexit 0",
        );

        let events = collect(config).await;
        assert_eq!(events.len(), 4, "{events:?}");
        assert_eq!(events[0], ProgressEvent::fetching());
        assert_eq!(events[1], ProgressEvent::Downloading { progress: 12.3 });
        assert_eq!(events[2], ProgressEvent::Downloading { progress: 87.0 });
        match &events[3] {
            ProgressEvent::Success { result } => {
                assert!(result.starts_with("Download completed successfully."));
                assert!(result.ends_with("Test Song.mp3"), "{result}");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_progress_on_stdout_is_forwarded() {
        let dir = TempDir::new().unwrap();
        let config = config_with_script(
            &dir,
            "echo 'Test Song'; exit 0",
            "echo '[download]  50.0%'\nexit 0",
        );

        let events = collect(config).await;
        assert_eq!(events[1], ProgressEvent::Downloading { progress: 50.0 });
        assert!(matches!(events[2], ProgressEvent::Success { .. }));
    }

    #[tokio::test]
    async fn test_failed_conversion() {
        let dir = TempDir::new().unwrap();
        let config = config_with_script(
            &dir,
            "echo 'Test Song'; exit 0",
            "echo 'ERROR: Video unavailable' >&2\nexit 1",
        );

        let events = collect(config).await;
        assert_eq!(
            events,
            vec![ProgressEvent::fetching(), ProgressEvent::error("Download failed")]
        );
    }

    #[tokio::test]
    async fn test_title_lookup_failure_falls_back_to_video_id() {
        let dir = TempDir::new().unwrap();
        let config = config_with_script(&dir, "exit 1", "exit 0");

        let events = collect(config).await;
        match events.last() {
            Some(ProgressEvent::Success { result }) => {
                assert!(result.ends_with("d_HlPboLRL8.mp3"), "{result}")
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_single_error() {
        let dir = TempDir::new().unwrap();
        let config = ConversionConfig {
            binary: "definitely-not-a-real-binary-ytmp3".to_string(),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };

        let events = collect(config).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            ProgressEvent::Error { message } => assert!(message.contains("not found")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_script(&dir, "echo 'Test Song'; exit 0", "exec sleep 30");
        config.timeout = Some(Duration::from_secs(1));

        let events = collect(config).await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::fetching(),
                ProgressEvent::error("Download timed out after 1 seconds"),
            ]
        );
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let dir = TempDir::new().unwrap();
        let config = config_with_script(&dir, "echo 'Song'; exit 0", "exit 0");

        let events = collect(config).await;
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_slow_consumer_receives_every_progress_line() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_script(
            &dir,
            "echo 'Test Song'; exit 0",
            "i=1\nwhile [ $i -le 60 ]; do\n  echo \"[download]  $i.0%\" >&2\n  i=$((i+1))\ndone\nexit 0",
        );
        config.event_buffer = 4;

        let mut rx = ConversionJob::new(Arc::new(config), video()).spawn();
        let mut events = Vec::new();
        while let Some(event) = tokio::time::timeout(Duration::from_secs(20), rx.recv())
            .await
            .unwrap()
        {
            // Reading the whole stream takes longer than the post-kill drain window
            tokio::time::sleep(Duration::from_millis(60)).await;
            events.push(event);
        }

        let progress: Vec<f64> = events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Downloading { progress } => Some(*progress),
                _ => None,
            })
            .collect();
        let expected: Vec<f64> = (1..=60).map(f64::from).collect();
        assert_eq!(progress, expected);
        assert_eq!(events.len(), 62);
        assert!(matches!(events.last(), Some(ProgressEvent::Success { .. })));
    }

    #[tokio::test]
    async fn test_job_finishes_after_client_leaves() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_script(&dir, "echo 'Test Song'; exit 0", WRITE_OUTPUT);
        config.cancel_on_disconnect = false;

        let (events, mut rx) = event_channel(1);
        let job = tokio::spawn(ConversionJob::new(Arc::new(config), video()).run(events));

        assert_eq!(rx.recv().await, Some(ProgressEvent::fetching()));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(20), job)
            .await
            .unwrap()
            .unwrap();
        assert!(dir.path().join("out").join("Test Song.mp3").is_file());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_conversion() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with_script(&dir, "echo 'Test Song'; exit 0", "exec sleep 30");
        config.cancel_on_disconnect = true;

        let (events, mut rx) = event_channel(1);
        let job = tokio::spawn(ConversionJob::new(Arc::new(config), video()).run(events));

        assert_eq!(rx.recv().await, Some(ProgressEvent::fetching()));
        drop(rx);

        let started = std::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(5), job)
            .await
            .unwrap()
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_job_ids_are_unique_uuids() {
        let config = Arc::new(ConversionConfig::default());
        let a = ConversionJob::new(config.clone(), video());
        let b = ConversionJob::new(config, video());

        assert!(Uuid::parse_str(a.job_id()).is_ok());
        assert_ne!(a.job_id(), b.job_id());
        assert_eq!(a.video().video_id(), "d_HlPboLRL8");
    }
}
