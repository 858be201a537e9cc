//! Push event stream with auto-reconnect.
//!
//! Opens the bridge's long-lived `GET /eventstream/clip/v2` response,
//! reassembles `id: <seq>\ndata: <json>\n\n` records across arbitrary
//! chunk boundaries, and fans parsed batches out through a
//! [`tokio::sync::broadcast`] channel. Reconnects with exponential
//! backoff + jitter when the response ends or breaks.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumen_api::eventstream::{EventStreamHandle, ReconnectConfig, StreamMessage};
//!
//! let handle = EventStreamHandle::connect(
//!     &base_url, &app_key, &transport, ReconnectConfig::default(), cancel.clone(),
//! )?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(msg) = rx.recv().await {
//!     if let StreamMessage::Batch(envelope) = msg {
//!         println!("{}: {} events", envelope.sequence_id, envelope.batch.len());
//!     }
//! }
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures_util::StreamExt;
use regex::bytes::Regex;
use reqwest::header::{ACCEPT, HeaderValue};
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::auth::app_key_headers;
use crate::error::Error;
use crate::transport::TransportConfig;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Largest run of bytes kept while waiting for a record terminator.
pub const MAX_PENDING_BYTES: usize = 1 << 20;

/// Path of the push stream, relative to the bridge base URL.
pub const EVENT_STREAM_PATH: &str = "/eventstream/clip/v2";

// ── Wire types ───────────────────────────────────────────────────────

/// One decoded record from the push stream.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// The record's `id:` line, as sent by the bridge.
    pub sequence_id: String,
    pub batch: Vec<EventContainer>,
}

/// One entry of a record's `data:` array.
#[derive(Debug, Clone, Deserialize)]
pub struct EventContainer {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub creationtime: Option<String>,
    /// Partial resource payloads; each carries at least `id` and `type`.
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Add,
    Update,
    Delete,
    Error,
    #[serde(other)]
    Unknown,
}

/// What subscribers receive from the background loop.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// The stream response was accepted. `reconnected` is `true` for every
    /// connection after the first, i.e. events may have been missed.
    Connected { reconnected: bool },
    Batch(Arc<EventEnvelope>),
    Disconnected { reason: String },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for event-stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── SSE record reassembly ────────────────────────────────────────────

static RECORD: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?-u)^id: ([^\n]*)\ndata: ([^\n]*)\n\n").expect("static record pattern")
});

static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(?-u)^:[^\n]*\n\n").expect("static comment pattern")
});

/// Append-only byte buffer that yields complete records.
///
/// Only the matched prefix is ever removed; a trailing partial record
/// stays buffered until the chunk that completes it arrives, unless it
/// outgrows [`MAX_PENDING_BYTES`].
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet consumed by a complete record.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Append one chunk and drain every complete record now at the front.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<EventEnvelope> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            let stray = self.buf.iter().take_while(|&&b| b == b'\n').count();
            self.buf.drain(..stray);

            if let Some(m) = COMMENT.find(&self.buf) {
                let end = m.end();
                self.buf.drain(..end);
                continue;
            }

            let Some(caps) = RECORD.captures(&self.buf) else {
                // A partial record never contains a blank line, so one here
                // closes a block that can never match; skip past it.
                if let Some(pos) = find_blank_line(&self.buf) {
                    tracing::debug!(skipped = pos + 2, "Dropping unrecognised event-stream block");
                    self.buf.drain(..pos + 2);
                    continue;
                }
                break;
            };

            let end = caps.get(0).map_or(0, |m| m.end());
            let id = caps
                .get(1)
                .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                .unwrap_or_default();
            let parsed = caps
                .get(2)
                .map(|m| serde_json::from_slice::<Vec<EventContainer>>(m.as_bytes()));

            match parsed {
                Some(Ok(batch)) => out.push(EventEnvelope {
                    sequence_id: id,
                    batch,
                }),
                Some(Err(e)) => {
                    tracing::debug!(error = %e, sequence_id = %id, "Dropping malformed event record");
                }
                None => {}
            }

            self.buf.drain(..end);
        }

        if self.buf.len() > MAX_PENDING_BYTES {
            tracing::warn!(
                pending = self.buf.len(),
                "Event stream sent no record terminator; discarding buffered bytes"
            );
            self.buf.clear();
        }

        out
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Dropping the handle does not stop the background task; call
/// [`shutdown`](Self::shutdown) or cancel the token passed to `connect`.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<StreamMessage>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the connect → read → backoff loop.
    ///
    /// Returns as soon as the task is spawned; the first connection
    /// attempt happens asynchronously.
    pub fn connect(
        base_url: &Url,
        app_key: &SecretString,
        transport: &TransportConfig,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let mut headers = app_key_headers(app_key)?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let client = transport.build_streaming_client(headers)?;

        let base = base_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}{EVENT_STREAM_PATH}"))?;

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            stream_loop(client, url, event_tx, reconnect, task_cancel).await;
        });

        Ok(Self { event_rx, cancel })
    }

    /// New receiver for stream messages. Lagging receivers see
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.event_rx.resubscribe()
    }

    /// Stop the background loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

async fn stream_loop(
    client: reqwest::Client,
    url: Url,
    event_tx: broadcast::Sender<StreamMessage>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut ever_connected = false;

    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = open(&client, &url) => result,
        };

        match outcome {
            Ok(response) => {
                let _ = event_tx.send(StreamMessage::Connected {
                    reconnected: ever_connected,
                });
                ever_connected = true;
                attempt = 0;

                let reason = match read_body(response, &event_tx, &cancel).await {
                    Ok(()) => "stream ended".to_owned(),
                    Err(e) => e.to_string(),
                };
                tracing::info!(%reason, "Event stream disconnected");
                let _ = event_tx.send(StreamMessage::Disconnected { reason });

                if cancel.is_cancelled() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Event stream connect failed");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(max_retries = max, "Event stream retry limit reached, giving up");
                        break;
                    }
                }
                attempt += 1;
            }
        }

        let delay = calculate_backoff(attempt.saturating_sub(1), &reconnect);
        tracing::info!(delay_ms = delay.as_millis(), attempt, "Waiting before reconnect");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("Event stream loop exiting");
}

async fn open(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, Error> {
    tracing::info!(url = %url, "Connecting to event stream");
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| Error::EventStream(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::EventStream(format!("HTTP {status}")));
    }
    tracing::info!("Event stream connected");
    Ok(response)
}

async fn read_body(
    response: reqwest::Response,
    event_tx: &broadcast::Sender<StreamMessage>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut body = response.bytes_stream();
    let mut buffer = SseBuffer::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    tracing::trace!(len = bytes.len(), "Event stream chunk");
                    for envelope in buffer.push(&bytes) {
                        // No subscribers is fine; the loop keeps draining.
                        let _ = event_tx.send(StreamMessage::Batch(Arc::new(envelope)));
                    }
                }
                Some(Err(e)) => return Err(Error::EventStream(e.to_string())),
                None => return Ok(()),
            },
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RECORD_JSON: &str = r#"[{"creationtime":"2024-01-01T00:00:00Z","id":"9a8b7c6d-0000-4000-8000-000000000001","type":"update","data":[{"id":"11111111-1111-1111-1111-111111111111","type":"light","on":{"on":true}}]}]"#;

    fn record(id: &str) -> String {
        format!("id: {id}\ndata: {RECORD_JSON}\n\n")
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();
        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };
        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_secs(13), "{d10:?} not capped");
    }

    #[test]
    fn single_record_parses() {
        let mut buf = SseBuffer::new();
        let out = buf.push(record("1700000000:0").as_bytes());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_id, "1700000000:0");
        assert_eq!(out[0].batch.len(), 1);
        assert_eq!(out[0].batch[0].kind, EventKind::Update);
        assert_eq!(out[0].batch[0].data[0]["type"], "light");
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn record_split_across_two_boundaries() {
        let full = record("7");
        let bytes = full.as_bytes();
        let (a, rest) = bytes.split_at(5);
        let (b, c) = rest.split_at(40);

        let mut buf = SseBuffer::new();
        assert!(buf.push(a).is_empty());
        assert!(buf.push(b).is_empty());
        let out = buf.push(c);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_id, "7");
    }

    #[test]
    fn partial_record_is_retained() {
        let full = record("2");
        let partial = &full.as_bytes()[..full.len() - 1];

        let mut buf = SseBuffer::new();
        assert!(buf.push(partial).is_empty());
        assert_eq!(buf.pending(), partial);
    }

    #[test]
    fn trailing_partial_kept_after_complete_record() {
        let first = record("1");
        let second = record("2");
        let chunk = format!("{first}{}", &second[..10]);

        let mut buf = SseBuffer::new();
        let out = buf.push(chunk.as_bytes());
        assert_eq!(out.len(), 1);
        assert_eq!(buf.pending(), &second.as_bytes()[..10]);

        let out = buf.push(&second.as_bytes()[10..]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_id, "2");
    }

    #[test]
    fn hello_comment_is_skipped() {
        let mut buf = SseBuffer::new();
        let chunk = format!(": hi\n\n{}", record("3"));
        let out = buf.push(chunk.as_bytes());
        assert_eq!(out.len(), 1);
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn malformed_record_is_dropped_and_stream_continues() {
        let mut buf = SseBuffer::new();
        let chunk = format!("id: 4\ndata: {{not json\n\n{}", record("5"));
        let out = buf.push(chunk.as_bytes());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_id, "5");
    }

    #[test]
    fn leading_newlines_do_not_swallow_record() {
        let mut buf = SseBuffer::new();
        let chunk = format!("\n{}", record("8"));
        let out = buf.push(chunk.as_bytes());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_id, "8");

        let out = buf.push(format!("\n\n{}", record("9")).as_bytes());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_id, "9");
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn unterminated_stream_is_bounded() {
        let mut buf = SseBuffer::new();
        let junk = vec![b'x'; 64 * 1024];
        for _ in 0..(MAX_PENDING_BYTES / junk.len()) {
            assert!(buf.push(&junk).is_empty());
        }
        assert_eq!(buf.pending().len(), MAX_PENDING_BYTES);

        assert!(buf.push(&junk).is_empty());
        assert!(buf.pending().is_empty());

        let out = buf.push(record("10").as_bytes());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn unknown_event_kind_is_tolerated() {
        let json = r#"[{"type":"resync","data":[]}]"#;
        let mut buf = SseBuffer::new();
        let out = buf.push(format!("id: 6\ndata: {json}\n\n").as_bytes());
        assert_eq!(out[0].batch[0].kind, EventKind::Unknown);
    }
}
