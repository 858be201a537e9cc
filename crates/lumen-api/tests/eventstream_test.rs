// Event-stream tests against a wiremock bridge.

use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumen_api::{EventKind, EventStreamHandle, ReconnectConfig, StreamMessage, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const UPDATE_RECORD: &str = concat!(
    "id: 1700000000:0\n",
    "data: [{\"type\":\"update\",\"data\":[{\"id\":\"11111111-1111-1111-1111-111111111111\",\"type\":\"light\",\"on\":{\"on\":false}}]}]\n\n",
);

fn connect(server: &MockServer, reconnect: ReconnectConfig) -> EventStreamHandle {
    EventStreamHandle::connect(
        &Url::parse(&server.uri()).unwrap(),
        &SecretString::from("k"),
        &TransportConfig::default(),
        reconnect,
        CancellationToken::new(),
    )
    .unwrap()
}

async fn next(rx: &mut broadcast::Receiver<StreamMessage>) -> StreamMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_event_stream_delivers_batches() {
    let server = MockServer::start().await;
    let body = format!(": hi\n\n{UPDATE_RECORD}");

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .and(header("accept", "text/event-stream"))
        .and(header("hue-application-key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let handle = connect(&server, ReconnectConfig::default());
    let mut rx = handle.subscribe();

    assert!(matches!(next(&mut rx).await, StreamMessage::Connected { reconnected: false }));
    match next(&mut rx).await {
        StreamMessage::Batch(envelope) => {
            assert_eq!(envelope.sequence_id, "1700000000:0");
            assert_eq!(envelope.batch[0].kind, EventKind::Update);
        }
        other => panic!("expected batch, got {other:?}"),
    }

    handle.shutdown();
}

#[tokio::test]
async fn test_event_stream_reconnects_after_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(UPDATE_RECORD))
        .mount(&server)
        .await;

    let handle = connect(
        &server,
        ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_retries: None,
        },
    );
    let mut rx = handle.subscribe();

    assert!(matches!(next(&mut rx).await, StreamMessage::Connected { reconnected: false }));
    assert!(matches!(next(&mut rx).await, StreamMessage::Batch(_)));
    assert!(matches!(next(&mut rx).await, StreamMessage::Disconnected { .. }));
    assert!(matches!(next(&mut rx).await, StreamMessage::Connected { reconnected: true }));

    handle.shutdown();
}

#[tokio::test]
async fn test_rejected_stream_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(UPDATE_RECORD))
        .mount(&server)
        .await;

    let handle = connect(
        &server,
        ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_retries: Some(3),
        },
    );
    let mut rx = handle.subscribe();

    assert!(matches!(next(&mut rx).await, StreamMessage::Connected { reconnected: false }));
    assert!(matches!(next(&mut rx).await, StreamMessage::Batch(_)));

    handle.shutdown();
}
