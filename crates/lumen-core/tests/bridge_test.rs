// Integration tests for `Bridge` against a wiremock bridge.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumen_core::{
    Bridge, BridgeConfig, CoreError, ErrorKind, Gamut, LightCommand, ReconnectPolicy,
    RegistryEvent, ResourceKey, ResourceType, WriteOutcome, Xy,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn envelope(data: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "errors": [], "data": data }))
}

fn dimmable_light(id: Uuid) -> Value {
    json!({
        "id": id,
        "type": "light",
        "metadata": { "name": "Desk" },
        "on": { "on": false },
        "dimming": { "brightness": 50.0 }
    })
}

async fn setup(snapshot: Vec<Value>) -> (MockServer, Bridge) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(envelope(snapshot))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let mut config = BridgeConfig::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("test-app-key"),
    );
    config.event_stream_enabled = false;
    config.client_key = Some(SecretString::from("00112233445566778899aabbccddeeff"));

    let bridge = Bridge::new(config).unwrap();
    bridge.connect().await.unwrap();
    (server, bridge)
}

fn drain(rx: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut out = Vec::new();
    while let Ok(e) = rx.try_recv() {
        out.push(e);
    }
    out
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_loads_snapshot() {
    let light = Uuid::new_v4();
    let (_server, bridge) = setup(vec![
        dimmable_light(light),
        json!({ "id": Uuid::new_v4(), "type": "room", "children": [] }),
        json!({ "id": Uuid::new_v4(), "type": "not_a_real_type" }),
    ])
    .await;

    assert_eq!(bridge.store().len(), 2);
    let stored = bridge
        .resource(&ResourceKey::new(ResourceType::Light, light))
        .unwrap();
    assert_eq!(stored.name(), Some("Desk"));
}

#[tokio::test]
async fn test_refresh_sweeps_missing_resources() {
    let keep = Uuid::new_v4();
    let gone = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(keep), dimmable_light(gone)]).await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(envelope(vec![dimmable_light(keep)]))
        .mount(&server)
        .await;

    let mut events = bridge.events();
    let stats = bridge.refresh_resources().await.unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(
        drain(&mut events),
        vec![RegistryEvent::Deleted {
            key: ResourceKey::new(ResourceType::Light, gone)
        }]
    );
}

#[tokio::test]
async fn test_refresh_failure_is_reported() {
    let (server, bridge) = setup(vec![]).await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "errors": [{ "description": "service unavailable" }],
            "data": []
        })))
        .mount(&server)
        .await;

    let mut events = bridge.events();
    let err = bridge.refresh_resources().await.unwrap_err();
    assert!(matches!(err, CoreError::Bridge { status: 503, .. }));

    let events = drain(&mut events);
    let RegistryEvent::Error { errors } = &events[0] else {
        panic!("expected error event, got {events:?}");
    };
    assert_eq!(errors[0].kind, ErrorKind::Bridge);
    assert!(errors[0].message.contains("service unavailable"));
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_refetches_created_types_only() {
    let (server, bridge) = setup(vec![dimmable_light(Uuid::new_v4())]).await;
    let room = Uuid::new_v4();
    let grouped = Uuid::new_v4();
    let body = json!({ "type": "room", "metadata": { "name": "Office" }, "children": [] });

    Mock::given(method("POST"))
        .and(path("/clip/v2/resource/room"))
        .and(body_json(&body))
        .respond_with(envelope(vec![
            json!({ "rid": room, "rtype": "room" }),
            json!({ "rid": grouped, "rtype": "grouped_light" }),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/room"))
        .respond_with(envelope(vec![json!({
            "id": room, "type": "room", "metadata": { "name": "Office" }, "children": []
        })]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/grouped_light"))
        .respond_with(envelope(vec![json!({
            "id": grouped, "type": "grouped_light", "on": { "on": false }
        })]))
        .expect(1)
        .mount(&server)
        .await;

    let created = bridge.create(ResourceType::Room, body).await.unwrap();

    assert_eq!(created.len(), 2);
    assert!(bridge.resource(&ResourceKey::new(ResourceType::Room, room)).is_some());
    assert!(
        bridge
            .resource(&ResourceKey::new(ResourceType::GroupedLight, grouped))
            .is_some()
    );
    // The light from the initial snapshot was outside the refetch scope.
    assert_eq!(bridge.resources(ResourceType::Light).len(), 1);
}

#[tokio::test]
async fn test_validation_fails_before_network() {
    let light = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(light)]).await;

    Mock::given(method("PUT"))
        .respond_with(envelope(vec![]))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(envelope(vec![]))
        .expect(0)
        .mount(&server)
        .await;

    let key = ResourceKey::new(ResourceType::Light, light);
    let err = bridge
        .update(key, json!({ "dimming": { "brightness": 150 } }))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));

    let err = bridge
        .create(ResourceType::EntertainmentConfiguration, json!({ "metadata": { "name": "x" } }))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_rate_limit_is_reported_not_retried() {
    let light = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(light)]).await;

    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{light}")))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut events = bridge.events();
    let key = ResourceKey::new(ResourceType::Light, light);
    let err = bridge
        .update(key, json!({ "on": { "on": true } }))
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        RegistryEvent::Error { errors } if errors[0].kind == ErrorKind::RateLimit
    )));
}

#[tokio::test]
async fn test_set_light_skips_missing_capability() {
    let light = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(light)]).await;

    Mock::given(method("PUT"))
        .respond_with(envelope(vec![]))
        .expect(0)
        .mount(&server)
        .await;

    let mut events = bridge.events();
    let key = ResourceKey::new(ResourceType::Light, light);
    let command = LightCommand::on(true).with_xy(lumen_core::Xy::new(0.3, 0.3));
    let outcome = bridge.set_light(key, &command).await.unwrap();

    assert_eq!(outcome, WriteOutcome::Unsupported);
    assert_eq!(
        drain(&mut events),
        vec![RegistryEvent::UnsupportedCapability {
            key,
            capability: lumen_core::Capability::Color,
        }]
    );
}

#[tokio::test]
async fn test_set_light_sends_supported_command() {
    let light = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(light)]).await;

    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{light}")))
        .and(body_json(json!({ "on": { "on": true }, "dimming": { "brightness": 80.0 } })))
        .respond_with(envelope(vec![json!({ "rid": light, "rtype": "light" })]))
        .expect(1)
        .mount(&server)
        .await;

    let key = ResourceKey::new(ResourceType::Light, light);
    let outcome = bridge
        .set_light(key, &LightCommand::on(true).with_brightness(80.0))
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Sent);
}

#[tokio::test]
async fn test_set_light_clamps_xy_into_gamut() {
    let light = Uuid::new_v4();
    let mut payload = dimmable_light(light);
    payload["color"] = json!({ "xy": { "x": 0.4, "y": 0.4 }, "gamut_type": "B" });
    let (server, bridge) = setup(vec![payload]).await;

    let clamped = Gamut::B.clamp(Xy::new(0.0, 0.0));
    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{light}")))
        .and(body_json(json!({ "color": { "xy": { "x": clamped.x, "y": clamped.y } } })))
        .respond_with(envelope(vec![json!({ "rid": light, "rtype": "light" })]))
        .expect(1)
        .mount(&server)
        .await;

    let key = ResourceKey::new(ResourceType::Light, light);
    let command = LightCommand::default().with_xy(Xy::new(0.0, 0.0));
    let outcome = bridge.set_light(key, &command).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Sent);
}

#[tokio::test]
async fn test_rapid_updates_are_throttled_and_merged() {
    let light = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(light)]).await;

    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{light}")))
        .and(body_json(json!({ "on": { "on": true } })))
        .respond_with(envelope(vec![]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{light}")))
        .and(body_json(json!({ "dimming": { "brightness": 30 } })))
        .respond_with(envelope(vec![]))
        .expect(1)
        .mount(&server)
        .await;

    let key = ResourceKey::new(ResourceType::Light, light);
    let first = bridge.update(key, json!({ "on": { "on": true } })).await.unwrap();
    let second = bridge
        .update(key, json!({ "dimming": { "brightness": 10 } }))
        .await
        .unwrap();
    let third = bridge
        .update(key, json!({ "dimming": { "brightness": 30 } }))
        .await
        .unwrap();

    assert_eq!(first, WriteOutcome::Sent);
    assert_eq!(second, WriteOutcome::Deferred);
    assert_eq!(third, WriteOutcome::Deferred);

    // Default window is 100 ms; give the deferred flush time to land.
    tokio::time::sleep(Duration::from_millis(400)).await;
    server.verify().await;
}

#[tokio::test]
async fn test_delete_removes_from_store() {
    let light = Uuid::new_v4();
    let (server, bridge) = setup(vec![dimmable_light(light)]).await;

    Mock::given(method("DELETE"))
        .and(path(format!("/clip/v2/resource/light/{light}")))
        .respond_with(envelope(vec![json!({ "rid": light, "rtype": "light" })]))
        .expect(1)
        .mount(&server)
        .await;

    let key = ResourceKey::new(ResourceType::Light, light);
    let mut events = bridge.events();
    bridge.delete(key).await.unwrap();

    assert!(bridge.resource(&key).is_none());
    assert_eq!(drain(&mut events), vec![RegistryEvent::Deleted { key }]);
}

// ── Event stream ────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_events_reach_store_and_reconnect_refreshes() {
    let kept = Uuid::new_v4();
    let gone = Uuid::new_v4();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(envelope(vec![dimmable_light(kept), dimmable_light(gone)]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // Later snapshots agree with what the stream reported.
    let mut switched_on = dimmable_light(kept);
    switched_on["on"] = json!({ "on": true });
    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(envelope(vec![switched_on]))
        .mount(&server)
        .await;

    let body = format!(
        "id: 1700000000:0\ndata: [{}]\n\nid: 1700000000:1\ndata: [{}]\n\n",
        json!({ "type": "update", "data": [{ "id": kept, "type": "light", "on": { "on": true } }] }),
        json!({ "type": "delete", "data": [{ "id": gone, "type": "light" }] }),
    );
    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut config = BridgeConfig::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("test-app-key"),
    );
    config.reconnect = ReconnectPolicy {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_retries: None,
    };
    let bridge = Bridge::new(config).unwrap();
    bridge.connect().await.unwrap();

    let kept_key = ResourceKey::new(ResourceType::Light, kept);
    let gone_key = ResourceKey::new(ResourceType::Light, gone);
    let snapshots = || async {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "GET" && r.url.path() == "/clip/v2/resource")
            .count()
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let on = bridge
                .resource(&kept_key)
                .and_then(|r| r.field("on").and_then(|o| o["on"].as_bool()));
            if on == Some(true) && bridge.resource(&gone_key).is_none() && snapshots().await >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(bridge.resources(ResourceType::Light).len(), 1);
    bridge.disconnect().await;
}
