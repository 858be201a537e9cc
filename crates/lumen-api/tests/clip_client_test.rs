// Integration tests for `ClipClient` using wiremock.

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumen_api::{ClipClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ClipClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = ClipClient::new(
        base,
        &SecretString::from("test-app-key"),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_resources_sends_app_key() {
    let (server, client) = setup().await;
    let light = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .and(header("hue-application-key", "test-app-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": [
                { "id": light, "type": "light", "on": { "on": true } },
                { "id": Uuid::new_v4(), "type": "room", "children": [] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items: Vec<Value> = client.list_resources().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], light.to_string());
}

#[tokio::test]
async fn test_list_resources_of_type() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource/light"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": [{ "id": Uuid::new_v4(), "type": "light" }]
        })))
        .mount(&server)
        .await;

    let items: Vec<Value> = client.list_resources_of("light").await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_get_missing_resource_is_none() {
    let (server, client) = setup().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/clip/v2/resource/light/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "errors": [], "data": [] })))
        .mount(&server)
        .await;

    let item: Option<Value> = client.get_resource("light", &id).await.unwrap();
    assert!(item.is_none());
}

#[tokio::test]
async fn test_create_returns_references() {
    let (server, client) = setup().await;
    let created = Uuid::new_v4();
    let body = json!({ "metadata": { "name": "Desk" }, "configuration_type": "screen" });

    Mock::given(method("POST"))
        .and(path("/clip/v2/resource/entertainment_configuration"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "data": [{ "rid": created, "rtype": "entertainment_configuration" }]
        })))
        .mount(&server)
        .await;

    let refs = client
        .create_resource("entertainment_configuration", &body)
        .await
        .unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].rid, created);
    assert_eq!(refs[0].rtype, "entertainment_configuration");
}

#[tokio::test]
async fn test_update_and_delete() {
    let (server, client) = setup().await;
    let id = Uuid::new_v4();
    let reply = json!({ "errors": [], "data": [{ "rid": id, "rtype": "light" }] });

    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/clip/v2/resource/light/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
        .mount(&server)
        .await;

    let updated = client
        .update_resource("light", &id, &json!({ "on": { "on": false } }))
        .await
        .unwrap();
    assert_eq!(updated[0].rid, id);

    let deleted = client.delete_resource("light", &id).await.unwrap();
    assert_eq!(deleted[0].rid, id);
}

// ── Error handling tests ────────────────────────────────────────────

#[tokio::test]
async fn test_429_is_rate_limited() {
    let (server, client) = setup().await;
    let id = Uuid::new_v4();

    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{id}")))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client
        .update_resource("light", &id, &json!({ "on": { "on": true } }))
        .await
        .unwrap_err();
    assert!(err.is_rate_limited(), "expected RateLimited, got {err:?}");
}

#[tokio::test]
async fn test_non_2xx_carries_bridge_descriptions() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/clip/v2/resource/scene"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                { "description": "invalid value for metadata.name" },
                { "description": "missing group" }
            ],
            "data": []
        })))
        .mount(&server)
        .await;

    let err = client
        .create_resource("scene", &json!({}))
        .await
        .unwrap_err();
    match err {
        Error::Bridge { status, errors } => {
            assert_eq!(status, 400);
            assert_eq!(errors, vec!["invalid value for metadata.name", "missing group"]);
        }
        other => panic!("expected Bridge error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_404_without_envelope_is_not_found() {
    let (server, client) = setup().await;
    let id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path(format!("/clip/v2/resource/light/{id}")))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client.delete_resource("light", &id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.descriptions().len(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.list_resources::<Value>().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_2xx_with_only_errors_is_failure() {
    let (server, client) = setup().await;
    let id = Uuid::new_v4();

    Mock::given(method("PUT"))
        .and(path(format!("/clip/v2/resource/light/{id}")))
        .respond_with(ResponseTemplate::new(207).set_body_json(json!({
            "errors": [{ "description": "device unreachable" }],
            "data": []
        })))
        .mount(&server)
        .await;

    let err = client
        .update_resource("light", &id, &json!({ "on": { "on": true } }))
        .await
        .unwrap_err();
    assert_eq!(err.descriptions(), ["device unreachable".to_owned()]);
}

// ── Body previews ───────────────────────────────────────────────────

/// 199 ASCII bytes, then a three-byte character straddling byte 200.
fn multibyte_body() -> String {
    format!("{}€ trailing", "x".repeat(199))
}

#[tokio::test]
async fn test_malformed_multibyte_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(ResponseTemplate::new(200).set_body_string(multibyte_body()))
        .mount(&server)
        .await;

    let err = client.list_resources::<Value>().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, multibyte_body()),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_with_multibyte_body_is_bridge_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/clip/v2/resource"))
        .respond_with(ResponseTemplate::new(500).set_body_string(multibyte_body()))
        .mount(&server)
        .await;

    let err = client.list_resources::<Value>().await.unwrap_err();
    match err {
        Error::Bridge { status, errors } => {
            assert_eq!(status, 500);
            assert_eq!(errors.len(), 1);
            assert!(errors[0].ends_with(&format!("{}€", "x".repeat(199))), "got {:?}", errors[0]);
        }
        other => panic!("expected Bridge error, got {other:?}"),
    }
}
