// tests/api_tests.rs

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{app_state_with, FakeFactory, Script};
use gemini_key_rotator::{create_router, handlers::ai::REQUIREMENTS_SYSTEM_INSTRUCTION};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router(keys: &[&str], factory: Arc<FakeFactory>) -> Router {
    create_router(app_state_with(keys, factory))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_configured_keys_and_active_index() {
    let app = router(&["k0", "k1", "k2"], Arc::new(FakeFactory::new(&[])));
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["keys"], json!({ "configured": 3, "active_index": 0 }));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = router(&["k0"], Arc::new(FakeFactory::new(&[])));
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let id = response.headers().get("x-request-id").unwrap();
    assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn requirements_converses_with_the_sdv_assistant() {
    let factory = Arc::new(FakeFactory::new(&[("k0", Script::ok("What ASIL level?"))]));
    let app = router(&["k0"], factory.clone());

    let (status, body) = send(
        app,
        post_json("/api/ai/requirements", json!({ "prompt": "Lane keeping assist" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "text": "What ASIL level?" }));
    let attempt = &factory.attempts()[0];
    assert_eq!(attempt.input, "Lane keeping assist");
    assert_eq!(
        attempt.system_instruction.as_deref(),
        Some(REQUIREMENTS_SYSTEM_INSTRUCTION)
    );
}

#[tokio::test]
async fn code_defaults_to_python_and_rotates_past_quota() {
    let factory = Arc::new(FakeFactory::new(&[
        ("k0", Script::quota()),
        ("k1", Script::ok("```python\nprint('ok')\n```")),
    ]));
    let app = router(&["k0", "k1"], factory.clone());

    let (status, body) = send(
        app,
        post_json("/api/ai/code", json!({ "requirement": "door lock controller" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "```python\nprint('ok')\n```");
    let attempts = factory.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1]
        .input
        .starts_with("Generate a MISRA-compliant python microservice"));
    assert!(attempts[1].input.contains("\"door lock controller\""));
}

#[tokio::test]
async fn exhausted_keys_map_to_too_many_requests() {
    let factory = Arc::new(FakeFactory::new(&[
        ("k0", Script::quota()),
        ("k1", Script::quota()),
    ]));
    let app = router(&["k0", "k1"], factory);

    let (status, body) = send(
        app,
        post_json("/api/ai/code", json!({ "requirement": "x", "language": "c" })),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["type"], "API_KEYS_EXHAUSTED");
}

#[tokio::test]
async fn fatal_upstream_error_maps_to_bad_gateway() {
    let factory = Arc::new(FakeFactory::new(&[(
        "k0",
        Script::fail(Some(500), "internal"),
    )]));
    let app = router(&["k0", "k1"], factory);

    let (status, body) = send(
        app,
        post_json("/api/ai/requirements", json!({ "prompt": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "UPSTREAM_ERROR");
    assert_eq!(body["error"]["message"], "internal");
}

#[tokio::test]
async fn no_keys_maps_to_service_unavailable() {
    let app = router(&[], Arc::new(FakeFactory::new(&[])));

    let (status, body) = send(
        app,
        post_json("/api/ai/requirements", json!({ "prompt": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["type"], "NO_API_KEYS");
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_any_attempt() {
    let factory = Arc::new(FakeFactory::new(&[("k0", Script::ok("unused"))]));
    let app = router(&["k0"], factory.clone());

    let (status, body) = send(
        app,
        post_json("/api/ai/requirements", json!({ "prompt": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "VALIDATION_ERROR");
    assert_eq!(factory.attempt_count(), 0);
}

#[tokio::test]
async fn blank_prompt_is_rejected_by_the_client_as_invalid_request() {
    let factory = Arc::new(FakeFactory::new(&[("k0", Script::ok("unused"))]));
    let app = router(&["k0"], factory.clone());

    let (status, body) = send(
        app,
        post_json("/api/ai/requirements", json!({ "prompt": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "INVALID_REQUEST");
    assert_eq!(factory.attempt_count(), 0);
}

#[tokio::test]
async fn malformed_json_gets_the_error_envelope() {
    let factory = Arc::new(FakeFactory::new(&[("k0", Script::ok("unused"))]));
    let app = router(&["k0"], factory.clone());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ai/code")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"requirement\": "))
        .unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "INVALID_JSON");
    assert!(body["error"]["details"].is_string());
    assert_eq!(factory.attempt_count(), 0);
}

#[tokio::test]
async fn missing_required_field_gets_the_error_envelope() {
    let app = router(&["k0"], Arc::new(FakeFactory::new(&[])));

    let (status, body) = send(
        app,
        post_json("/api/ai/requirements", json!({ "text": "wrong field" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "INVALID_JSON");
}

#[tokio::test]
async fn ai_routes_only_accept_post() {
    let app = router(&["k0"], Arc::new(FakeFactory::new(&[])));
    let request = Request::builder()
        .uri("/api/ai/code")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn metrics_endpoint_is_not_found_without_a_recorder() {
    let app = router(&["k0"], Arc::new(FakeFactory::new(&[])));
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
