use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use hostwatch_alert::AlertKey;
use hostwatch_config::{ConfigLoader, PolicyHandle};
use hostwatch_server::{api, AppState, Services};
use hostwatch_types::{MetricKind, ServerId};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

const CONFIG: &str = r#"
[auth]
api_keys = ["test-key"]

[debounce]
breach = 2
clear = 2

[[servers]]
id = 1
name = "web-1"
ip_address = "10.0.0.1"
recipients = [{ username = "ops", email = "ops@example.com" }]
"#;

async fn create_test_app() -> (Router, Services) {
    let config = ConfigLoader::parse_str(CONFIG).unwrap();
    config.validate().unwrap();

    let policy = Arc::new(PolicyHandle::new(config.policy_snapshot()));
    let services = Services::build(&config, policy).await.unwrap();
    let (_tx, rx) = watch::channel(config);

    let state = AppState::new(services.coordinator.clone(), rx);
    (api::create_router(state), services)
}

fn submit(key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/api/monitor/data")
        .method("POST")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _services) = create_test_app().await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_api_key_is_rejected() {
    let (app, _services) = create_test_app().await;

    let body = json!({"ip_address": "10.0.0.1", "metrics": {"cpu": 10.0}});
    let response = app.clone().oneshot(submit(None, body.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(submit(Some("wrong"), body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], 401);
}

#[tokio::test]
async fn test_submit_reports_per_metric_outcome() {
    let (app, services) = create_test_app().await;

    let body = json!({
        "ip_address": "10.0.0.1",
        "metrics": {"cpu_value": 42.0, "memory": 120.0, "disk": 30.0}
    });
    let response = app.oneshot(submit(Some("test-key"), body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["server_matched"], true);

    let metrics = body["data"]["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 3);
    let memory = metrics.iter().find(|m| m["metric"] == "memory").unwrap();
    assert_eq!(memory["accepted"], false);
    assert!(memory["reason"].is_string());
    let cpu = metrics.iter().find(|m| m["metric"] == "cpu").unwrap();
    assert_eq!(cpu["accepted"], true);
    assert!(cpu.get("reason").is_none());

    assert!(services
        .tracker
        .state_of(AlertKey::new(ServerId(1), MetricKind::Cpu))
        .await
        .is_some());
}

#[tokio::test]
async fn test_unmatched_ip_is_not_an_error() {
    let (app, services) = create_test_app().await;

    let body = json!({"ip_address": "10.0.0.5", "metrics": {"cpu": 95.0}});
    let response = app.oneshot(submit(Some("test-key"), body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["server_matched"], false);
    assert!(services.tracker.is_empty());
}

#[tokio::test]
async fn test_submit_by_server_id() {
    let (app, services) = create_test_app().await;

    let body = json!({"server_id": 1, "metrics": {"cpu": 30.0}});
    let response = app.clone().oneshot(submit(Some("test-key"), body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["server_matched"], true);
    assert!(services
        .tracker
        .state_of(AlertKey::new(ServerId(1), MetricKind::Cpu))
        .await
        .is_some());

    // server_id 优先于 ip_address
    let body = json!({"server_id": 9, "ip_address": "10.0.0.1", "metrics": {"memory": 30.0}});
    let response = app.oneshot(submit(Some("test-key"), body)).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["server_matched"], false);
    assert!(services
        .tracker
        .state_of(AlertKey::new(ServerId(1), MetricKind::Memory))
        .await
        .is_none());
}

#[tokio::test]
async fn test_empty_metrics_is_bad_request() {
    let (app, _services) = create_test_app().await;

    let body = json!({"ip_address": "10.0.0.1", "metrics": {}});
    let response = app.clone().oneshot(submit(Some("test-key"), body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(submit(Some("test-key"), json!({"metrics": {"cpu": 1.0}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_keys_follow_config_reload() {
    let config = ConfigLoader::parse_str(CONFIG).unwrap();
    let policy = Arc::new(PolicyHandle::new(config.policy_snapshot()));
    let services = Services::build(&config, policy).await.unwrap();
    let (tx, rx) = watch::channel(config.clone());
    let app = api::create_router(AppState::new(services.coordinator.clone(), rx));

    let mut rotated = config;
    rotated.auth.api_keys = vec!["rotated-key".to_string()];
    tx.send(rotated).unwrap();

    let body = json!({"ip_address": "10.0.0.1", "metrics": {"cpu": 10.0}});
    let response = app.clone().oneshot(submit(Some("test-key"), body.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(submit(Some("rotated-key"), body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
