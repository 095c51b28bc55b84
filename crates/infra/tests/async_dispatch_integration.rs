//! Integration tests for deferred-completion dispatch
//!
//! **Coverage:**
//! - Deferred response → monitor polls → result decoded from `api_response`
//! - Task unknown to the server, failed tasks, tenancy mismatch
//! - Duplicate in-flight task ids, wait timeout, cancellation, shutdown
//! - Failed status polls reaching the error sink
//! - Re-login on 401 and the fatal second 401
//!
//! **Infrastructure:**
//! - WireMock HTTP server standing in for the controller
//! - ApiClient with the real reqwest transport and task monitor

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use fabric_infra::api::{ApiClient, ApiError, ApiRequest, TaskPollError};
use serde::Deserialize;
use serde_json::{json, Value};
use support::{fast_config, init_tracing, mount_deferred, mount_detail, mount_login, mount_statuses};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Created {
    foo: i64,
}

async fn connected_client(server: &MockServer) -> ApiClient {
    mount_login(server, "tok").await;
    ApiClient::connect(fast_config(server)).await.expect("client should connect")
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_deferred_result_is_decoded_after_task_succeeds() {
    init_tracing();
    let server = MockServer::start().await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/virtual-networks", json!({"task_id": "t1"}))
        .await;
    mount_statuses(&server, "bp1", &["t1"], json!([{"id": "t1", "status": "in_progress"}]), Some(1))
        .await;
    mount_statuses(&server, "bp1", &["t1"], json!([{"id": "t1", "status": "succeeded"}]), None)
        .await;
    mount_detail(
        &server,
        "bp1",
        "t1",
        json!({"id": "t1", "status": "succeeded", "detailed_status": {"api_response": {"foo": 1}}}),
    )
    .await;

    let client = connected_client(&server).await;
    let created: Created =
        client.post("/api/blueprints/bp1/virtual-networks", &json!({"label": "vn1"})).await.unwrap();

    assert_eq!(created, Created { foo: 1 });
    let metrics = client.task_metrics();
    assert_eq!(metrics.registrations, 1);
    assert_eq!(metrics.succeeded, 1);
    assert!(metrics.polls >= 2);
}

#[tokio::test]
async fn test_tenancy_taken_from_body_when_url_has_none() {
    let server = MockServer::start().await;
    mount_deferred(&server, "POST", "/api/design/import", json!({"id": "bp7", "task_id": "t7"}))
        .await;
    mount_statuses(&server, "bp7", &["t7"], json!([{"id": "t7", "status": "succeeded"}]), None)
        .await;
    mount_detail(&server, "bp7", "t7", json!({"status": "succeeded"})).await;

    let client = connected_client(&server).await;
    client.talk_no_output(ApiRequest::post("/api/design/import")).await.unwrap();
}

#[tokio::test]
async fn test_direct_response_needs_no_monitor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/blueprints/bp1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "bp1", "label": "dc1"})))
        .mount(&server)
        .await;

    let client = ApiClient::new(fast_config(&server)).unwrap();
    let blueprint: Value = client.get("/api/blueprints/bp1").await.unwrap();

    assert_eq!(blueprint["label"], "dc1");
    assert!(!client.is_task_monitor_running());
}

// ============================================================================
// Task failures
// ============================================================================

#[tokio::test]
async fn test_task_missing_from_server_is_unknown() {
    let server = MockServer::start().await;
    mount_deferred(&server, "PUT", "/api/blueprints/bp2/nodes", json!({"task_id": "t2"})).await;
    mount_statuses(&server, "bp2", &["t2"], json!([]), None).await;

    let client = connected_client(&server).await;
    let err = client
        .put::<_, Value>("/api/blueprints/bp2/nodes", &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::TaskUnknown(id) if id.as_str() == "t2"));
    assert_eq!(client.task_metrics().unknown, 1);
}

#[tokio::test]
async fn test_failed_task_surfaces_remote_errors() {
    let server = MockServer::start().await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/security-zones", json!({"task_id": "t3"}))
        .await;
    mount_statuses(&server, "bp1", &["t3"], json!([{"id": "t3", "status": "failed"}]), None).await;
    mount_detail(
        &server,
        "bp1",
        "t3",
        json!({
            "status": "failed",
            "detailed_status": {"errors": {"vlan_id": "already in use"}, "error_code": 422}
        }),
    )
    .await;

    let client = connected_client(&server).await;
    let err = client
        .post::<_, Value>("/api/blueprints/bp1/security-zones", &json!({"vlan_id": 10}))
        .await
        .unwrap_err();

    let detail = err.task_detail().expect("failure should carry task detail");
    assert_eq!(detail.detailed_status.error_code, 422);
    assert!(err.to_string().contains("already in use"));
    assert!(!err.should_retry());
}

#[tokio::test]
async fn test_tenancy_mismatch_is_rejected_before_tracking() {
    let server = MockServer::start().await;
    mount_deferred(
        &server,
        "POST",
        "/api/blueprints/bp1/virtual-networks",
        json!({"id": "bp9", "task_id": "t1"}),
    )
    .await;

    let client = connected_client(&server).await;
    let err = client
        .post::<_, Value>("/api/blueprints/bp1/virtual-networks", &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::TenancyMismatch { .. }));
    assert_eq!(client.task_metrics().registrations, 0);
}

// ============================================================================
// Waiting
// ============================================================================

#[tokio::test]
async fn test_same_task_in_flight_twice_is_rejected_once() {
    let server = MockServer::start().await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/deploy", json!({"task_id": "dup"})).await;
    mount_statuses(&server, "bp1", &["dup"], json!([{"id": "dup", "status": "in_progress"}]), Some(5))
        .await;
    mount_statuses(&server, "bp1", &["dup"], json!([{"id": "dup", "status": "succeeded"}]), None)
        .await;
    mount_detail(&server, "bp1", "dup", json!({"status": "succeeded"})).await;

    let client = connected_client(&server).await;
    let (first, second) = tokio::join!(
        client.talk_no_output(ApiRequest::post("/api/blueprints/bp1/deploy")),
        client.talk_no_output(ApiRequest::post("/api/blueprints/bp1/deploy")),
    );

    let results = [first, second];
    let rejected =
        results.iter().filter(|r| matches!(r, Err(ApiError::TaskAlreadyTracked(_)))).count();
    let completed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!((rejected, completed), (1, 1));
    assert_eq!(client.task_metrics().duplicates, 1);
}

#[tokio::test]
async fn test_wait_timeout_gives_up_on_slow_task() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/deploy", json!({"task_id": "slow"})).await;
    mount_statuses(&server, "bp1", &["slow"], json!([{"id": "slow", "status": "in_progress"}]), None)
        .await;

    let mut config = fast_config(&server);
    config.task_wait_timeout = Some(Duration::from_millis(150));
    let client = ApiClient::connect(config).await.unwrap();

    let err = client.talk_no_output(ApiRequest::post("/api/blueprints/bp1/deploy")).await.unwrap_err();
    assert!(matches!(err, ApiError::TaskWaitTimeout { .. }));
}

#[tokio::test]
async fn test_cancellation_abandons_wait() {
    let server = MockServer::start().await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/deploy", json!({"task_id": "t5"})).await;
    mount_statuses(&server, "bp1", &["t5"], json!([{"id": "t5", "status": "init"}]), None).await;

    let client = connected_client(&server).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let request = ApiRequest::post("/api/blueprints/bp1/deploy").cancel_with(cancel);
    let err = client.talk_no_output(request).await.unwrap_err();

    assert!(matches!(err, ApiError::Cancelled));
}

#[tokio::test]
async fn test_stopping_monitor_releases_waiters() {
    let server = MockServer::start().await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/deploy", json!({"task_id": "t6"})).await;
    mount_statuses(&server, "bp1", &["t6"], json!([{"id": "t6", "status": "in_progress"}]), None)
        .await;

    let client = Arc::new(connected_client(&server).await);
    let waiting = Arc::clone(&client);
    let call = tokio::spawn(async move {
        waiting.talk_no_output(ApiRequest::post("/api/blueprints/bp1/deploy")).await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    client.stop_task_monitor().await.unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ApiError::MonitorStopped(_)));

    // new deferred calls fail fast once the monitor is gone
    let err = client.talk_no_output(ApiRequest::post("/api/blueprints/bp1/deploy")).await.unwrap_err();
    assert!(matches!(err, ApiError::MonitorUnavailable));
}

#[tokio::test]
async fn test_failed_poll_reaches_error_sink_and_is_retried() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_deferred(&server, "POST", "/api/blueprints/bp1/deploy", json!({"task_id": "t8"})).await;
    Mock::given(method("GET"))
        .and(path("/api/blueprints/bp1/tasks"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_statuses(&server, "bp1", &["t8"], json!([{"id": "t8", "status": "succeeded"}]), None)
        .await;
    mount_detail(&server, "bp1", "t8", json!({"status": "succeeded"})).await;

    let (sink, mut errors) = mpsc::channel::<TaskPollError>(4);
    let client = ApiClient::builder().config(fast_config(&server)).error_sink(sink).build().unwrap();
    client.login().await.unwrap();
    client.start_task_monitor().unwrap();

    client.talk_no_output(ApiRequest::post("/api/blueprints/bp1/deploy")).await.unwrap();

    let poll_error = errors.try_recv().expect("poll failure should be reported");
    assert_eq!(poll_error.tenancy_id.as_str(), "bp1");
    assert!(poll_error.error.should_retry());
    assert_eq!(client.task_metrics().poll_errors, 1);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_expired_session_relogs_in_and_resubmits_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aaa/login"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "second"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/blueprints/bp1"))
        .and(header("AuthToken", "second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "bp1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/blueprints/bp1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(fast_config(&server)).unwrap();
    let blueprint: Value = client.get("/api/blueprints/bp1").await.unwrap();

    assert_eq!(blueprint["id"], "bp1");
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_unauthorized_after_relogin_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aaa/login"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "useless"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/blueprints/bp1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::new(fast_config(&server)).unwrap();
    let err = client.get::<Value>("/api/blueprints/bp1").await.unwrap_err();

    assert_eq!(err.status(), Some(reqwest::StatusCode::UNAUTHORIZED));
}
