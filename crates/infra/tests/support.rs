//! Shared fixtures for controller integration tests.

use std::time::Duration;

use fabric_domain::LoginRequest;
use fabric_infra::api::{ApiClientConfig, MonitorSettings};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "admin";

/// Route tracing output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Client configuration pointing at `server`, with fast monitor pacing.
pub fn fast_config(server: &MockServer) -> ApiClientConfig {
    ApiClientConfig {
        base_url: server.uri(),
        credentials: LoginRequest { username: USERNAME.into(), password: PASSWORD.into() },
        timeout: Some(Duration::from_secs(5)),
        monitor: MonitorSettings {
            first_check_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(20),
            join_timeout: Duration::from_secs(2),
        },
        ..Default::default()
    }
}

pub async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/aaa/login"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": token, "id": "u1"})))
        .mount(server)
        .await;
}

/// Answer the batched status query for exactly `task_ids`, at most `times`
/// times when given.
pub async fn mount_statuses(
    server: &MockServer,
    tenancy: &str,
    task_ids: &[&str],
    items: Value,
    times: Option<u64>,
) {
    let quoted: Vec<String> = task_ids.iter().map(|id| format!("'{id}'")).collect();
    let filter = format!("id in [{}]", quoted.join(","));

    let mock = Mock::given(method("GET"))
        .and(path(format!("/api/blueprints/{tenancy}/tasks")))
        .and(query_param("filter", filter.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": items})));

    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

pub async fn mount_detail(server: &MockServer, tenancy: &str, task_id: &str, detail: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/blueprints/{tenancy}/tasks/{task_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail))
        .mount(server)
        .await;
}

/// Respond to `verb path` with a deferred-completion envelope.
pub async fn mount_deferred(server: &MockServer, verb: &str, route: &str, envelope: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(202).set_body_json(envelope))
        .mount(server)
        .await;
}
