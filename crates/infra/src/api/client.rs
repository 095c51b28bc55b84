//! Controller API client
//!
//! Every call goes through one dispatcher that builds the URL, attaches the
//! session token, enforces the deadline, re-authenticates once on 401 and
//! recognizes deferred-completion responses. Deferred responses are handed to
//! the task monitor and the call returns only once the task has finished.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fabric_domain::constants::{
    ASYNC_PARAM_KEY, ASYNC_PARAM_VALUE, AUTH_HEADER, DEFAULT_TIMEOUT_MS, ERROR_BODY_LIMIT,
    LOGIN_PATH, LOGOUT_PATH, REDACTED_BODY, TASK_FILTER_PARAM,
};
use fabric_domain::{
    Config, LoginRequest, LoginResponse, TaskDetail, TaskId, TaskStatusList, TaskStatusSummary,
    TenancyId,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::envelope;
use super::errors::{ApiError, HttpFailure};
use super::monitor::{MonitorSettings, TaskMonitor, TaskPollError};
use super::request::ApiRequest;
use super::session::Session;
use super::tasks::{task_filter, task_path, tasks_path, TaskQuery};
use super::waiter::{self, WaitOptions};
use crate::http::{HttpClient, HttpTransport};
use crate::observability::metrics::{TaskMonitorMetrics, TaskMonitorSnapshot};

const DEFAULT_USER_AGENT: &str = concat!("fabric-client/", env!("CARGO_PKG_VERSION"));

/// Configuration for API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the controller (e.g., "https://10.0.0.1")
    pub base_url: String,
    pub credentials: LoginRequest,
    /// Per-exchange timeout; `None` disables it
    pub timeout: Option<Duration>,
    /// Skip TLS certificate validation
    pub tls_insecure: bool,
    pub user_agent: Option<String>,
    pub monitor: MonitorSettings,
    /// Upper bound on waiting for a deferred task; `None` waits indefinitely
    pub task_wait_timeout: Option<Duration>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1".to_string(),
            credentials: LoginRequest { username: String::new(), password: String::new() },
            timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            tls_insecure: false,
            user_agent: None,
            monitor: MonitorSettings::default(),
            task_wait_timeout: None,
        }
    }
}

impl ApiClientConfig {
    pub fn from_config(config: &Config) -> Self {
        let controller = &config.controller;
        Self {
            base_url: controller.url.clone(),
            credentials: LoginRequest {
                username: controller.username.clone(),
                password: controller.password.clone(),
            },
            timeout: controller.request_timeout(),
            tls_insecure: controller.tls_insecure,
            user_agent: controller.user_agent.clone(),
            monitor: MonitorSettings::from(&config.task_monitor),
            task_wait_timeout: config.task_monitor.wait_timeout(),
        }
    }
}

/// Controller API client
///
/// Owns the session and, once started, the task monitor. Dropping the client
/// cancels the monitor.
pub struct ApiClient {
    inner: Arc<Dispatcher>,
    config: ApiClientConfig,
    error_sink: Option<mpsc::Sender<TaskPollError>>,
}

impl ApiClient {
    /// Create a new API client backed by a reqwest transport
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or the HTTP client cannot be
    /// built
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        let transport = HttpClient::builder()
            .user_agent(config.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.into()))
            .accept_invalid_certs(config.tls_insecure)
            .build()?;
        Self::with_transport(config, Arc::new(transport), None)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Build a client, log in and start the task monitor.
    pub async fn connect(config: ApiClientConfig) -> Result<Self, ApiError> {
        let client = Self::new(config)?;
        client.login().await?;
        client.start_task_monitor()?;
        Ok(client)
    }

    fn with_transport(
        config: ApiClientConfig,
        http: Arc<dyn HttpTransport>,
        error_sink: Option<mpsc::Sender<TaskPollError>>,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| ApiError::Config(format!("invalid base URL '{}': {err}", config.base_url)))?;

        let inner = Dispatcher {
            http,
            base_url,
            credentials: config.credentials.clone(),
            timeout: config.timeout,
            task_wait_timeout: config.task_wait_timeout,
            session: Session::default(),
            metrics: Arc::new(TaskMonitorMetrics::new()),
        };

        Ok(Self { inner: Arc::new(inner), config, error_sink })
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Authenticate and store the session token
    pub async fn login(&self) -> Result<(), ApiError> {
        self.inner.login(None).await
    }

    /// End the session. A controller that already considers the session
    /// gone (401) counts as success; the local token is cleared either way.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let request = ApiRequest::post(LOGOUT_PATH).skip_async().do_not_login();
        let result = match self.inner.dispatch(&request).await {
            Ok(_) => Ok(()),
            Err(err) if err.status() == Some(StatusCode::UNAUTHORIZED) => {
                debug!("session already expired on controller");
                Ok(())
            }
            Err(err) => Err(err),
        };

        self.inner.session.clear_token();
        info!("logged out of controller");
        result
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    /// Start the background task monitor.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if no runtime is available or a monitor is already
    /// running
    pub fn start_task_monitor(&self) -> Result<(), ApiError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ApiError::Config("task monitor requires a Tokio runtime".to_string()));
        }
        if self.inner.session.is_monitor_running() {
            return Err(ApiError::Config("task monitor already running".to_string()));
        }

        let query: Arc<dyn TaskQuery> = Arc::clone(&self.inner) as Arc<dyn TaskQuery>;
        let monitor = TaskMonitor::new(
            query,
            self.config.monitor,
            self.error_sink.clone(),
            Arc::clone(&self.inner.metrics),
        );
        let (handle, registrations) = monitor.spawn();
        self.inner.session.attach_monitor(handle, registrations)
    }

    /// Stop the task monitor and wait for it to exit.
    ///
    /// Callers still waiting on deferred tasks receive `MonitorStopped`.
    pub async fn stop_task_monitor(&self) -> Result<(), ApiError> {
        let handle = self
            .inner
            .session
            .detach_monitor()
            .ok_or_else(|| ApiError::Config("task monitor not running".to_string()))?;

        info!("stopping task monitor");
        handle.stop().await
    }

    pub fn is_task_monitor_running(&self) -> bool {
        self.inner.session.is_monitor_running()
    }

    pub fn task_metrics(&self) -> TaskMonitorSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Execute a request and decode its result.
    ///
    /// For a deferred response, the result is the task's `api_response`.
    /// Empty results (204/205, empty body, absent `api_response`) decode
    /// from JSON `null`, so `()` and `Option<_>` accept them.
    pub async fn talk<O: DeserializeOwned>(&self, request: ApiRequest) -> Result<O, ApiError> {
        self.inner.call(&request).await
    }

    /// Execute a request whose result is not needed.
    ///
    /// Deferred tasks are still waited for.
    pub async fn talk_no_output(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.inner.dispatch(&request).await.map(|_| ())
    }

    pub async fn get<O: DeserializeOwned>(&self, path: &str) -> Result<O, ApiError> {
        self.talk(ApiRequest::get(path)).await
    }

    pub async fn post<I, O>(&self, path: &str, body: &I) -> Result<O, ApiError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.talk(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<I, O>(&self, path: &str, body: &I) -> Result<O, ApiError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.talk(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<I, O>(&self, path: &str, body: &I) -> Result<O, ApiError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.talk(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.talk_no_output(ApiRequest::delete(path)).await
    }

    /// Full record of one task
    pub async fn get_task_detail(
        &self,
        tenancy_id: &TenancyId,
        task_id: &TaskId,
    ) -> Result<TaskDetail, ApiError> {
        self.inner.task_detail(tenancy_id, task_id).await
    }

    /// Statuses of the given tasks in one request
    pub async fn list_task_statuses(
        &self,
        tenancy_id: &TenancyId,
        task_ids: &[TaskId],
    ) -> Result<Vec<TaskStatusSummary>, ApiError> {
        self.inner.task_statuses(tenancy_id, task_ids).await
    }
}

impl Drop for ApiClient {
    fn drop(&mut self) {
        // the monitor task holds the dispatcher, so it has to be told to exit
        if let Some(handle) = self.inner.session.detach_monitor() {
            if !handle.is_finished() {
                warn!("ApiClient dropped while task monitor running; cancelling");
            }
            handle.cancel();
        }
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    error_sink: Option<mpsc::Sender<TaskPollError>>,
}

impl ApiClientBuilder {
    /// Set the API configuration
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default reqwest transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Receive failed status polls instead of having them only logged
    pub fn error_sink(mut self, sink: mpsc::Sender<TaskPollError>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is missing or invalid
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.ok_or_else(|| ApiError::Config("Config not set".to_string()))?;

        match self.transport {
            Some(transport) => ApiClient::with_transport(config, transport, self.error_sink),
            None => {
                let mut client = ApiClient::new(config)?;
                client.error_sink = self.error_sink;
                Ok(client)
            }
        }
    }
}

struct RawResponse {
    status: StatusCode,
    body: Vec<u8>,
}

/// What a dispatched call produced
enum Payload {
    Direct(RawResponse),
    Task(TaskDetail),
}

/// Shared core of a client; also the monitor's [`TaskQuery`]
pub(crate) struct Dispatcher {
    http: Arc<dyn HttpTransport>,
    base_url: Url,
    credentials: LoginRequest,
    timeout: Option<Duration>,
    task_wait_timeout: Option<Duration>,
    session: Session,
    metrics: Arc<TaskMonitorMetrics>,
}

impl Dispatcher {
    async fn call<O: DeserializeOwned>(&self, request: &ApiRequest) -> Result<O, ApiError> {
        let payload = self.dispatch(request).await?;
        decode(payload)
    }

    #[instrument(skip(self, request), fields(method = %request.method, target = %request.target))]
    async fn dispatch(&self, request: &ApiRequest) -> Result<Payload, ApiError> {
        let url = self.build_url(&request.target, request.skip_async)?;
        let deadline = request.deadline.or_else(|| self.timeout.map(|t| Instant::now() + t));

        let mut response = self.send_once(request, &url, deadline).await?;

        if response.status == StatusCode::UNAUTHORIZED
            && !request.do_not_login
            && !is_login_url(&url)
        {
            warn!(url = %url, "request unauthorized; re-authenticating once");
            self.login(deadline).await?;
            response = self.send_once(request, &url, deadline).await?;
        }

        if !response.status.is_success() {
            return Err(status_error(request, &url, &response));
        }

        if request.skip_async {
            return Ok(Payload::Direct(response));
        }
        let Some(envelope) = envelope::sniff(&response.body) else {
            return Ok(Payload::Direct(response));
        };

        let tenancy_id = envelope::resolve_tenancy(&url, &envelope)?;
        debug!(%tenancy_id, task_id = %envelope.task_id, "response deferred to task");

        let registrations = self.session.registrations().ok_or(ApiError::MonitorUnavailable)?;
        let options = WaitOptions { timeout: self.task_wait_timeout, cancel: request.cancel.clone() };
        let detail =
            waiter::wait_for_completion(&registrations, tenancy_id, envelope.task_id, &options)
                .await?;

        Ok(Payload::Task(detail))
    }

    /// Resolve `target` against the base URL and mark it for deferred
    /// completion unless `skip_async` is set.
    fn build_url(&self, target: &str, skip_async: bool) -> Result<Url, ApiError> {
        let mut url = match Url::parse(target) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(target)
                .map_err(|err| ApiError::Url(format!("cannot resolve '{target}': {err}")))?,
            Err(err) => return Err(ApiError::Url(format!("invalid target '{target}': {err}"))),
        };

        if !skip_async {
            url.query_pairs_mut().append_pair(ASYNC_PARAM_KEY, ASYNC_PARAM_VALUE);
        }
        Ok(url)
    }

    /// One HTTP exchange, bounded by `deadline`. Never retries.
    async fn send_once(
        &self,
        request: &ApiRequest,
        url: &Url,
        deadline: Option<Instant>,
    ) -> Result<RawResponse, ApiError> {
        let mut builder =
            self.http.request(request.method.clone(), url.clone()).header(ACCEPT, "application/json");

        if !is_login_url(url) {
            if let Some(token) = self.session.token() {
                builder = builder.header(AUTH_HEADER, token);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body.clone());
        }

        let exchange = async {
            let response = self.http.execute(builder.build()?).await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<_, ApiError>(RawResponse { status, body })
        };

        match deadline {
            Some(deadline) => {
                let budget = deadline.saturating_duration_since(Instant::now());
                tokio::time::timeout_at(deadline, exchange)
                    .await
                    .map_err(|_| ApiError::Timeout(budget))?
            }
            None => exchange.await,
        }
    }

    /// Post credentials and store the returned token.
    ///
    /// Uses the single-exchange path directly, so a 401 here never triggers
    /// another login.
    #[instrument(skip(self))]
    async fn login(&self, deadline: Option<Instant>) -> Result<(), ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(&self.credentials)?.skip_async().do_not_login();
        let url = self.build_url(&request.target, true)?;
        let deadline = deadline.or_else(|| self.timeout.map(|t| Instant::now() + t));

        let response = self.send_once(&request, &url, deadline).await?;
        if !response.status.is_success() {
            return Err(status_error(&request, &url, &response));
        }

        let login: LoginResponse = serde_json::from_slice(&response.body)?;
        self.session.set_token(login.token);
        info!(username = %self.credentials.username, "authenticated with controller");
        Ok(())
    }
}

#[async_trait]
impl TaskQuery for Dispatcher {
    async fn task_statuses(
        &self,
        tenancy_id: &TenancyId,
        task_ids: &[TaskId],
    ) -> Result<Vec<TaskStatusSummary>, ApiError> {
        let mut url = self.build_url(&tasks_path(tenancy_id), true)?;
        url.query_pairs_mut().append_pair(TASK_FILTER_PARAM, &task_filter(task_ids));

        let list: TaskStatusList = self.call(&ApiRequest::get(url.as_str()).skip_async()).await?;
        Ok(list.items)
    }

    async fn task_detail(
        &self,
        tenancy_id: &TenancyId,
        task_id: &TaskId,
    ) -> Result<TaskDetail, ApiError> {
        self.call(&ApiRequest::get(task_path(tenancy_id, task_id)).skip_async()).await
    }
}

fn decode<O: DeserializeOwned>(payload: Payload) -> Result<O, ApiError> {
    match payload {
        Payload::Task(detail) => Ok(serde_json::from_value(detail.api_response().clone())?),
        Payload::Direct(response) => {
            let no_content = response.status == StatusCode::NO_CONTENT
                || response.status == StatusCode::RESET_CONTENT
                || response.body.is_empty();
            if no_content {
                return serde_json::from_value(serde_json::Value::Null).map_err(|err| {
                    ApiError::Serialization(format!(
                        "{} response has no body to decode: {err}",
                        response.status
                    ))
                });
            }
            Ok(serde_json::from_slice(&response.body)?)
        }
    }
}

fn is_login_url(url: &Url) -> bool {
    url.path().trim_end_matches('/') == LOGIN_PATH
}

fn status_error(request: &ApiRequest, url: &Url, response: &RawResponse) -> ApiError {
    let credentials = is_login_url(url);
    if credentials && response.status == StatusCode::UNAUTHORIZED {
        return ApiError::Auth("bad credentials".to_string());
    }

    let request_body = request.body.as_ref().map(|body| {
        if credentials {
            REDACTED_BODY.to_string()
        } else {
            truncate_body(body)
        }
    });

    ApiError::Http(Box::new(HttpFailure {
        method: request.method.clone(),
        url: url.to_string(),
        status: response.status,
        request_body,
        response_body: truncate_body(&response.body),
    }))
}

fn truncate_body(body: &[u8]) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return String::from_utf8_lossy(body).into_owned();
    }
    format!("{}...", String::from_utf8_lossy(&body[..ERROR_BODY_LIMIT]))
}
