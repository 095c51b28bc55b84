//! API-specific error types
//!
//! Provides error classification for controller calls, covering both local
//! HTTP failures and failures reported by remote asynchronous tasks.

use std::fmt;
use std::time::Duration;

use fabric_domain::{FabricError, TaskDetail, TaskId, TenancyId};
use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403, rejected credentials)
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth), malformed requests or responses
    Client,
    /// Network/connection errors and timeouts - retryable
    Network,
    /// Configuration and client lifecycle errors - non-retryable
    Config,
    /// Failures reported for, or while tracking, an asynchronous task
    Task,
}

/// A non-2xx response, with enough of the exchange to diagnose it
///
/// Bodies are truncated, and the request body is redacted for endpoints
/// carrying credentials.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub request_body: Option<String>,
    pub response_body: String,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} returned status {}", self.method, self.url, self.status)?;
        if !self.response_body.is_empty() {
            write!(f, ": {}", self.response_body)?;
        }
        Ok(())
    }
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(Box<HttpFailure>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("tenancy mismatch: URL names '{url}' but response names '{body}'")]
    TenancyMismatch { url: TenancyId, body: TenancyId },

    #[error("cannot determine tenancy for task '{0}'")]
    TenancyUnknown(TaskId),

    #[error("task '{0}' is already being tracked")]
    TaskAlreadyTracked(TaskId),

    #[error("task '{0}' is unknown to the server")]
    TaskUnknown(TaskId),

    #[error("task '{task_id}' reported unexpected status '{status}'")]
    TaskUnexpectedStatus { task_id: TaskId, status: String },

    #[error(
        "task '{task_id}' ended with status '{}' (error code {}): {}",
        .detail.status,
        .detail.detailed_status.error_code,
        .detail.detailed_status.errors
    )]
    TaskFailed { task_id: TaskId, detail: Box<TaskDetail> },

    #[error("task monitor is not running")]
    MonitorUnavailable,

    #[error("task monitor stopped before task '{0}' completed")]
    MonitorStopped(TaskId),

    #[error("gave up waiting for task '{task_id}' after {waited:?}")]
    TaskWaitTimeout { task_id: TaskId, waited: Duration },
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::Http(failure) => category_for_status(failure.status),
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Url(_) | Self::Serialization(_) => ApiErrorCategory::Client,
            Self::Config(_) | Self::Cancelled | Self::MonitorUnavailable => {
                ApiErrorCategory::Config
            }
            Self::TenancyMismatch { .. }
            | Self::TenancyUnknown(_)
            | Self::TaskAlreadyTracked(_)
            | Self::TaskUnknown(_)
            | Self::TaskUnexpectedStatus { .. }
            | Self::TaskFailed { .. }
            | Self::MonitorStopped(_)
            | Self::TaskWaitTimeout { .. } => ApiErrorCategory::Task,
        }
    }

    /// Check if this error should be retried by the caller
    ///
    /// Task failures are never retried: resubmitting would start a second
    /// server-side task.
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// HTTP status of the failed exchange, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(failure) => Some(failure.status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Task detail attached to a remote task failure
    pub fn task_detail(&self) -> Option<&TaskDetail> {
        match self {
            Self::TaskFailed { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

fn category_for_status(status: StatusCode) -> ApiErrorCategory {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiErrorCategory::Authentication
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorCategory::RateLimit
    } else if status.is_server_error() {
        ApiErrorCategory::Server
    } else {
        ApiErrorCategory::Client
    }
}

impl From<FabricError> for ApiError {
    fn from(err: FabricError) -> Self {
        match err {
            FabricError::Config(message) | FabricError::InvalidInput(message) => {
                Self::Config(message)
            }
        }
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error / serde_json::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::Url(err.to_string());
        }

        if err.is_timeout() {
            return Self::Network(format!("HTTP request timed out: {err}"));
        }

        if err.is_decode() {
            return Self::Serialization(err.to_string());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if err.is_connect() {
            return Self::Network(format!("HTTP connection failure: {err}"));
        }

        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
