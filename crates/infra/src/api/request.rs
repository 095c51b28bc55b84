//! Request description for the dispatcher

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::errors::ApiError;

/// One controller call
///
/// `target` is a path joined onto the client's base URL, or an absolute URL
/// used as-is.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub target: String,
    pub(crate) body: Option<Vec<u8>>,
    /// Do not ask for, or recognize, deferred completion
    pub skip_async: bool,
    /// Do not re-authenticate and retry on 401
    pub do_not_login: bool,
    /// Absolute deadline for each HTTP exchange; replaces the client timeout
    pub deadline: Option<Instant>,
    /// Abandons the wait for a deferred task
    pub cancel: Option<CancellationToken>,
}

impl ApiRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            body: None,
            skip_async: false,
            do_not_login: false,
            deadline: None,
            cancel: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn skip_async(mut self) -> Self {
        self.skip_async = true;
        self
    }

    pub fn do_not_login(mut self) -> Self {
        self.do_not_login = true;
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}
