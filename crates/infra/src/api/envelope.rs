//! Recognition of deferred-completion responses
//!
//! The controller signals deferred completion only through the shape of a
//! 2xx body: a small JSON object carrying a non-empty `task_id`. There is no
//! dedicated status code. This module is a compatibility shim for that wire
//! behavior; a resource that legitimately contains a `task_id` field and fits
//! under the peek limit is indistinguishable from a task reference.

use fabric_domain::constants::{ASYNC_ENVELOPE_PEEK_BYTES, TENANCY_PATH_PREFIX};
use fabric_domain::{AsyncEnvelope, TenancyId};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::errors::ApiError;

static TENANCY_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{}([^/]+)", regex::escape(TENANCY_PATH_PREFIX)))
        .expect("TENANCY_PATH should compile - this is a bug")
});

/// Test whether a response body is an asynchronous task reference.
///
/// Only bodies that fit in the peek window are considered.
pub fn sniff(body: &[u8]) -> Option<AsyncEnvelope> {
    if body.is_empty() || body.len() > ASYNC_ENVELOPE_PEEK_BYTES {
        return None;
    }

    let envelope: AsyncEnvelope = serde_json::from_slice(body).ok()?;
    if envelope.task_id.is_empty() {
        return None;
    }
    Some(envelope)
}

/// Extract the tenancy id embedded in a URL path, if any.
pub fn tenancy_from_url(url: &Url) -> Option<TenancyId> {
    TENANCY_PATH
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| TenancyId::from(m.as_str()))
}

/// Decide which tenancy a deferred task belongs to.
///
/// The URL wins; the body is the fallback. Both present and different is an
/// error.
pub fn resolve_tenancy(url: &Url, envelope: &AsyncEnvelope) -> Result<TenancyId, ApiError> {
    let from_url = tenancy_from_url(url);
    let from_body = envelope.id.clone().filter(|id| !id.is_empty());

    match (from_url, from_body) {
        (Some(url_id), Some(body_id)) if url_id != body_id => {
            Err(ApiError::TenancyMismatch { url: url_id, body: body_id })
        }
        (Some(url_id), _) => Ok(url_id),
        (None, Some(body_id)) => Ok(body_id),
        (None, None) => Err(ApiError::TenancyUnknown(envelope.task_id.clone())),
    }
}
