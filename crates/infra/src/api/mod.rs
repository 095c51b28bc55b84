//! Controller API client
//!
//! - [`client`]: request dispatch, authentication and the public client
//! - [`envelope`]: recognition of deferred-completion responses
//! - [`monitor`]: background tracking of outstanding server-side tasks
//! - [`waiter`]: blocking a caller until its task completes
//! - [`tasks`]: task status queries used by the monitor

pub mod client;
pub mod envelope;
pub mod errors;
pub mod monitor;
pub mod request;
mod session;
pub mod tasks;
pub mod waiter;

pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig};
pub use errors::{ApiError, ApiErrorCategory, HttpFailure};
pub use monitor::{MonitorSettings, TaskMonitorHandle, TaskPollError};
pub use request::ApiRequest;
pub use tasks::TaskQuery;
pub use waiter::{CompletionResult, WaitOptions};
