//! # Fabric Infrastructure
//!
//! REST client for a network-fabric controller.
//!
//! This crate contains:
//! - The API client: request dispatch, session login and re-login
//! - Deferred-completion tracking: task monitor and completion waiter
//! - The HTTP transport seam
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Wire and configuration types come from `fabric-domain`
//! - Contains all I/O; one background task per client polls outstanding tasks

pub mod api;
pub mod config;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiClientConfig, ApiError, ApiRequest};
pub use http::{HttpClient, HttpTransport};
