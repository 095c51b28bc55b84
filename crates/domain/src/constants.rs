//! Client constants
//!
//! Centralized location for wire-level names and tuning defaults shared by
//! the configuration layer and the infrastructure crate.

// Endpoints
pub const LOGIN_PATH: &str = "/api/aaa/login";
pub const LOGOUT_PATH: &str = "/api/aaa/logout";
pub const TENANCY_PATH_PREFIX: &str = "/api/blueprints/";
pub const TASKS_SEGMENT: &str = "tasks";

// Request shaping
pub const AUTH_HEADER: &str = "AuthToken";
pub const ASYNC_PARAM_KEY: &str = "async";
pub const ASYNC_PARAM_VALUE: &str = "full";
pub const TASK_FILTER_PARAM: &str = "filter";

// Timeouts (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MONITOR_JOIN_TIMEOUT_MS: u64 = 5_000;

// Task monitor pacing (milliseconds)
pub const DEFAULT_TASK_FIRST_CHECK_MS: u64 = 100;
pub const DEFAULT_TASK_POLL_INTERVAL_MS: u64 = 500;
pub const TASK_REGISTRATION_QUEUE: usize = 64;

// Response handling (bytes)
pub const ASYNC_ENVELOPE_PEEK_BYTES: usize = 512;
pub const ERROR_BODY_LIMIT: usize = 1024;
pub const REDACTED_BODY: &str = "<redacted>";
