//! Configuration management

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MONITOR_JOIN_TIMEOUT_MS, DEFAULT_TASK_FIRST_CHECK_MS, DEFAULT_TASK_POLL_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    #[serde(default)]
    pub task_monitor: TaskMonitorConfig,
}

/// Controller connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Base URL, e.g. `https://10.0.0.1`
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Request timeout: negative disables it, zero selects the default,
    /// positive is the timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: i64,
    #[serde(default)]
    pub tls_insecure: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ControllerConfig {
    /// Resolve `timeout_ms` into an optional duration
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            ms if ms < 0 => None,
            0 => Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            ms => Some(Duration::from_millis(ms.unsigned_abs())),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            url: "https://127.0.0.1".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_ms: 0,
            tls_insecure: false,
            user_agent: None,
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("tls_insecure", &self.tls_insecure)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Task monitor pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMonitorConfig {
    /// Delay between a registration and the first status check
    #[serde(default = "default_first_check_ms")]
    pub first_check_ms: u64,
    /// Delay between status checks while tasks remain outstanding
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on a caller's wait for completion; zero waits forever
    #[serde(default)]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl TaskMonitorConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}

impl Default for TaskMonitorConfig {
    fn default() -> Self {
        Self {
            first_check_ms: DEFAULT_TASK_FIRST_CHECK_MS,
            poll_interval_ms: DEFAULT_TASK_POLL_INTERVAL_MS,
            wait_timeout_ms: 0,
            join_timeout_ms: DEFAULT_MONITOR_JOIN_TIMEOUT_MS,
        }
    }
}

fn default_first_check_ms() -> u64 {
    DEFAULT_TASK_FIRST_CHECK_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_TASK_POLL_INTERVAL_MS
}

fn default_join_timeout_ms() -> u64 {
    DEFAULT_MONITOR_JOIN_TIMEOUT_MS
}
