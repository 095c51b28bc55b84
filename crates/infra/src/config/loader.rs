//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `FABRIC_URL`: Controller base URL (required)
//! - `FABRIC_USER`: Login user name (required)
//! - `FABRIC_PASS`: Login password (required)
//! - `FABRIC_TIMEOUT_MS`: Request timeout; negative disables, zero selects
//!   the default
//! - `FABRIC_TLS_INSECURE`: Skip certificate validation (true/false)
//! - `FABRIC_USER_AGENT`: User-Agent header override
//! - `FABRIC_TASK_FIRST_CHECK_MS`: Delay before a new task's first check
//! - `FABRIC_TASK_POLL_INTERVAL_MS`: Delay between task checks
//! - `FABRIC_TASK_WAIT_TIMEOUT_MS`: Upper bound on waiting for a task; zero
//!   waits forever
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./fabric.json` or `./fabric.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use fabric_domain::{Config, ControllerConfig, FabricError, Result, TaskMonitorConfig};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FabricError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
///
/// Returns `FabricError::InvalidInput` if a value is out of range.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `FABRIC_URL`, `FABRIC_USER` and `FABRIC_PASS` must be present; the rest
/// fall back to their defaults.
///
/// # Errors
/// Returns `FabricError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let url = env_var("FABRIC_URL")?;
    let username = env_var("FABRIC_USER")?;
    let password = env_var("FABRIC_PASS")?;

    let defaults = TaskMonitorConfig::default();
    let config = Config {
        controller: ControllerConfig {
            url,
            username,
            password,
            timeout_ms: env_parse("FABRIC_TIMEOUT_MS", 0)?,
            tls_insecure: env_bool("FABRIC_TLS_INSECURE", false),
            user_agent: std::env::var("FABRIC_USER_AGENT").ok(),
        },
        task_monitor: TaskMonitorConfig {
            first_check_ms: env_parse("FABRIC_TASK_FIRST_CHECK_MS", defaults.first_check_ms)?,
            poll_interval_ms: env_parse(
                "FABRIC_TASK_POLL_INTERVAL_MS",
                defaults.poll_interval_ms,
            )?,
            wait_timeout_ms: env_parse("FABRIC_TASK_WAIT_TIMEOUT_MS", defaults.wait_timeout_ms)?,
            join_timeout_ms: defaults.join_timeout_ms,
        },
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `FabricError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
///
/// Returns `FabricError::InvalidInput` if a value is out of range.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FabricError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FabricError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FabricError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FabricError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FabricError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(FabricError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Reject settings the client cannot run with
fn validate(config: &Config) -> Result<()> {
    let url = config.controller.url.trim();
    if url.is_empty() {
        return Err(FabricError::Config("Controller URL must not be empty".to_string()));
    }
    url::Url::parse(url)
        .map_err(|e| FabricError::Config(format!("Invalid controller URL '{}': {}", url, e)))?;

    if config.task_monitor.poll_interval_ms == 0 {
        return Err(FabricError::InvalidInput("Task poll interval must be positive".to_string()));
    }
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its parent, and the executable's
/// directory.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "fabric.json", "fabric.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        FabricError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional numeric environment variable
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| FabricError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
