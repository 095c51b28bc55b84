//! Error types used throughout the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main domain error type
///
/// Raised by configuration handling and value validation. Transport and
/// task related failures live in the infrastructure crate's `ApiError`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FabricError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, FabricError>;
