//! # Fabric Domain
//!
//! Domain types and models for the controller client.
//!
//! This crate contains:
//! - Task identifiers, the task status model and task wire types
//! - Login wire types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Wire constants and tuning defaults
//!
//! ## Architecture
//! - No dependencies on other workspace crates
//! - No I/O; pure data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
