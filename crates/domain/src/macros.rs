//! Macro for implementing Display and FromStr for wire status enums
//!
//! Controllers report state as lowercase snake_case strings. The macro keeps
//! the mapping between variants and their wire strings in one place.
//!
//! # Example
//!
//! ```rust
//! use fabric_domain::impl_wire_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum DeployState {
//!     Pending,
//!     InProgress,
//!     Done,
//! }
//!
//! impl_wire_status_conversions!(DeployState {
//!     Pending => "pending",
//!     InProgress => "in_progress",
//!     Done => "done",
//! });
//!
//! assert_eq!("In Progress".parse::<DeployState>(), Ok(DeployState::InProgress));
//! ```

/// Implements Display and FromStr traits for wire status enums
///
/// This macro generates:
/// - Display trait: writes the wire string of the variant
/// - FromStr trait: parses case-insensitively, treating spaces and
///   underscores as equivalent
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their snake_case wire
///   representations
#[macro_export]
macro_rules! impl_wire_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace(' ', "_");
                match normalized.as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
