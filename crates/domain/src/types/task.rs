//! Asynchronous task model
//!
//! Types describing controller-side tasks: identifiers, the status state
//! machine, the batched status listing and the per-task detail record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::impl_wire_status_conversions;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a server-side asynchronous task
    TaskId
);

string_id!(
    /// Identifier of the tenancy (blueprint) a task belongs to
    TenancyId
);

/// Task lifecycle as reported by the controller
///
/// `Init` and `InProgress` are transient; the other states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Init,
    InProgress,
    Succeeded,
    Failed,
    Timeout,
}

impl_wire_status_conversions!(TaskStatus {
    Init => "init",
    InProgress => "in_progress",
    Succeeded => "succeeded",
    Failed => "failed",
    Timeout => "timeout",
});

impl TaskStatus {
    /// Whether the controller will not change this status anymore
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Timeout)
    }
}

/// One entry of a batched task status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusSummary {
    pub id: TaskId,
    pub status: String,
}

impl TaskStatusSummary {
    /// Parse the raw status string; the raw value is returned on failure.
    pub fn parsed_status(&self) -> Result<TaskStatus, String> {
        TaskStatus::from_str(&self.status).map_err(|_| self.status.clone())
    }
}

/// Response body of `GET <tenancy>/tasks?filter=...`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatusList {
    #[serde(default)]
    pub items: Vec<TaskStatusSummary>,
}

/// Outcome payload nested in a task detail record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedStatus {
    /// Response the synchronous form of the call would have produced
    #[serde(default)]
    pub api_response: Option<Value>,
    #[serde(default)]
    pub errors: Value,
    #[serde(default)]
    pub error_code: i64,
}

/// Response body of `GET <tenancy>/tasks/<task-id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub status: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detailed_status: DetailedStatus,
}

impl TaskDetail {
    pub fn parsed_status(&self) -> Result<TaskStatus, String> {
        TaskStatus::from_str(&self.status).map_err(|_| self.status.clone())
    }

    /// True when the controller reported errors or a non-zero error code.
    ///
    /// A `failed` or `timeout` status without any error payload also counts,
    /// otherwise such a task would look like a success to the caller.
    pub fn has_business_error(&self) -> bool {
        !is_empty_json(&self.detailed_status.errors)
            || self.detailed_status.error_code != 0
            || matches!(self.parsed_status(), Ok(TaskStatus::Failed | TaskStatus::Timeout))
    }

    /// The deferred API response, `null` when the task produced none
    pub fn api_response(&self) -> &Value {
        self.detailed_status.api_response.as_ref().unwrap_or(&Value::Null)
    }
}

/// `null`, `""`, `[]` and `{}` carry no error information.
pub fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Body returned in place of a result when the controller defers the work
///
/// `id` is the tenancy the task was created in, when the controller reports
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncEnvelope {
    #[serde(default)]
    pub id: Option<TenancyId>,
    pub task_id: TaskId,
}
