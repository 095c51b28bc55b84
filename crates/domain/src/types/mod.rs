//! Domain types and wire models

pub mod auth;
pub mod task;

pub use auth::{LoginRequest, LoginResponse};
pub use task::{
    is_empty_json, AsyncEnvelope, DetailedStatus, TaskDetail, TaskId, TaskStatus,
    TaskStatusList, TaskStatusSummary, TenancyId,
};
