//! Task status queries
//!
//! [`TaskQuery`] is the seam between the task monitor and the dispatcher:
//! the monitor only needs batched status checks and single detail reads,
//! which the client implements over plain HTTP.

use async_trait::async_trait;
use fabric_domain::constants::{TASKS_SEGMENT, TENANCY_PATH_PREFIX};
use fabric_domain::{TaskDetail, TaskId, TaskStatusSummary, TenancyId};

use super::errors::ApiError;

/// Reads of server-side task state
#[async_trait]
pub trait TaskQuery: Send + Sync {
    /// Statuses of `task_ids` within `tenancy_id`, in one request.
    ///
    /// Tasks the server does not know are absent from the result.
    async fn task_statuses(
        &self,
        tenancy_id: &TenancyId,
        task_ids: &[TaskId],
    ) -> Result<Vec<TaskStatusSummary>, ApiError>;

    /// Full record of a single task
    async fn task_detail(
        &self,
        tenancy_id: &TenancyId,
        task_id: &TaskId,
    ) -> Result<TaskDetail, ApiError>;
}

/// `/api/blueprints/<tenancy>/tasks`
pub fn tasks_path(tenancy_id: &TenancyId) -> String {
    format!("{TENANCY_PATH_PREFIX}{tenancy_id}/{TASKS_SEGMENT}")
}

/// `/api/blueprints/<tenancy>/tasks/<task>`
pub fn task_path(tenancy_id: &TenancyId, task_id: &TaskId) -> String {
    format!("{}/{task_id}", tasks_path(tenancy_id))
}

/// Server-side filter selecting the given task ids: `id in ['a','b']`
pub fn task_filter(task_ids: &[TaskId]) -> String {
    let quoted: Vec<String> = task_ids.iter().map(|id| format!("'{id}'")).collect();
    format!("id in [{}]", quoted.join(","))
}
