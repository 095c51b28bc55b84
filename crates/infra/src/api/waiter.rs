//! Completion waiter
//!
//! Registers one deferred task with the task monitor and waits for its
//! single result.

use std::time::Duration;

use fabric_domain::{TaskDetail, TaskId, TenancyId};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::errors::ApiError;

/// Result delivered exactly once per registered task
pub type CompletionResult = Result<TaskDetail, ApiError>;

/// A request to track one task, consumed exactly once by the monitor
#[derive(Debug)]
pub struct PendingRegistration {
    pub tenancy_id: TenancyId,
    pub task_id: TaskId,
    pub reply: oneshot::Sender<CompletionResult>,
}

/// Bounds on a caller's wait, independent of the HTTP timeouts used while
/// polling
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Give up after this long; `None` waits until the monitor answers
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// Register `task_id` with the monitor and wait for its completion.
///
/// Cancellation and the wait timeout apply from the start, including while the
/// registration queue is full. Giving up after registration does not untrack
/// the task; the monitor still resolves it and the late result is discarded.
pub async fn wait_for_completion(
    registrations: &mpsc::Sender<PendingRegistration>,
    tenancy_id: TenancyId,
    task_id: TaskId,
    options: &WaitOptions,
) -> CompletionResult {
    let (reply, receiver) = oneshot::channel();
    let registration = PendingRegistration { tenancy_id, task_id: task_id.clone(), reply };

    // the wait bound covers time spent queueing behind a busy monitor
    let started = Instant::now();
    let cancel = options.cancel.clone().unwrap_or_default();
    let give_up = async {
        match options.timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    let completion = async {
        registrations.send(registration).await.map_err(|_| ApiError::MonitorUnavailable)?;
        debug!(%task_id, "waiting for task completion");
        receiver.await.unwrap_or_else(|_| Err(ApiError::MonitorStopped(task_id.clone())))
    };

    tokio::select! {
        result = completion => result,
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        _ = give_up => {
            Err(ApiError::TaskWaitTimeout { task_id: task_id.clone(), waited: started.elapsed() })
        }
    }
}
