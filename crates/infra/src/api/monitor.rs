//! Task monitor
//!
//! A single background task owning every outstanding task registration.
//! Registrations arrive over a channel; on each timer tick the monitor asks
//! the controller for the status of all outstanding tasks, one batched query
//! per tenancy, and delivers exactly one result to each task's waiter once
//! the task reaches a terminal state.
//!
//! All bookkeeping lives inside the loop, so none of it is shared or locked.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use fabric_domain::constants::{
    DEFAULT_MONITOR_JOIN_TIMEOUT_MS, DEFAULT_TASK_FIRST_CHECK_MS, DEFAULT_TASK_POLL_INTERVAL_MS,
    TASK_REGISTRATION_QUEUE,
};
use fabric_domain::{TaskDetail, TaskId, TaskMonitorConfig, TaskStatusSummary, TenancyId};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use super::errors::ApiError;
use super::tasks::TaskQuery;
use super::waiter::{CompletionResult, PendingRegistration};
use crate::observability::metrics::TaskMonitorMetrics;

/// Monitor pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Delay between a registration and the first status check
    pub first_check_delay: Duration,
    /// Delay between checks while tasks remain outstanding
    pub poll_interval: Duration,
    /// How long `stop` waits for the loop to exit
    pub join_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            first_check_delay: Duration::from_millis(DEFAULT_TASK_FIRST_CHECK_MS),
            poll_interval: Duration::from_millis(DEFAULT_TASK_POLL_INTERVAL_MS),
            join_timeout: Duration::from_millis(DEFAULT_MONITOR_JOIN_TIMEOUT_MS),
        }
    }
}

impl From<&TaskMonitorConfig> for MonitorSettings {
    fn from(config: &TaskMonitorConfig) -> Self {
        Self {
            first_check_delay: Duration::from_millis(config.first_check_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            join_timeout: Duration::from_millis(config.join_timeout_ms),
        }
    }
}

/// A batch status query that failed
///
/// The affected tasks stay tracked and are retried on the next tick.
#[derive(Debug)]
pub struct TaskPollError {
    pub tenancy_id: TenancyId,
    pub task_ids: Vec<TaskId>,
    pub error: ApiError,
}

#[derive(Debug)]
struct TrackedTask {
    tenancy_id: TenancyId,
    reply: oneshot::Sender<CompletionResult>,
}

/// Owner-side handle to a running monitor
///
/// Dropping the handle cancels the monitor without waiting for it.
#[derive(Debug)]
pub struct TaskMonitorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    join_timeout: Duration,
    _guard: DropGuard,
}

impl TaskMonitorHandle {
    /// Request shutdown without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the monitor and wait, bounded by the join timeout, for it to exit.
    ///
    /// Waiters of tasks still outstanding receive `MonitorStopped`.
    pub async fn stop(self) -> Result<(), ApiError> {
        let Self { cancel, join, join_timeout, _guard } = self;
        cancel.cancel();

        match tokio::time::timeout(join_timeout, join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                warn!(error = %err, "task monitor panicked");
                Err(ApiError::Config(format!("task monitor panicked: {err}")))
            }
            Err(_) => {
                warn!(timeout = ?join_timeout, "task monitor did not stop within timeout");
                Err(ApiError::Config(format!(
                    "task monitor did not stop within {join_timeout:?}"
                )))
            }
        }
    }
}

pub(crate) struct TaskMonitor {
    query: Arc<dyn TaskQuery>,
    settings: MonitorSettings,
    error_sink: Option<mpsc::Sender<TaskPollError>>,
    metrics: Arc<TaskMonitorMetrics>,
    groups: BTreeMap<TenancyId, BTreeSet<TaskId>>,
    tracked: HashMap<TaskId, TrackedTask>,
    next_poll: Option<Instant>,
}

impl TaskMonitor {
    pub(crate) fn new(
        query: Arc<dyn TaskQuery>,
        settings: MonitorSettings,
        error_sink: Option<mpsc::Sender<TaskPollError>>,
        metrics: Arc<TaskMonitorMetrics>,
    ) -> Self {
        Self {
            query,
            settings,
            error_sink,
            metrics,
            groups: BTreeMap::new(),
            tracked: HashMap::new(),
            next_poll: None,
        }
    }

    /// Start the monitor loop on the current runtime.
    ///
    /// Returns the owner handle and the sender waiters register through.
    pub(crate) fn spawn(self) -> (TaskMonitorHandle, mpsc::Sender<PendingRegistration>) {
        let (sender, registrations) = mpsc::channel(TASK_REGISTRATION_QUEUE);
        let cancel = CancellationToken::new();
        let join_timeout = self.settings.join_timeout;

        let loop_cancel = cancel.clone();
        let join = tokio::spawn(async move { self.run(registrations, loop_cancel).await });

        let handle = TaskMonitorHandle {
            _guard: cancel.clone().drop_guard(),
            cancel,
            join,
            join_timeout,
        };
        (handle, sender)
    }

    async fn run(
        mut self,
        mut registrations: mpsc::Receiver<PendingRegistration>,
        cancel: CancellationToken,
    ) {
        info!(
            first_check = ?self.settings.first_check_delay,
            poll_interval = ?self.settings.poll_interval,
            "task monitor started"
        );
        let mut accepting = true;

        loop {
            if !accepting && self.tracked.is_empty() {
                debug!("registration channel closed and nothing outstanding");
                break;
            }

            let poll_at = self.next_poll;
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                // a due poll goes ahead of queued registrations
                _ = tokio::time::sleep_until(poll_at.unwrap_or_else(Instant::now)),
                    if poll_at.is_some() =>
                {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = self.reconcile() => {}
                    }
                }

                registration = registrations.recv(), if accepting => match registration {
                    Some(registration) => self.register(registration),
                    None => accepting = false,
                },
            }
        }

        if !self.tracked.is_empty() {
            warn!(outstanding = self.tracked.len(), "task monitor stopping with tasks outstanding");
            self.metrics.record_abandoned(self.tracked.len());
        }
        info!("task monitor stopped");
    }

    /// Start tracking a task, or reject it if the id is already tracked.
    fn register(&mut self, registration: PendingRegistration) {
        let PendingRegistration { tenancy_id, task_id, reply } = registration;
        self.metrics.record_registration();

        if self.tracked.contains_key(&task_id) {
            warn!(%tenancy_id, %task_id, "duplicate task registration rejected");
            self.metrics.record_duplicate();
            let _ = reply.send(Err(ApiError::TaskAlreadyTracked(task_id)));
            return;
        }

        debug!(%tenancy_id, %task_id, "tracking task");
        self.groups.entry(tenancy_id.clone()).or_default().insert(task_id.clone());
        self.tracked.insert(task_id, TrackedTask { tenancy_id, reply });

        // keep the earlier of an armed check and the new task's first check
        let first_check = Instant::now() + self.settings.first_check_delay;
        self.next_poll = Some(self.next_poll.map_or(first_check, |at| at.min(first_check)));
    }

    /// One polling pass over every tenancy with outstanding tasks.
    async fn reconcile(&mut self) {
        self.metrics.record_poll();

        let batches: Vec<(TenancyId, Vec<TaskId>)> = self
            .groups
            .iter()
            .map(|(tenancy_id, ids)| (tenancy_id.clone(), ids.iter().cloned().collect()))
            .collect();
        trace!(tenancies = batches.len(), "polling task statuses");

        let query = &self.query;
        let responses = join_all(batches.into_iter().map(|(tenancy_id, task_ids)| async move {
            let result = query.task_statuses(&tenancy_id, &task_ids).await;
            (tenancy_id, task_ids, result)
        }))
        .await;

        for (tenancy_id, task_ids, result) in responses {
            match result {
                Ok(statuses) => self.apply_statuses(&tenancy_id, &task_ids, statuses).await,
                Err(error) => self.report_poll_error(tenancy_id, task_ids, error),
            }
        }

        self.groups.retain(|_, ids| !ids.is_empty());
        self.next_poll =
            (!self.groups.is_empty()).then(|| Instant::now() + self.settings.poll_interval);
    }

    async fn apply_statuses(
        &mut self,
        tenancy_id: &TenancyId,
        task_ids: &[TaskId],
        statuses: Vec<TaskStatusSummary>,
    ) {
        let statuses: HashMap<TaskId, TaskStatusSummary> =
            statuses.into_iter().map(|summary| (summary.id.clone(), summary)).collect();

        for task_id in task_ids {
            let Some(summary) = statuses.get(task_id) else {
                self.resolve(task_id, Err(ApiError::TaskUnknown(task_id.clone())));
                continue;
            };

            match summary.parsed_status() {
                Ok(status) if !status.is_terminal() => {
                    trace!(%tenancy_id, %task_id, %status, "task still running");
                }
                Ok(status) => {
                    debug!(%tenancy_id, %task_id, %status, "task reached terminal state");
                    let result = self.fetch_completion(tenancy_id, task_id).await;
                    self.resolve(task_id, result);
                }
                Err(status) => {
                    let error = ApiError::TaskUnexpectedStatus { task_id: task_id.clone(), status };
                    self.resolve(task_id, Err(error));
                }
            }
        }
    }

    async fn fetch_completion(&self, tenancy_id: &TenancyId, task_id: &TaskId) -> CompletionResult {
        let detail = self.query.task_detail(tenancy_id, task_id).await?;
        completion_from_detail(task_id, detail)
    }

    /// Deliver the single result for `task_id` and stop tracking it.
    fn resolve(&mut self, task_id: &TaskId, result: CompletionResult) {
        let Some(task) = self.tracked.remove(task_id) else {
            return;
        };
        if let Some(group) = self.groups.get_mut(&task.tenancy_id) {
            group.remove(task_id);
        }

        self.metrics.record_resolution(&result);
        match &result {
            Ok(_) => debug!(tenancy_id = %task.tenancy_id, %task_id, "task completed"),
            Err(error) => {
                debug!(tenancy_id = %task.tenancy_id, %task_id, error = %error, "task failed")
            }
        }

        if task.reply.send(result).is_err() {
            debug!(%task_id, "waiter gone before task completed; result discarded");
        }
    }

    fn report_poll_error(&self, tenancy_id: TenancyId, task_ids: Vec<TaskId>, error: ApiError) {
        self.metrics.record_poll_error();
        let Some(sink) = &self.error_sink else {
            warn!(%tenancy_id, tasks = task_ids.len(), error = %error, "task status poll failed");
            return;
        };

        if let Err(err) = sink.try_send(TaskPollError { tenancy_id, task_ids, error }) {
            let dropped = match err {
                mpsc::error::TrySendError::Full(dropped) | mpsc::error::TrySendError::Closed(dropped) => {
                    dropped
                }
            };
            warn!(
                tenancy_id = %dropped.tenancy_id,
                error = %dropped.error,
                "task status poll failed; error sink unavailable"
            );
        }
    }

    #[cfg(test)]
    fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    #[cfg(test)]
    fn tenancy_count(&self) -> usize {
        self.groups.len()
    }
}

/// Turn a terminal task record into the waiter's result.
///
/// A task that reports errors, a non-zero error code or a failed/timed-out
/// status is a remote failure; otherwise its detail is the result.
pub(crate) fn completion_from_detail(task_id: &TaskId, detail: TaskDetail) -> CompletionResult {
    if detail.has_business_error() {
        return Err(ApiError::TaskFailed { task_id: task_id.clone(), detail: Box::new(detail) });
    }
    Ok(detail)
}
