//! Task monitor metrics
//!
//! Lock-free counters describing registration and resolution traffic through
//! the task monitor. Counters are independent, so `Relaxed` ordering is
//! sufficient; a snapshot is not an atomic cut across all of them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::api::errors::ApiError;
use crate::api::waiter::CompletionResult;

/// Counters shared between the client and its task monitor
#[derive(Debug, Default)]
pub struct TaskMonitorMetrics {
    registrations: AtomicU64,
    duplicates: AtomicU64,
    polls: AtomicU64,
    poll_errors: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    unknown: AtomicU64,
    unexpected_status: AtomicU64,
    abandoned: AtomicU64,
}

/// Point-in-time copy of [`TaskMonitorMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskMonitorSnapshot {
    pub registrations: u64,
    pub duplicates: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub unknown: u64,
    pub unexpected_status: u64,
    pub abandoned: u64,
}

impl TaskMonitorSnapshot {
    /// Tasks that have received a result, whatever it was
    pub fn resolved(&self) -> u64 {
        self.succeeded + self.failed + self.unknown + self.unexpected_status
    }
}

impl TaskMonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delivered result under its outcome
    pub fn record_resolution(&self, result: &CompletionResult) {
        let counter = match result {
            Ok(_) => &self.succeeded,
            Err(ApiError::TaskUnknown(_)) => &self.unknown,
            Err(ApiError::TaskUnexpectedStatus { .. }) => &self.unexpected_status,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count tasks still tracked when the monitor shut down
    pub fn record_abandoned(&self, count: usize) {
        self.abandoned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TaskMonitorSnapshot {
        TaskMonitorSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            unexpected_status: self.unexpected_status.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}
