//! Per-client session state
//!
//! Holds the current auth token and the running task monitor, if any. The
//! token is read on every request and replaced on re-login; the monitor slot
//! changes only on start and stop.

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::errors::ApiError;
use super::monitor::TaskMonitorHandle;
use super::waiter::PendingRegistration;

struct RunningMonitor {
    handle: TaskMonitorHandle,
    registrations: mpsc::Sender<PendingRegistration>,
}

#[derive(Default)]
pub(crate) struct Session {
    token: RwLock<Option<String>>,
    monitor: Mutex<Option<RunningMonitor>>,
}

impl Session {
    pub(crate) fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub(crate) fn set_token(&self, token: String) {
        *self.token.write() = Some(token);
    }

    pub(crate) fn clear_token(&self) {
        *self.token.write() = None;
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Sender for registering deferred tasks, if a live monitor exists
    pub(crate) fn registrations(&self) -> Option<mpsc::Sender<PendingRegistration>> {
        self.monitor
            .lock()
            .as_ref()
            .filter(|running| !running.handle.is_finished())
            .map(|running| running.registrations.clone())
    }

    pub(crate) fn is_monitor_running(&self) -> bool {
        self.monitor.lock().as_ref().is_some_and(|running| !running.handle.is_finished())
    }

    /// Install a freshly spawned monitor.
    ///
    /// Fails, cancelling the new monitor, if a live one is already installed.
    /// A monitor that exited on its own is replaced.
    pub(crate) fn attach_monitor(
        &self,
        handle: TaskMonitorHandle,
        registrations: mpsc::Sender<PendingRegistration>,
    ) -> Result<(), ApiError> {
        let mut slot = self.monitor.lock();
        if slot.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            handle.cancel();
            return Err(ApiError::Config("task monitor already running".to_string()));
        }
        *slot = Some(RunningMonitor { handle, registrations });
        Ok(())
    }

    /// Remove the monitor so it can be stopped outside the lock.
    pub(crate) fn detach_monitor(&self) -> Option<TaskMonitorHandle> {
        self.monitor.lock().take().map(|running| running.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lifecycle() {
        let session = Session::default();
        assert!(!session.is_authenticated());

        session.set_token("abc".into());
        assert_eq!(session.token().as_deref(), Some("abc"));

        session.clear_token();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn no_registrations_without_monitor() {
        let session = Session::default();
        assert!(session.registrations().is_none());
        assert!(!session.is_monitor_running());
        assert!(session.detach_monitor().is_none());
    }
}
