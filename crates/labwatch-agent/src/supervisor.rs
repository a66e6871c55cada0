//! Monitor supervision: one console monitor per watched system.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use labwatch_hub::{SystemId, WatchdogEntry};

use crate::error::{AgentError, AgentResult};
use crate::launcher::{MonitorHandle, MonitorLauncher};

/// Owns the mapping from system identity to running monitor.
///
/// The handle set is mutated only by [`spawn`](Self::spawn),
/// [`terminate`](Self::terminate), and [`shutdown_all`](Self::shutdown_all),
/// all called from the single reconciliation task, so the map needs no
/// locking.
pub struct MonitorSupervisor {
    launcher: Arc<dyn MonitorLauncher>,
    handles: HashMap<SystemId, MonitorHandle>,
}

impl MonitorSupervisor {
    /// Create a supervisor with no monitors.
    #[must_use]
    pub fn new(launcher: Arc<dyn MonitorLauncher>) -> Self {
        Self {
            launcher,
            handles: HashMap::new(),
        }
    }

    /// Returns true if a monitor is running for this system.
    #[must_use]
    pub fn contains(&self, system: &str) -> bool {
        self.handles.contains_key(system)
    }

    /// Handle of the monitor for a system, if one is running.
    #[must_use]
    pub fn handle(&self, system: &str) -> Option<&MonitorHandle> {
        self.handles.get(system)
    }

    /// Snapshot of the systems currently under watch.
    ///
    /// Reconciliation iterates this snapshot while terminating monitors,
    /// so removal from the live map cannot invalidate the scan.
    #[must_use]
    pub fn systems(&self) -> Vec<SystemId> {
        self.handles.keys().cloned().collect()
    }

    /// Number of running monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no monitors are running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Start a monitor for the system named in `entry` and record its
    /// handle.
    pub async fn spawn(&mut self, entry: &WatchdogEntry) -> AgentResult<()> {
        if self.handles.contains_key(&entry.system) {
            return Err(AgentError::MonitorAlreadyRunning(entry.system.clone()));
        }

        info!(
            system = %entry.system,
            recipe_id = entry.recipe_id,
            "starting monitor"
        );

        let handle = self.launcher.spawn(entry).await?;
        self.handles.insert(entry.system.clone(), handle);

        Ok(())
    }

    /// Terminate the monitor for a system and drop its handle.
    ///
    /// A system with no handle is a no-op; termination is idempotent.
    pub async fn terminate(&mut self, system: &str) -> AgentResult<()> {
        let Some(handle) = self.handles.remove(system) else {
            debug!(system = %system, "no monitor to terminate");
            return Ok(());
        };

        info!(system = %system, pid = handle.pid, "stopping monitor");
        self.launcher.terminate(&handle).await
    }

    /// Nudge a system's monitor to poll its console log immediately.
    ///
    /// A system with no monitor is a no-op.
    pub async fn wake(&self, system: &str) -> AgentResult<()> {
        let Some(handle) = self.handles.get(system) else {
            debug!(system = %system, "no monitor to wake");
            return Ok(());
        };

        self.launcher.wake(handle).await
    }

    /// Terminate every monitor, best effort.
    pub async fn shutdown_all(&mut self) {
        let handles: Vec<MonitorHandle> = self.handles.drain().map(|(_, handle)| handle).collect();

        for handle in handles {
            debug!(system = %handle.system, "terminating monitor");
            if let Err(e) = self.launcher.terminate(&handle).await {
                warn!(system = %handle.system, error = %e, "failed to terminate monitor");
            }
        }
    }
}

impl std::fmt::Debug for MonitorSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSupervisor")
            .field("monitors", &self.handles.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::MockLauncher;

    fn watchdog(system: &str) -> WatchdogEntry {
        WatchdogEntry {
            system: system.to_owned(),
            recipe_id: 10,
            task_id: 100,
            expiry: chrono::Utc::now() + chrono::Duration::minutes(5),
        }
    }

    fn make_supervisor() -> (Arc<MockLauncher>, MonitorSupervisor) {
        let launcher = Arc::new(MockLauncher::default());
        let supervisor = MonitorSupervisor::new(launcher.clone());
        (launcher, supervisor)
    }

    #[tokio::test]
    async fn spawn_and_terminate_lifecycle() {
        let (launcher, mut supervisor) = make_supervisor();

        supervisor.spawn(&watchdog("h1")).await.unwrap();
        assert!(supervisor.contains("h1"));
        assert_eq!(supervisor.len(), 1);

        supervisor.terminate("h1").await.unwrap();
        assert!(!supervisor.contains("h1"));
        assert!(supervisor.is_empty());
        assert_eq!(launcher.terminated().unwrap(), vec!["h1"]);
    }

    #[tokio::test]
    async fn duplicate_spawn_is_rejected() {
        let (launcher, mut supervisor) = make_supervisor();

        supervisor.spawn(&watchdog("h1")).await.unwrap();
        let err = supervisor.spawn(&watchdog("h1")).await.unwrap_err();
        assert!(matches!(err, AgentError::MonitorAlreadyRunning(_)));

        // The launcher never saw the second spawn
        assert_eq!(launcher.spawned().unwrap(), vec!["h1"]);
    }

    #[tokio::test]
    async fn terminate_without_handle_is_noop() {
        let (launcher, mut supervisor) = make_supervisor();

        supervisor.terminate("missing").await.unwrap();
        assert!(launcher.terminated().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wake_reaches_the_monitor() {
        let (launcher, mut supervisor) = make_supervisor();

        supervisor.spawn(&watchdog("h1")).await.unwrap();
        supervisor.wake("h1").await.unwrap();
        supervisor.wake("missing").await.unwrap();

        assert_eq!(launcher.woken().unwrap(), vec!["h1"]);
    }

    #[tokio::test]
    async fn shutdown_all_terminates_every_monitor() {
        let (launcher, mut supervisor) = make_supervisor();

        supervisor.spawn(&watchdog("h1")).await.unwrap();
        supervisor.spawn(&watchdog("h2")).await.unwrap();

        supervisor.shutdown_all().await;
        assert!(supervisor.is_empty());

        let mut terminated = launcher.terminated().unwrap();
        terminated.sort();
        assert_eq!(terminated, vec!["h1", "h2"]);
    }
}
