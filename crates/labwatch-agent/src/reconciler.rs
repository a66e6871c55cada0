//! Watchdog reconciliation: converge running monitors with the hub's view.
//!
//! Each cycle re-derives the desired monitor set from fresh watchdog
//! snapshots, so a missed cycle or a transient hub failure is recovered
//! on the next pass rather than tracked as an event.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use labwatch_hub::{ControlPlane, StopType, SystemId, WatchdogEntry};

use crate::config::WatchdogConfig;
use crate::error::AgentResult;
use crate::supervisor::MonitorSupervisor;

/// Stop message recorded against recipes whose watchdog expired.
const ABORT_MESSAGE: &str = "external watchdog expired";

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Expired watchdogs fully aborted.
    pub aborted: usize,
    /// Monitors started for newly active systems.
    pub spawned: usize,
    /// Monitors stopped for systems no longer active.
    pub reaped: usize,
    /// Errors absorbed during the pass.
    pub failures: usize,
}

impl CycleSummary {
    /// Returns true if the pass changed nothing and absorbed no errors.
    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        self.aborted == 0 && self.spawned == 0 && self.reaped == 0 && self.failures == 0
    }
}

/// Drives monitors towards the hub's active-watchdog set.
pub struct Reconciler {
    plane: Arc<dyn ControlPlane>,
    supervisor: MonitorSupervisor,
    poll_interval: Duration,
}

impl Reconciler {
    /// Create a reconciler polling at the configured interval.
    #[must_use]
    pub fn new(
        plane: Arc<dyn ControlPlane>,
        supervisor: MonitorSupervisor,
        config: &WatchdogConfig,
    ) -> Self {
        Self {
            plane,
            supervisor,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// The supervised monitor set.
    #[must_use]
    pub fn supervisor(&self) -> &MonitorSupervisor {
        &self.supervisor
    }

    /// Poll and reconcile until cancelled, then stop every monitor.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "watchdog reconciliation started"
        );

        loop {
            let summary = self.run_cycle().await;
            if summary.is_quiet() {
                debug!("reconciliation cycle complete; nothing to do");
            } else {
                info!(
                    aborted = summary.aborted,
                    spawned = summary.spawned,
                    reaped = summary.reaped,
                    failures = summary.failures,
                    "reconciliation cycle complete"
                );
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("stopping all monitors");
        self.supervisor.shutdown_all().await;
    }

    /// Run one reconciliation pass.
    ///
    /// Expiry handling runs first, so a system whose watchdog just fired
    /// is never respawned by the same pass even when the hub still lists
    /// it as active. All errors are absorbed: a failed query or spawn is
    /// logged, counted, and retried on the next cycle.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let mut aborted: HashSet<SystemId> = HashSet::new();

        match self.plane.expired_watchdogs().await {
            Ok(expired) => {
                for entry in expired {
                    match self.abort(&entry).await {
                        Ok(()) => summary.aborted += 1,
                        Err(e) => {
                            warn!(
                                system = %entry.system,
                                recipe_id = entry.recipe_id,
                                error = %e,
                                "abort incomplete; will retry next cycle"
                            );
                            summary.failures += 1;
                        }
                    }
                    aborted.insert(entry.system);
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch expired watchdogs");
                summary.failures += 1;
            }
        }

        match self.plane.active_watchdogs().await {
            Ok(active) => {
                let active_systems: HashSet<&str> =
                    active.iter().map(|entry| entry.system.as_str()).collect();

                for entry in &active {
                    if aborted.contains(&entry.system) || self.supervisor.contains(&entry.system) {
                        continue;
                    }
                    match self.supervisor.spawn(entry).await {
                        Ok(()) => summary.spawned += 1,
                        Err(e) => {
                            warn!(system = %entry.system, error = %e, "failed to start monitor");
                            summary.failures += 1;
                        }
                    }
                }

                for system in self.supervisor.systems() {
                    if active_systems.contains(system.as_str()) {
                        continue;
                    }
                    match self.supervisor.terminate(&system).await {
                        Ok(()) => summary.reaped += 1,
                        Err(e) => {
                            warn!(system = %system, error = %e, "failed to stop monitor");
                            summary.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                // Without a trustworthy active set, neither spawn nor reap;
                // reaping against a failed fetch would stop every monitor.
                warn!(error = %e, "failed to fetch active watchdogs; skipping spawn and reap");
                summary.failures += 1;
            }
        }

        summary
    }

    /// Handle one expired watchdog.
    ///
    /// The monitor is stopped first, best effort, and the hub is notified
    /// even when that fails.
    async fn abort(&mut self, entry: &WatchdogEntry) -> AgentResult<()> {
        info!(
            system = %entry.system,
            recipe_id = entry.recipe_id,
            expiry = %entry.expiry,
            "watchdog expired; aborting recipe"
        );

        if let Err(e) = self.supervisor.terminate(&entry.system).await {
            warn!(system = %entry.system, error = %e, "failed to stop expired monitor");
        }

        self.plane
            .stop_recipe(entry.recipe_id, StopType::Abort, ABORT_MESSAGE)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::MockLauncher;
    use labwatch_hub::MockHub;

    fn watchdog(system: &str, recipe_id: u64) -> WatchdogEntry {
        WatchdogEntry {
            system: system.to_owned(),
            recipe_id,
            task_id: recipe_id * 10,
            expiry: chrono::Utc::now() + chrono::Duration::minutes(5),
        }
    }

    fn make_reconciler() -> (Arc<MockHub>, Arc<MockLauncher>, Reconciler) {
        let hub = Arc::new(MockHub::default());
        let launcher = Arc::new(MockLauncher::default());
        let supervisor = MonitorSupervisor::new(launcher.clone());
        let reconciler = Reconciler::new(hub.clone(), supervisor, &WatchdogConfig::default());
        (hub, launcher, reconciler)
    }

    #[tokio::test]
    async fn cycle_spawns_monitor_for_new_active_system() {
        let (hub, launcher, mut reconciler) = make_reconciler();
        hub.set_active(vec![watchdog("h1", 10)]).unwrap();

        let summary = reconciler.run_cycle().await;

        assert_eq!(summary.spawned, 1);
        assert_eq!(summary.failures, 0);
        assert!(reconciler.supervisor().contains("h1"));
        assert_eq!(launcher.spawned().unwrap(), vec!["h1"]);
    }

    #[tokio::test]
    async fn cycle_reaps_departed_system_without_abort() {
        let (hub, launcher, mut reconciler) = make_reconciler();
        hub.set_active(vec![watchdog("h1", 10)]).unwrap();
        reconciler.run_cycle().await;

        hub.set_active(Vec::new()).unwrap();
        let summary = reconciler.run_cycle().await;

        assert_eq!(summary.reaped, 1);
        assert!(!reconciler.supervisor().contains("h1"));
        assert_eq!(launcher.terminated().unwrap(), vec!["h1"]);
        // Normal completion is not an abort
        assert!(hub.stop_calls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_watchdog_stops_monitor_and_notifies_hub() {
        let (hub, launcher, mut reconciler) = make_reconciler();
        hub.set_active(vec![watchdog("h2", 20)]).unwrap();
        reconciler.run_cycle().await;

        hub.set_expired(vec![watchdog("h2", 20)]).unwrap();
        let summary = reconciler.run_cycle().await;

        assert_eq!(summary.aborted, 1);
        assert!(!reconciler.supervisor().contains("h2"));
        assert_eq!(launcher.terminated().unwrap(), vec!["h2"]);

        let stops = hub.stop_calls().unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].recipe_id, 20);
        assert_eq!(stops[0].stop_type, StopType::Abort);
        assert_eq!(stops[0].message, "external watchdog expired");
    }

    #[tokio::test]
    async fn aborted_system_is_not_respawned_in_the_same_cycle() {
        let (hub, launcher, mut reconciler) = make_reconciler();
        hub.set_active(vec![watchdog("h2", 20)]).unwrap();
        reconciler.run_cycle().await;

        // Stop notification fails, so the hub keeps listing h2 as active
        // in the very same cycle that aborted it.
        hub.set_expired(vec![watchdog("h2", 20)]).unwrap();
        hub.fail_stops(true).unwrap();

        let summary = reconciler.run_cycle().await;

        assert_eq!(summary.aborted, 0);
        assert_eq!(summary.spawned, 0);
        assert_eq!(summary.failures, 1);
        assert!(!reconciler.supervisor().contains("h2"));

        // Next cycle retries the abort once the hub recovers
        hub.fail_stops(false).unwrap();
        let summary = reconciler.run_cycle().await;
        assert_eq!(summary.aborted, 1);
        assert_eq!(hub.stop_calls().unwrap().len(), 1);

        // h2 was terminated by the first abort attempt only
        assert_eq!(launcher.terminated().unwrap(), vec!["h2"]);
    }

    #[tokio::test]
    async fn failed_active_fetch_leaves_monitors_alone() {
        let (hub, launcher, mut reconciler) = make_reconciler();
        hub.set_active(vec![watchdog("h1", 10)]).unwrap();
        reconciler.run_cycle().await;

        hub.fail_active_queries(true).unwrap();
        let summary = reconciler.run_cycle().await;

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.reaped, 0);
        assert!(reconciler.supervisor().contains("h1"));
        assert!(launcher.terminated().unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_is_absorbed_and_retried() {
        let (hub, launcher, mut reconciler) = make_reconciler();
        hub.set_active(vec![watchdog("h1", 10)]).unwrap();
        launcher.fail_spawns(true).unwrap();

        let summary = reconciler.run_cycle().await;
        assert_eq!(summary.failures, 1);
        assert!(!reconciler.supervisor().contains("h1"));

        launcher.fail_spawns(false).unwrap();
        let summary = reconciler.run_cycle().await;
        assert_eq!(summary.spawned, 1);
        assert!(reconciler.supervisor().contains("h1"));
    }

    #[test]
    fn quiet_summary_is_detected() {
        assert!(CycleSummary::default().is_quiet());
        assert!(!CycleSummary {
            spawned: 1,
            ..CycleSummary::default()
        }
        .is_quiet());
    }
}
