//! Monitor process launching and signalling.
//!
//! The supervisor manages monitors only through the [`MonitorLauncher`]
//! trait, so the reconciliation logic can be exercised in tests with
//! [`MockLauncher`] instead of real child processes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::info;

use labwatch_hub::{SystemId, WatchdogEntry};

use crate::error::{AgentError, AgentResult};

/// A live monitor process.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    /// System the monitor is watching.
    pub system: SystemId,
    /// Process id of the monitor, which is also its process-group id.
    pub pid: i32,
    /// When the monitor was started.
    pub started_at: Instant,
}

/// Trait for monitor process implementations.
#[async_trait]
pub trait MonitorLauncher: Send + Sync {
    /// Start a monitor for the system named in `entry`.
    ///
    /// Returns as soon as the monitor is running; never waits for it to
    /// finish.
    async fn spawn(&self, entry: &WatchdogEntry) -> AgentResult<MonitorHandle>;

    /// Terminate a monitor's process group.
    ///
    /// A monitor that has already exited is treated as success, since the
    /// desired end state already holds.
    async fn terminate(&self, handle: &MonitorHandle) -> AgentResult<()>;

    /// Nudge a monitor to poll its console log immediately.
    async fn wake(&self, handle: &MonitorHandle) -> AgentResult<()>;
}

/// Launcher that runs each monitor as a child process.
///
/// Monitors are started by re-executing the agent binary with the
/// `monitor` subcommand, in their own process group so that
/// `terminate` can signal the monitor and anything it starts with a
/// single `killpg`.
#[derive(Debug, Default)]
pub struct ProcessLauncher {
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Create a launcher that passes `--config` through to monitors.
    #[must_use]
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    fn signal_group(handle: &MonitorHandle, signal: Signal) -> AgentResult<()> {
        match killpg(Pid::from_raw(handle.pid), signal) {
            Ok(()) => Ok(()),
            // Process group already gone
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(AgentError::monitor(format!(
                "failed to signal monitor group {}: {e}",
                handle.pid
            ))),
        }
    }
}

#[async_trait]
impl MonitorLauncher for ProcessLauncher {
    async fn spawn(&self, entry: &WatchdogEntry) -> AgentResult<MonitorHandle> {
        let exe = std::env::current_exe()?;

        let mut command = Command::new(exe);
        command
            .arg("monitor")
            .arg("--system")
            .arg(&entry.system)
            .arg("--recipe-id")
            .arg(entry.recipe_id.to_string())
            .arg("--task-id")
            .arg(entry.task_id.to_string());

        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }

        let child = command
            .process_group(0) // New process group for clean kill
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| AgentError::monitor(format!("failed to spawn monitor: {e}")))?;

        let pid = child
            .id()
            .ok_or_else(|| AgentError::monitor("spawned monitor has no pid"))?;
        let pid = i32::try_from(pid)
            .map_err(|_| AgentError::monitor(format!("monitor pid out of range: {pid}")))?;

        info!(system = %entry.system, pid, "monitor started");

        // Not awaited; the runtime reaps the child in the background when
        // it exits.
        drop(child);

        Ok(MonitorHandle {
            system: entry.system.clone(),
            pid,
            started_at: Instant::now(),
        })
    }

    async fn terminate(&self, handle: &MonitorHandle) -> AgentResult<()> {
        Self::signal_group(handle, Signal::SIGTERM)
    }

    async fn wake(&self, handle: &MonitorHandle) -> AgentResult<()> {
        Self::signal_group(handle, Signal::SIGUSR2)
    }
}

#[derive(Debug, Default)]
struct MockLauncherState {
    next_pid: i32,
    live: HashSet<SystemId>,
    spawned: Vec<SystemId>,
    terminated: Vec<SystemId>,
    woken: Vec<SystemId>,
    fail_spawns: bool,
}

/// Mock launcher for testing.
#[derive(Debug, Default)]
pub struct MockLauncher {
    state: RwLock<MockLauncherState>,
}

impl MockLauncher {
    /// Make `spawn` fail until cleared.
    pub fn fail_spawns(&self, failing: bool) -> AgentResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AgentError::internal("lock poisoned"))?;
        state.fail_spawns = failing;
        Ok(())
    }

    /// Systems with a live mock monitor.
    pub fn live_systems(&self) -> AgentResult<Vec<SystemId>> {
        let state = self
            .state
            .read()
            .map_err(|_| AgentError::internal("lock poisoned"))?;
        Ok(state.live.iter().cloned().collect())
    }

    /// Systems passed to `spawn`, in call order.
    pub fn spawned(&self) -> AgentResult<Vec<SystemId>> {
        let state = self
            .state
            .read()
            .map_err(|_| AgentError::internal("lock poisoned"))?;
        Ok(state.spawned.clone())
    }

    /// Systems passed to `terminate`, in call order.
    pub fn terminated(&self) -> AgentResult<Vec<SystemId>> {
        let state = self
            .state
            .read()
            .map_err(|_| AgentError::internal("lock poisoned"))?;
        Ok(state.terminated.clone())
    }

    /// Systems passed to `wake`, in call order.
    pub fn woken(&self) -> AgentResult<Vec<SystemId>> {
        let state = self
            .state
            .read()
            .map_err(|_| AgentError::internal("lock poisoned"))?;
        Ok(state.woken.clone())
    }
}

#[async_trait]
impl MonitorLauncher for MockLauncher {
    async fn spawn(&self, entry: &WatchdogEntry) -> AgentResult<MonitorHandle> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AgentError::internal("lock poisoned"))?;

        if state.fail_spawns {
            return Err(AgentError::monitor(format!(
                "spawn failure injected for {}",
                entry.system
            )));
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state.live.insert(entry.system.clone());
        state.spawned.push(entry.system.clone());

        Ok(MonitorHandle {
            system: entry.system.clone(),
            pid,
            started_at: Instant::now(),
        })
    }

    async fn terminate(&self, handle: &MonitorHandle) -> AgentResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AgentError::internal("lock poisoned"))?;

        // Terminating an already-gone monitor is a no-op, like killpg
        // on a dead group.
        state.live.remove(&handle.system);
        state.terminated.push(handle.system.clone());

        Ok(())
    }

    async fn wake(&self, handle: &MonitorHandle) -> AgentResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AgentError::internal("lock poisoned"))?;

        state.woken.push(handle.system.clone());
        Ok(())
    }
}
