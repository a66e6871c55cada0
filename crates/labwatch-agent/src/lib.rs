//! Labwatch agent - watchdog enforcement and console capture for lab systems.
//!
//! The agent runs on a lab controller and is responsible for:
//!
//! - **Watchdog reconciliation**: Polling the hub for active and expired
//!   watchdogs and converging a set of monitor processes to match
//! - **Expiry enforcement**: Stopping the monitor and aborting the recipe
//!   when a watchdog expires
//! - **Console capture**: Tailing each system's console log, shipping it
//!   to the hub in verified chunks, and flagging kernel panics
//!
//! # Architecture
//!
//! The agent uses a process-per-system model:
//! - One reconciliation loop talks to the hub and decides which systems
//!   need a monitor
//! - Each monitor is a separate process (the agent re-executed with a
//!   `monitor` subcommand) in its own process group
//! - Monitors are stopped by process-group signal, so anything they
//!   spawned goes down with them
//!
//! A crashed monitor is respawned on the next reconciliation cycle; no
//! state is carried between cycles beyond the running process set.
//!
//! # Example
//!
//! ```ignore
//! use labwatch_agent::{AgentConfig, MonitorSupervisor, ProcessLauncher, Reconciler};
//! use labwatch_hub::HubClient;
//! use std::sync::Arc;
//!
//! let config = AgentConfig::load()?;
//! let hub = Arc::new(HubClient::new(&config.hub)?);
//! let supervisor = MonitorSupervisor::new(Arc::new(ProcessLauncher::new(None)));
//! let mut reconciler = Reconciler::new(hub, supervisor, &config.watchdog);
//! reconciler.run(cancel).await;
//! ```

pub mod config;
pub mod error;
pub mod launcher;
pub mod reconciler;
pub mod signals;
pub mod supervisor;
pub mod tailer;
pub mod upload;

// Re-export main types
pub use config::{AgentConfig, ConsoleConfig, WatchdogConfig};
pub use error::{AgentError, AgentResult};
pub use launcher::{MockLauncher, MonitorHandle, MonitorLauncher, ProcessLauncher};
pub use reconciler::{CycleSummary, Reconciler};
pub use supervisor::MonitorSupervisor;
pub use tailer::{ConsoleTailer, TailStep};
pub use upload::ChunkedUploader;
