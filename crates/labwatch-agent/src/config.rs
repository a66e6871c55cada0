//! Configuration for labwatch-agent.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use labwatch_hub::HubConfig;
use serde::Deserialize;

use crate::error::{AgentError, AgentResult};

/// Top-level configuration for the watchdog agent.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentConfig {
    /// Hub client configuration.
    #[serde(default)]
    pub hub: HubConfig,

    /// Reconciliation loop configuration.
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Console tailing configuration.
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl AgentConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `labwatch.toml` in the current directory (if present)
    /// 3. Environment variables with `LABWATCH_` prefix
    pub fn load() -> AgentResult<Self> {
        Figment::new()
            .merge(Toml::file("labwatch.toml"))
            .merge(Env::prefixed("LABWATCH_").split("__"))
            .extract()
            .map_err(|e| AgentError::Config(e.to_string()))
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LABWATCH_").split("__"))
            .extract()
            .map_err(|e| AgentError::Config(e.to_string()))
    }
}

/// Reconciliation loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    /// Seconds between reconciliation cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

const fn default_poll_interval_secs() -> u64 {
    20
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Console tailing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Directory holding one console log per system.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Maximum bytes read per tail poll.
    #[serde(default = "default_read_block_bytes")]
    pub read_block_bytes: usize,

    /// Milliseconds to idle when no new console output is available.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Substrings that flag a failure in console output.
    #[serde(default = "default_panic_patterns")]
    pub panic_patterns: Vec<String>,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("/var/log/labwatch/consoles")
}

const fn default_read_block_bytes() -> usize {
    65536
}

const fn default_idle_poll_ms() -> u64 {
    1000
}

fn default_panic_patterns() -> Vec<String> {
    vec!["Kernel panic".to_owned()]
}

impl ConsoleConfig {
    /// Path of the console log for a system.
    ///
    /// Console servers write one file per machine, named by its fully
    /// qualified name, under `logs_dir`.
    #[must_use]
    pub fn log_path(&self, system: &str) -> PathBuf {
        self.logs_dir.join(system)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            read_block_bytes: default_read_block_bytes(),
            idle_poll_ms: default_idle_poll_ms(),
            panic_patterns: default_panic_patterns(),
        }
    }
}
