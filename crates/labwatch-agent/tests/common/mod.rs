//! Common test utilities for agent integration tests.

pub mod fixtures;

use labwatch_agent::{
    ChunkedUploader, ConsoleConfig, ConsoleTailer, MockLauncher, MonitorSupervisor, Reconciler,
    WatchdogConfig,
};
use labwatch_hub::MockHub;
use std::io::Write;
use std::sync::Arc;

/// Complete test agent with a mock hub and mock monitor launcher.
pub struct TestAgent {
    pub hub: Arc<MockHub>,
    pub launcher: Arc<MockLauncher>,
    pub reconciler: Reconciler,
}

impl TestAgent {
    /// Creates a new test agent with default configuration.
    pub fn new() -> Self {
        Self::with_config(WatchdogConfig::default())
    }

    /// Creates a new test agent with custom watchdog configuration.
    pub fn with_config(config: WatchdogConfig) -> Self {
        let hub = Arc::new(MockHub::default());
        let launcher = Arc::new(MockLauncher::default());
        let supervisor = MonitorSupervisor::new(launcher.clone());
        let reconciler = Reconciler::new(hub.clone(), supervisor, &config);

        Self {
            hub,
            launcher,
            reconciler,
        }
    }

    /// Systems currently holding a live monitor.
    pub fn monitored(&self) -> Vec<String> {
        self.reconciler.supervisor().systems()
    }
}

impl Default for TestAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Console tailing setup against a mock hub, with logs in a temporary
/// directory.
pub struct TestConsole {
    pub hub: Arc<MockHub>,
    pub config: ConsoleConfig,
    _dir: tempfile::TempDir,
}

impl TestConsole {
    /// Creates a console setup with the default block size.
    pub fn new() -> Self {
        Self::with_block_size(65536)
    }

    /// Creates a console setup reading at most `bytes` per poll.
    pub fn with_block_size(bytes: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ConsoleConfig {
            logs_dir: dir.path().to_path_buf(),
            read_block_bytes: bytes,
            idle_poll_ms: 10,
            panic_patterns: vec!["Kernel panic".to_owned()],
        };

        Self {
            hub: Arc::new(MockHub::default()),
            config,
            _dir: dir,
        }
    }

    /// Creates a tailer for the given system, uploading to `recipe_id`.
    pub fn tailer(&self, system: &str, recipe_id: u64) -> ConsoleTailer {
        let uploader = ChunkedUploader::new(
            self.hub.clone(),
            recipe_id,
            "/".to_owned(),
            "console.log".to_owned(),
        );
        ConsoleTailer::new(system.to_string(), uploader, &self.config)
    }

    /// Replaces the system's console log with `bytes`.
    pub fn write_console(&self, system: &str, bytes: &[u8]) {
        std::fs::write(self.config.log_path(system), bytes).unwrap();
    }

    /// Appends `bytes` to the system's console log.
    pub fn append_console(&self, system: &str, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.log_path(system))
            .unwrap();
        file.write_all(bytes).unwrap();
    }
}

impl Default for TestConsole {
    fn default() -> Self {
        Self::new()
    }
}
