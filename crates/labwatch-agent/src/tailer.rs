//! Console log tailing.
//!
//! A tailer follows one system's console log file, shipping new output
//! to the hub in blocks and scanning each block for failure patterns.
//! The file is reopened on every poll, so a log that appears after the
//! monitor starts is picked up without special handling.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use labwatch_hub::SystemId;

use crate::config::ConsoleConfig;
use crate::upload::ChunkedUploader;

/// Outcome of one tail poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailStep {
    /// A block was read and shipped.
    Uploaded {
        /// Byte offset of the block within the log.
        offset: u64,
        /// Block length.
        bytes: usize,
    },
    /// Nothing new, or an error was absorbed.
    Idle,
}

impl TailStep {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Follows one console log and streams it to the hub.
pub struct ConsoleTailer {
    system: SystemId,
    uploader: ChunkedUploader,
    log_path: PathBuf,
    read_block_bytes: usize,
    idle_poll: Duration,
    patterns: Vec<String>,
    cursor: u64,
    failures_seen: usize,
    wake: Arc<Notify>,
}

impl ConsoleTailer {
    /// Create a tailer for one system's console log.
    #[must_use]
    pub fn new(system: SystemId, uploader: ChunkedUploader, config: &ConsoleConfig) -> Self {
        let log_path = config.log_path(&system);
        Self {
            system,
            uploader,
            log_path,
            read_block_bytes: config.read_block_bytes,
            idle_poll: Duration::from_millis(config.idle_poll_ms),
            patterns: config.panic_patterns.clone(),
            cursor: 0,
            failures_seen: 0,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle used to interrupt an idle wait and poll immediately.
    #[must_use]
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Bytes of console output shipped so far.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Failure patterns observed so far.
    #[must_use]
    pub fn failures_seen(&self) -> usize {
        self.failures_seen
    }

    /// Tail until cancelled.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            system = %self.system,
            path = %self.log_path.display(),
            "console tailer started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let step = self.poll_once().await;
            if step.is_idle() {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = self.wake.notified() => {
                        debug!(system = %self.system, "woken for immediate poll");
                    }
                    () = tokio::time::sleep(self.idle_poll) => {}
                }
            }
        }

        info!(system = %self.system, cursor = self.cursor, "console tailer stopped");
    }

    /// Read, scan, and upload at most one block.
    ///
    /// The cursor only advances once the hub has accepted the block, so
    /// a failed upload is retried at the same offset on the next poll.
    pub async fn poll_once(&mut self) -> TailStep {
        let Some(block) = self.read_block().await else {
            return TailStep::Idle;
        };

        self.scan_block(&block);

        let offset = self.cursor;
        match self.uploader.upload_block(offset, &block).await {
            Ok(()) => {
                self.cursor += block.len() as u64;
                TailStep::Uploaded {
                    offset,
                    bytes: block.len(),
                }
            }
            Err(e) => {
                warn!(
                    system = %self.system,
                    offset,
                    error = %e,
                    "failed to upload console block"
                );
                TailStep::Idle
            }
        }
    }

    async fn read_block(&self) -> Option<Vec<u8>> {
        let mut file = match File::open(&self.log_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!(
                    path = %self.log_path.display(),
                    error = %e,
                    "console log not readable yet"
                );
                return None;
            }
        };

        if let Err(e) = file.seek(SeekFrom::Start(self.cursor)).await {
            debug!(path = %self.log_path.display(), error = %e, "failed to seek console log");
            return None;
        }

        let mut buf = vec![0u8; self.read_block_bytes];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(buf)
            }
            Err(e) => {
                debug!(path = %self.log_path.display(), error = %e, "failed to read console log");
                None
            }
        }
    }

    /// Record failure patterns found in a block.
    ///
    /// Detection is log-only; stopping the recipe is the watchdog's job,
    /// and the block is shipped to the hub unmodified either way.
    fn scan_block(&mut self, block: &[u8]) {
        let text = String::from_utf8_lossy(block);
        for pattern in &self.patterns {
            if text.contains(pattern.as_str()) {
                self.failures_seen += 1;
                warn!(
                    system = %self.system,
                    pattern = %pattern,
                    "failure pattern in console output"
                );
            }
        }
    }
}
