//! Error types for labwatch-agent.

use labwatch_hub::{HubError, SystemId};

/// Result type alias using [`AgentError`].
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur in the watchdog agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Hub communication error.
    #[error("hub error: {0}")]
    Hub(#[from] HubError),

    /// Monitor process error.
    #[error("monitor error: {0}")]
    Monitor(String),

    /// A monitor is already running for this system.
    #[error("monitor already running for {0}")]
    MonitorAlreadyRunning(SystemId),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a monitor error.
    #[must_use]
    pub fn monitor(msg: impl Into<String>) -> Self {
        Self::Monitor(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
