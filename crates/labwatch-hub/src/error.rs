//! Error types for labwatch-hub.

use crate::types::{JobId, RecipeId, TaskId};

/// Result type alias using [`HubError`].
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur while talking to the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with an unexpected status or body.
    #[error("hub API error: {0}")]
    Api(String),

    /// Recipe unknown to the hub.
    #[error("recipe not found: {0}")]
    RecipeNotFound(RecipeId),

    /// Job unknown to the hub.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Task unknown to the hub, or it has no watchdog.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Create a hub API error.
    #[must_use]
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
