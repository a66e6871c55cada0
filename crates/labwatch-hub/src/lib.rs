//! Client library for the lab hub.
//!
//! The hub is the scheduling service of the test-execution platform. It
//! owns job, recipe, and task state, together with the watchdog timers
//! bound to running recipes. This crate provides:
//!
//! - **Wire types**: watchdog entries, stop/result vocabularies, and the
//!   chunked log-upload protocol, including its final-chunk sentinel
//! - **`HubClient`**: a reqwest-based client covering the watchdog,
//!   stop, and log-upload endpoints
//! - **`ControlPlane`**: the trait seam the watchdog agent drives its
//!   reconciliation through, with [`MockHub`] for tests
//!
//! # Example
//!
//! ```ignore
//! use labwatch_hub::{HubClient, HubConfig, StopType};
//!
//! let client = HubClient::new(&HubConfig::default())?;
//! for entry in client.expired_watchdogs().await? {
//!     client
//!         .stop_recipe(entry.recipe_id, StopType::Abort, "external watchdog expired")
//!         .await?;
//! }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod plane;
pub mod types;

// Re-export commonly used types at the crate root
pub use client::HubClient;
pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use plane::{ControlPlane, MockHub, StopCall};
pub use types::{
    ChunkOffset, JobId, LogChunk, RecipeId, ResultType, StopType, SystemId, TaskId, TaskResult,
    WatchdogEntry,
};
