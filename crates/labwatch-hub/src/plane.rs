//! Control-plane seam between the watchdog engine and the hub.
//!
//! The engine only ever talks to the hub through [`ControlPlane`], so the
//! reconciliation logic can be driven against [`MockHub`] in tests without
//! a live hub service.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{HubError, HubResult};
use crate::types::{LogChunk, RecipeId, StopType, WatchdogEntry};

/// Hub operations the watchdog engine depends on.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Snapshot of watchdogs for recipes that are currently running.
    async fn active_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>>;

    /// Snapshot of watchdogs whose timers have passed.
    async fn expired_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>>;

    /// Stop a recipe, with an operator-visible message.
    async fn stop_recipe(
        &self,
        recipe_id: RecipeId,
        stop_type: StopType,
        message: &str,
    ) -> HubResult<()>;

    /// Append one chunk of console log to a recipe's log store.
    async fn upload_chunk(&self, recipe_id: RecipeId, chunk: &LogChunk) -> HubResult<()>;
}

/// A recorded `stop_recipe` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StopCall {
    /// Recipe that was stopped.
    pub recipe_id: RecipeId,
    /// Requested stop type.
    pub stop_type: StopType,
    /// Operator-visible message.
    pub message: String,
}

#[derive(Debug, Default)]
struct MockState {
    active: Vec<WatchdogEntry>,
    expired: Vec<WatchdogEntry>,
    stops: Vec<StopCall>,
    chunks: Vec<(RecipeId, LogChunk)>,
    fail_active: bool,
    fail_expired: bool,
    fail_stops: bool,
    fail_uploads: bool,
}

/// In-memory control plane for testing.
///
/// Watchdog snapshots are seeded with [`set_active`](Self::set_active) and
/// [`set_expired`](Self::set_expired); stop and upload calls are recorded
/// for later assertions. Stopping a recipe clears its watchdog from both
/// snapshots, matching the hub's behaviour for stopped recipes.
#[derive(Debug, Default)]
pub struct MockHub {
    state: RwLock<MockState>,
}

impl MockHub {
    /// Replace the active-watchdog snapshot.
    pub fn set_active(&self, entries: Vec<WatchdogEntry>) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        state.active = entries;
        Ok(())
    }

    /// Replace the expired-watchdog snapshot.
    pub fn set_expired(&self, entries: Vec<WatchdogEntry>) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        state.expired = entries;
        Ok(())
    }

    /// Make `active_watchdogs` fail until cleared.
    pub fn fail_active_queries(&self, failing: bool) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        state.fail_active = failing;
        Ok(())
    }

    /// Make `expired_watchdogs` fail until cleared.
    pub fn fail_expired_queries(&self, failing: bool) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        state.fail_expired = failing;
        Ok(())
    }

    /// Make `stop_recipe` fail until cleared.
    pub fn fail_stops(&self, failing: bool) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        state.fail_stops = failing;
        Ok(())
    }

    /// Make `upload_chunk` fail until cleared.
    pub fn fail_uploads(&self, failing: bool) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        state.fail_uploads = failing;
        Ok(())
    }

    /// Stop calls recorded so far, in call order.
    pub fn stop_calls(&self) -> HubResult<Vec<StopCall>> {
        let state = self
            .state
            .read()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        Ok(state.stops.clone())
    }

    /// Uploaded chunks recorded so far, in call order.
    pub fn uploaded_chunks(&self) -> HubResult<Vec<(RecipeId, LogChunk)>> {
        let state = self
            .state
            .read()
            .map_err(|_| HubError::internal("lock poisoned"))?;
        Ok(state.chunks.clone())
    }
}

#[async_trait]
impl ControlPlane for MockHub {
    async fn active_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>> {
        let state = self
            .state
            .read()
            .map_err(|_| HubError::internal("lock poisoned"))?;

        if state.fail_active {
            return Err(HubError::api("active watchdog query unavailable"));
        }
        Ok(state.active.clone())
    }

    async fn expired_watchdogs(&self) -> HubResult<Vec<WatchdogEntry>> {
        let state = self
            .state
            .read()
            .map_err(|_| HubError::internal("lock poisoned"))?;

        if state.fail_expired {
            return Err(HubError::api("expired watchdog query unavailable"));
        }
        Ok(state.expired.clone())
    }

    async fn stop_recipe(
        &self,
        recipe_id: RecipeId,
        stop_type: StopType,
        message: &str,
    ) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;

        if state.fail_stops {
            return Err(HubError::api("recipe stop unavailable"));
        }

        state.stops.push(StopCall {
            recipe_id,
            stop_type,
            message: message.to_owned(),
        });
        state.active.retain(|entry| entry.recipe_id != recipe_id);
        state.expired.retain(|entry| entry.recipe_id != recipe_id);

        Ok(())
    }

    async fn upload_chunk(&self, recipe_id: RecipeId, chunk: &LogChunk) -> HubResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HubError::internal("lock poisoned"))?;

        if state.fail_uploads {
            return Err(HubError::api("log upload unavailable"));
        }
        state.chunks.push((recipe_id, chunk.clone()));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkOffset;

    fn entry(system: &str, recipe_id: RecipeId) -> WatchdogEntry {
        WatchdogEntry {
            system: system.to_owned(),
            recipe_id,
            task_id: recipe_id * 10,
            expiry: chrono::Utc::now() + chrono::Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn mock_hub_snapshots() {
        let hub = MockHub::default();
        hub.set_active(vec![entry("h1", 10)]).unwrap();

        let active = hub.active_watchdogs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].system, "h1");

        assert!(hub.expired_watchdogs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_recipe_clears_watchdogs() {
        let hub = MockHub::default();
        hub.set_active(vec![entry("h1", 10), entry("h2", 20)])
            .unwrap();
        hub.set_expired(vec![entry("h2", 20)]).unwrap();

        hub.stop_recipe(20, StopType::Abort, "external watchdog expired")
            .await
            .unwrap();

        let active = hub.active_watchdogs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].recipe_id, 10);
        assert!(hub.expired_watchdogs().await.unwrap().is_empty());

        let stops = hub.stop_calls().unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].recipe_id, 20);
        assert_eq!(stops[0].stop_type, StopType::Abort);
        assert_eq!(stops[0].message, "external watchdog expired");
    }

    #[tokio::test]
    async fn failure_injection_toggles() {
        let hub = MockHub::default();
        hub.fail_active_queries(true).unwrap();
        assert!(hub.active_watchdogs().await.is_err());

        hub.fail_active_queries(false).unwrap();
        assert!(hub.active_watchdogs().await.is_ok());
    }

    #[tokio::test]
    async fn uploaded_chunks_are_recorded() {
        let hub = MockHub::default();
        let chunk = LogChunk {
            path: "/".to_owned(),
            name: "console.log".to_owned(),
            size: 5,
            md5: "beef".to_owned(),
            offset: ChunkOffset::Data(0),
            data: "aGVsbG8=".to_owned(),
        };

        hub.upload_chunk(10, &chunk).await.unwrap();

        let uploads = hub.uploaded_chunks().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, 10);
        assert_eq!(uploads[0].1.offset, ChunkOffset::Data(0));

        hub.fail_uploads(true).unwrap();
        assert!(hub.upload_chunk(10, &chunk).await.is_err());
        assert_eq!(hub.uploaded_chunks().unwrap().len(), 1);
    }
}
