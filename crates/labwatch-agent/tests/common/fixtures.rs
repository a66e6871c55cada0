//! Test fixtures for agent integration tests.

use chrono::{DateTime, Duration, Utc};
use labwatch_hub::WatchdogEntry;

/// Builder for watchdog entries as the hub reports them.
pub struct WatchdogBuilder {
    system: String,
    recipe_id: u64,
    task_id: u64,
    expiry: DateTime<Utc>,
}

impl WatchdogBuilder {
    /// Creates a builder for the given system, with the watchdog five
    /// minutes out and recipe and task ids derived from the name.
    pub fn new(system: &str) -> Self {
        let seed = u64::try_from(system.len()).unwrap_or(1).max(1);
        Self {
            system: system.to_string(),
            recipe_id: seed,
            task_id: seed * 10,
            expiry: Utc::now() + Duration::minutes(5),
        }
    }

    /// Sets the recipe the watchdog belongs to.
    pub fn with_recipe(mut self, recipe_id: u64) -> Self {
        self.recipe_id = recipe_id;
        self
    }

    /// Sets the task holding the watchdog.
    pub fn with_task(mut self, task_id: u64) -> Self {
        self.task_id = task_id;
        self
    }

    /// Moves the expiry into the past.
    pub fn expired(mut self) -> Self {
        self.expiry = Utc::now() - Duration::minutes(1);
        self
    }

    /// Builds the watchdog entry.
    pub fn build(self) -> WatchdogEntry {
        WatchdogEntry {
            system: self.system,
            recipe_id: self.recipe_id,
            task_id: self.task_id,
            expiry: self.expiry,
        }
    }
}

/// Shorthand for a healthy watchdog on `system` owned by `recipe_id`.
pub fn watchdog(system: &str, recipe_id: u64) -> WatchdogEntry {
    WatchdogBuilder::new(system).with_recipe(recipe_id).build()
}
