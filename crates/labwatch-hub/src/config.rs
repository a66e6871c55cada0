//! Client configuration for the hub API.

use serde::Deserialize;

/// Hub client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Base URL for the hub HTTP API.
    #[serde(default = "default_hub_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_hub_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_hub_url() -> String {
    "http://localhost:8000".to_owned()
}

const fn default_hub_timeout_secs() -> u64 {
    30
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: default_hub_url(),
            timeout_secs: default_hub_timeout_secs(),
        }
    }
}
