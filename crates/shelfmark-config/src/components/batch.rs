use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Asynchronous batch mode settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Use the batch backend instead of per-product calls
    pub enabled: bool,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Completion window requested from the backend (OpenAI only)
    pub completion_window: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: 60,
            completion_window: "24h".to_string(),
        }
    }
}

impl BatchConfig {
    /// Interval between polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
