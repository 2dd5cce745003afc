use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cooperative backpressure for the interactive path: after `every` model-backed
/// enhancements, pause for `pause_secs` before the next product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Enhancements between pauses; zero disables pacing
    pub every: usize,
    /// Pause length in seconds
    pub pause_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            every: 5,
            pause_secs: 6,
        }
    }
}

impl PacingConfig {
    /// Pause length
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}
