//! Scheduled publisher configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub enabled: bool,
    /// Time between two publishing runs.
    pub interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
        }
    }
}
