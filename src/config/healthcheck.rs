// ABOUTME: Post-deploy health probe configuration.
// ABOUTME: Defines HTTP liveness probe parameters with sensible defaults.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    /// Endpoint probed with an HTTP GET, e.g. `http://localhost:8123/ok`.
    pub url: String,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_start_period", with = "humantime_serde")]
    pub start_period: Duration,
}

impl HealthcheckConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: default_attempts(),
            interval: default_interval(),
            timeout: default_timeout(),
            start_period: default_start_period(),
        }
    }
}

fn default_attempts() -> u32 {
    10
}

fn default_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_start_period() -> Duration {
    Duration::from_secs(5)
}
