// ABOUTME: Artifact verifier: waits until a tagged image is published.
// ABOUTME: Polls the registry with capped exponential backoff under a hard deadline.

use std::time::Duration;
use tokio::time::Instant;

use super::client::{Registry, RegistryError};
use crate::config::VerifyConfig;
use crate::types::ImageRef;

/// Backoff between registry polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_interval: Duration,
}

impl PollPolicy {
    pub fn new(initial_delay: Duration, max_interval: Duration) -> Self {
        Self {
            initial_delay,
            max_interval: max_interval.max(initial_delay),
        }
    }

    /// Delay after `delay`: doubled, capped at `max_interval`.
    fn next_delay(&self, delay: Duration) -> Duration {
        delay.saturating_mul(2).min(self.max_interval)
    }
}

impl From<&VerifyConfig> for PollPolicy {
    fn from(config: &VerifyConfig) -> Self {
        Self::new(config.initial_delay, config.max_interval)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("{image} not available after {}{}", format_waited(.waited), last_error_suffix(.last_error))]
    Timeout {
        image: ImageRef,
        waited: Duration,
        last_error: Option<String>,
    },
}

fn format_waited(waited: &Duration) -> String {
    humantime::format_duration(Duration::from_secs(waited.as_secs())).to_string()
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last registry error: {e})"),
        None => String::new(),
    }
}

/// Waits for published artifacts.
pub struct ArtifactVerifier<'a> {
    registry: &'a dyn Registry,
}

impl<'a> ArtifactVerifier<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }

    /// Poll until `image` exists or `timeout` elapses.
    ///
    /// Returns the digest-pinned reference when the registry reports a digest.
    pub async fn await_artifact(
        &self,
        image: &ImageRef,
        timeout: Duration,
        policy: PollPolicy,
    ) -> Result<ImageRef, VerifyError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut delay = policy.initial_delay;
        let mut last_error: Option<RegistryError> = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.registry.resolve(image).await {
                Ok(Some(resolved)) => {
                    let pinned = resolved.pinned();
                    tracing::info!(image = %pinned, attempt, "artifact available");
                    return Ok(pinned);
                }
                Ok(None) => {
                    tracing::debug!(image = %image, attempt, "artifact not published yet");
                }
                Err(e) => {
                    tracing::warn!(image = %image, attempt, error = %e, "registry lookup failed");
                    last_error = Some(e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(VerifyError::Timeout {
                    image: image.clone(),
                    waited: now - started,
                    last_error: last_error.map(|e| e.to_string()),
                });
            }

            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = policy.next_delay(delay);
        }
    }
}
