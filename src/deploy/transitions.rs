// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use futures::future::join_all;
use std::time::Duration;

use crate::compose::{ComposeOps, EnvOverrides};
use crate::config::{HealthcheckConfig, ServiceConfig};
use crate::health::{HealthProbe, ProbeError};
use crate::store::EnvStore;
use crate::types::ServiceName;

use super::Deployment;
use super::deployment::Activation;
use super::attempt::ServiceHealth;
use super::error::DeployError;
use super::state::{HealthChecked, ImagesPulled, Initialized, Restarted};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

impl<S> Deployment<S> {
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            services: self.services,
            previous: self.previous,
            target: self.target,
            activation: self.activation,
            state,
        }
    }
}

// =============================================================================
// Initialized -> ImagesPulled
// =============================================================================

impl Deployment<Initialized> {
    /// Pull every image in the target snapshot. Nothing is restarted.
    #[must_use = "deployment state must be used"]
    pub async fn pull(self, compose: &dyn ComposeOps) -> TransitionResult<ImagesPulled, Initialized> {
        let services = self.compose_names(self.target.images.keys());
        let env = self.overrides(&self.target);

        tracing::debug!(revision = %self.target.revision, services = ?services, "pulling images");
        if let Err(e) = compose.pull(&services, &env).await {
            return Err((self, DeployError::PullFailed(e.to_string())));
        }
        Ok(self.transition(ImagesPulled))
    }
}

// =============================================================================
// ImagesPulled -> Restarted
// =============================================================================

impl Deployment<ImagesPulled> {
    /// Recreate services whose image changed since the previous snapshot.
    ///
    /// A failed recreate may have replaced some containers already, so the
    /// error side is also `Restarted` and can be rolled back.
    #[must_use = "deployment state must be used"]
    pub async fn restart(self, compose: &dyn ComposeOps) -> TransitionResult<Restarted, Restarted> {
        let changed = self.target.changed_from(&self.previous);
        let services = self.compose_names(&changed);
        let env = self.overrides(&self.target);

        let result = if services.is_empty() {
            tracing::debug!("no service images changed, skipping restart");
            Ok(())
        } else {
            tracing::info!(services = ?services, "recreating services");
            compose.up(&services, &env).await
        };

        let next = self.transition(Restarted {
            restarted: changed,
            health: Vec::new(),
        });
        match result {
            Ok(()) => Ok(next),
            Err(e) => Err((next, DeployError::RestartFailed(e.to_string()))),
        }
    }
}

// =============================================================================
// Restarted -> HealthChecked
// =============================================================================

impl Deployment<Restarted> {
    /// Probe every configured health check concurrently.
    #[must_use = "deployment state must be used"]
    pub async fn health_check(
        mut self,
        compose: &dyn ComposeOps,
        probe: &dyn HealthProbe,
    ) -> TransitionResult<HealthChecked, Restarted> {
        let env = self.overrides(&self.target);
        let checks = self
            .services
            .iter()
            .filter_map(|s| s.healthcheck.as_ref().map(|hc| (s, hc)))
            .map(|(service, hc)| check_service(service, hc, compose, probe, &env));
        let health = join_all(checks).await;

        let failed: Vec<String> = health
            .iter()
            .filter(|h| !h.passed)
            .map(|h| match &h.last_error {
                Some(e) => format!("{} ({})", h.service, e),
                None => h.service.to_string(),
            })
            .collect();

        if !failed.is_empty() {
            self.state.health = health;
            let err = DeployError::HealthCheckFailed(failed.join(", "));
            return Err((self, err));
        }

        let restarted = std::mem::take(&mut self.state.restarted);
        Ok(self.transition(HealthChecked { restarted, health }))
    }

    /// Bring back the previous snapshot's images for every recreated service.
    pub async fn rollback(self, compose: &dyn ComposeOps) -> Result<Vec<ServiceName>, DeployError> {
        let restarted = self.state.restarted.clone();
        let services = self.compose_names(&restarted);
        if services.is_empty() {
            return Ok(restarted);
        }

        let env = self.overrides(&self.previous);
        tracing::warn!(
            revision = %self.previous.revision,
            services = ?services,
            "redeploying previous snapshot"
        );
        compose
            .pull(&services, &env)
            .await
            .map_err(|e| DeployError::RollbackFailed(format!("pull: {e}")))?;
        compose
            .up(&services, &env)
            .await
            .map_err(|e| DeployError::RollbackFailed(format!("restart: {e}")))?;
        Ok(restarted)
    }

    /// Health results recorded so far.
    pub fn health(&self) -> &[ServiceHealth] {
        &self.state.health
    }
}

// =============================================================================
// HealthChecked -> active
// =============================================================================

impl Deployment<HealthChecked> {
    /// Make the target snapshot active. On failure the deployment drops back
    /// to `Restarted` so the caller can roll it back.
    pub fn activate(
        self,
        store: &EnvStore,
    ) -> Result<(Vec<ServiceName>, Vec<ServiceHealth>), (Deployment<Restarted>, DeployError)> {
        let activated = match self.activation {
            Activation::Commit => store.commit(&self.target),
            Activation::Restore => store.rollback(self.target.revision).map(|_| ()),
        };
        match activated {
            Ok(()) => Ok((self.state.restarted, self.state.health)),
            Err(e) => {
                let HealthChecked { restarted, health } = self.state.clone();
                let back = self.transition(Restarted { restarted, health });
                Err((back, DeployError::CommitFailed(e.to_string())))
            }
        }
    }
}

async fn check_service(
    service: &ServiceConfig,
    hc: &HealthcheckConfig,
    compose: &dyn ComposeOps,
    probe: &dyn HealthProbe,
    env: &EnvOverrides,
) -> ServiceHealth {
    if hc.start_period > Duration::ZERO {
        tokio::time::sleep(hc.start_period).await;
    }

    let attempts = hc.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match probe_once(service, hc, compose, probe, env).await {
            Ok(()) => {
                tracing::info!(service = %service.name, attempt, "service healthy");
                return ServiceHealth {
                    service: service.name.clone(),
                    attempts: attempt,
                    passed: true,
                    last_error: None,
                };
            }
            Err(e) => {
                tracing::debug!(service = %service.name, attempt, error = %e, "health probe failed");
                last_error = Some(e.to_string());
            }
        }

        if attempt < attempts {
            tokio::time::sleep(hc.interval).await;
        }
    }

    tracing::warn!(service = %service.name, attempts, "service unhealthy");
    ServiceHealth {
        service: service.name.clone(),
        attempts,
        passed: false,
        last_error,
    }
}

async fn probe_once(
    service: &ServiceConfig,
    hc: &HealthcheckConfig,
    compose: &dyn ComposeOps,
    probe: &dyn HealthProbe,
    env: &EnvOverrides,
) -> Result<(), ProbeError> {
    let states = compose
        .ps(env)
        .await
        .map_err(|e| ProbeError::Other(e.to_string()))?;
    let name = service.compose_service();
    if !states.iter().any(|s| s.service == name && s.is_running()) {
        return Err(ProbeError::NotRunning(name.to_string()));
    }

    probe.check(&hc.url, hc.timeout).await
}
