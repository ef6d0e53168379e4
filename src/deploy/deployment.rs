// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Holds the target and previous snapshots plus the services they cover.

use crate::compose::EnvOverrides;
use crate::config::ServiceConfig;
use crate::store::EnvironmentSnapshot;
use crate::types::ServiceName;

use super::state::{HealthChecked, Initialized, Restarted};

/// How a healthy target snapshot becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Commit a freshly staged snapshot.
    Commit,
    /// Re-activate an already committed snapshot.
    Restore,
}

/// A rollout of one snapshot, parameterized by its current state.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) services: Vec<ServiceConfig>,
    pub(crate) previous: EnvironmentSnapshot,
    pub(crate) target: EnvironmentSnapshot,
    pub(crate) activation: Activation,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    pub fn new(
        services: Vec<ServiceConfig>,
        previous: EnvironmentSnapshot,
        target: EnvironmentSnapshot,
    ) -> Self {
        Deployment {
            services,
            previous,
            target,
            activation: Activation::Commit,
            state: Initialized,
        }
    }

    /// A deployment that brings back a previously committed snapshot.
    pub fn restore(
        services: Vec<ServiceConfig>,
        previous: EnvironmentSnapshot,
        target: EnvironmentSnapshot,
    ) -> Self {
        Deployment {
            activation: Activation::Restore,
            ..Self::new(services, previous, target)
        }
    }
}

impl<S> Deployment<S> {
    pub fn target(&self) -> &EnvironmentSnapshot {
        &self.target
    }

    pub fn previous(&self) -> &EnvironmentSnapshot {
        &self.previous
    }

    pub(crate) fn service(&self, name: &ServiceName) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| &s.name == name)
    }

    /// Compose service names for the given services, skipping unknown ones.
    pub(crate) fn compose_names<'n>(
        &self,
        names: impl IntoIterator<Item = &'n ServiceName>,
    ) -> Vec<String> {
        names
            .into_iter()
            .filter_map(|n| self.service(n))
            .map(|s| s.compose_service().to_string())
            .collect()
    }

    /// Env-var overrides that make compose run `snapshot`'s images.
    pub(crate) fn overrides(&self, snapshot: &EnvironmentSnapshot) -> EnvOverrides {
        snapshot
            .images
            .iter()
            .filter_map(|(name, image)| {
                self.service(name)
                    .map(|s| (s.env_key(), image.to_string()))
            })
            .collect()
    }
}

impl Deployment<Restarted> {
    pub fn restarted(&self) -> &[ServiceName] {
        &self.state.restarted
    }
}

impl Deployment<HealthChecked> {
    pub fn restarted(&self) -> &[ServiceName] {
        &self.state.restarted
    }
}
