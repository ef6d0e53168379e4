// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: States carry what later steps and rollback need to know.

use crate::types::ServiceName;

use super::attempt::ServiceHealth;

/// Initial state: snapshot staged, nothing touched yet.
/// Available actions: `pull()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Every image in the target snapshot is present locally.
/// Available actions: `restart()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagesPulled;

/// Changed services were recreated (or a recreate was attempted).
/// Available actions: `health_check()`, `rollback()`
#[derive(Debug, Clone, Default)]
pub struct Restarted {
    pub(crate) restarted: Vec<ServiceName>,
    pub(crate) health: Vec<ServiceHealth>,
}

/// Every service with a health check passed a probe.
/// Available actions: `commit()`
#[derive(Debug, Clone, Default)]
pub struct HealthChecked {
    pub(crate) restarted: Vec<ServiceName>,
    pub(crate) health: Vec<ServiceHealth>,
}
