// ABOUTME: Record of one deployment attempt and its per-service health results.
// ABOUTME: Immutable once the attempt reaches a terminal outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::Revision;
use crate::types::ServiceName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    Succeeded,
    /// Deployment failed and restoring the previous snapshot failed too.
    Failed,
    /// Deployment failed and the previous snapshot is running again.
    RolledBack,
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployOutcome::Succeeded => "succeeded",
            DeployOutcome::Failed => "failed",
            DeployOutcome::RolledBack => "rolled back",
        };
        write!(f, "{s}")
    }
}

/// Health results for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service: ServiceName,
    /// Probes issued.
    pub attempts: u32,
    pub passed: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAttempt {
    pub target: Revision,
    pub previous: Revision,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: DeployOutcome,
    /// Services recreated for the target snapshot.
    pub restarted: Vec<ServiceName>,
    pub health: Vec<ServiceHealth>,
    pub error: Option<String>,
    pub rollback_error: Option<String>,
}

impl DeploymentAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == DeployOutcome::Succeeded
    }

    /// Health results of services that did not pass.
    pub fn unhealthy(&self) -> impl Iterator<Item = &ServiceHealth> {
        self.health.iter().filter(|h| !h.passed)
    }
}
