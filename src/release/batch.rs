// ABOUTME: Batch request, state machine states, failure taxonomy, and reports.
// ABOUTME: A batch is the atomic unit: all releases commit together or none do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::model::Release;
use crate::deploy::DeploymentAttempt;
use crate::diagnostics::Warning;
use crate::error::{Error, Result};
use crate::store::{EnvironmentSnapshot, Revision};
use crate::types::{BatchId, ServiceName, VersionLabel};

/// Batch lifecycle: Requested -> Tagging -> Verifying -> Staged -> Deploying
/// -> Committed | RolledBack, with Failed and Cancelled as early exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Requested,
    Tagging,
    Verifying,
    Staged,
    Deploying,
    Committed,
    RolledBack,
    Failed,
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Committed
                | BatchState::RolledBack
                | BatchState::Failed
                | BatchState::Cancelled
        )
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchState::Requested => "requested",
            BatchState::Tagging => "tagging",
            BatchState::Verifying => "verifying",
            BatchState::Staged => "staged",
            BatchState::Deploying => "deploying",
            BatchState::Committed => "committed",
            BatchState::RolledBack => "rolled back",
            BatchState::Failed => "failed",
            BatchState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Why a batch did not commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailureKind {
    /// Unknown or duplicate services in the request.
    Invalid,
    TagConflict,
    /// Source control unreachable or a git command failed.
    Git,
    ArtifactTimeout,
    LockHeld,
    /// Environment store or lock file I/O failed; nothing was applied.
    ConfigIo,
    /// Pre-deploy hook refused the batch.
    Hook,
    /// Deployment failed and the previous snapshot was restored.
    RolledBack,
    /// Deployment failed and restoring the previous snapshot failed too.
    RollbackFailed,
    Cancelled,
}

impl BatchFailureKind {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatchFailureKind::TagConflict => 3,
            BatchFailureKind::ArtifactTimeout => 4,
            BatchFailureKind::RolledBack => 5,
            BatchFailureKind::Cancelled => 6,
            BatchFailureKind::RollbackFailed => 7,
            BatchFailureKind::LockHeld => 8,
            BatchFailureKind::Invalid
            | BatchFailureKind::Git
            | BatchFailureKind::ConfigIo
            | BatchFailureKind::Hook => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub kind: BatchFailureKind,
    pub message: String,
}

/// One `service:version` item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub service: ServiceName,
    pub version: VersionLabel,
}

impl ReleaseRequest {
    /// Parse `service:version`, e.g. `langgraph:v1.0.1`.
    pub fn parse(input: &str) -> Result<Self> {
        let (service, version) = input.split_once(':').ok_or_else(|| {
            Error::InvalidRequest(format!("expected service:version, got {input:?}"))
        })?;
        Ok(Self {
            service: ServiceName::new(service)
                .map_err(|e| Error::InvalidRequest(e.to_string()))?,
            version: VersionLabel::parse(version)
                .map_err(|e| Error::InvalidRequest(e.to_string()))?,
        })
    }
}

/// Everything needed to run one batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub id: BatchId,
    pub items: Vec<ReleaseRequest>,
    /// Retry tag conflicts with the next free patch version.
    pub auto_bump: bool,
    /// Overrides the configured verification timeout.
    pub verify_timeout: Option<Duration>,
    /// Break any existing deploy lock.
    pub force_lock: bool,
}

impl BatchRequest {
    pub fn new(items: Vec<ReleaseRequest>) -> Self {
        Self {
            id: BatchId::generate(),
            items,
            auto_bump: false,
            verify_timeout: None,
            force_lock: false,
        }
    }
}

/// Durable record of a batch, updated at every state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: BatchId,
    pub state: BatchState,
    pub releases: Vec<Release>,
    /// Revision staged for deployment, once staged.
    pub staged: Option<Revision>,
    pub attempt: Option<DeploymentAttempt>,
    pub failure: Option<BatchFailure>,
    /// Active snapshot after the operation.
    pub active: Option<EnvironmentSnapshot>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn new(id: BatchId, releases: Vec<Release>) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: BatchState::Requested,
            releases,
            staged: None,
            attempt: None,
            failure: None,
            active: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn release(&self, service: &ServiceName) -> Option<&Release> {
        self.releases.iter().find(|r| &r.service == service)
    }

    pub fn exit_code(&self) -> i32 {
        match (&self.state, &self.failure) {
            (BatchState::Committed, _) => 0,
            (_, Some(failure)) => failure.kind.exit_code(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_version_pairs() {
        let item = ReleaseRequest::parse("mcpserver:v0.5.0").unwrap();
        assert_eq!(item.service.as_str(), "mcpserver");
        assert_eq!(item.version.tag_name(), "v0.5.0");
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(ReleaseRequest::parse("langgraph").is_err());
        assert!(ReleaseRequest::parse("langgraph:latest").is_err());
        assert!(ReleaseRequest::parse("Lang_Graph:v1.0.0").is_err());
    }

    #[test]
    fn exit_codes_are_distinct_for_recoverable_failures() {
        let codes = [
            BatchFailureKind::TagConflict,
            BatchFailureKind::ArtifactTimeout,
            BatchFailureKind::RolledBack,
            BatchFailureKind::Cancelled,
            BatchFailureKind::RollbackFailed,
            BatchFailureKind::LockHeld,
        ]
        .map(|k| k.exit_code());
        assert_eq!(codes, [3, 4, 5, 6, 7, 8]);
        assert_eq!(BatchFailureKind::Hook.exit_code(), 1);
    }

    #[test]
    fn committed_report_exits_zero() {
        let mut report = BatchReport::new(BatchId::new("b"), Vec::new());
        assert_eq!(report.exit_code(), 1);
        report.state = BatchState::Committed;
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn terminal_states() {
        assert!(BatchState::Committed.is_terminal());
        assert!(BatchState::Cancelled.is_terminal());
        assert!(!BatchState::Staged.is_terminal());
    }
}
