// ABOUTME: Error types for deployment operations.
// ABOUTME: Covers image pull, restart, health check, commit, rollback, and lock failures.

use chrono::{DateTime, Utc};

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    PullFailed,
    RestartFailed,
    HealthCheckFailed,
    CommitFailed,
    RollbackFailed,
    LockHeld,
    LockError,
}

/// Errors that can occur during deployment state transitions.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Image pull failed; nothing was restarted.
    #[error("failed to pull images: {0}")]
    PullFailed(String),

    /// Recreating services failed.
    #[error("failed to restart services: {0}")]
    RestartFailed(String),

    /// One or more services never passed a health probe.
    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    /// Activating the snapshot in the store failed.
    #[error("failed to commit snapshot: {0}")]
    CommitFailed(String),

    /// Restoring the previous snapshot failed.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    /// Another batch holds the deploy lock.
    #[error("deploy lock held by {holder} (pid {pid}, batch {batch}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        batch: String,
        started_at: DateTime<Utc>,
    },

    /// Lock file could not be created, read, or removed.
    #[error("deploy lock error: {0}")]
    LockError(String),
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::PullFailed(_) => DeployErrorKind::PullFailed,
            DeployError::RestartFailed(_) => DeployErrorKind::RestartFailed,
            DeployError::HealthCheckFailed(_) => DeployErrorKind::HealthCheckFailed,
            DeployError::CommitFailed(_) => DeployErrorKind::CommitFailed,
            DeployError::RollbackFailed(_) => DeployErrorKind::RollbackFailed,
            DeployError::LockHeld { .. } => DeployErrorKind::LockHeld,
            DeployError::LockError(_) => DeployErrorKind::LockError,
        }
    }

    pub fn lock_held(holder: String, pid: u32, batch: String, started_at: DateTime<Utc>) -> Self {
        DeployError::LockHeld {
            holder,
            pid,
            batch,
            started_at,
        }
    }

    pub fn lock_error(message: impl Into<String>) -> Self {
        DeployError::LockError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(
            DeployError::PullFailed("x".into()).kind(),
            DeployErrorKind::PullFailed
        );
        assert_eq!(
            DeployError::lock_error("boom").kind(),
            DeployErrorKind::LockError
        );
        let held = DeployError::lock_held("host".into(), 7, "abc".into(), Utc::now());
        assert_eq!(held.kind(), DeployErrorKind::LockHeld);
        assert!(held.to_string().contains("pid 7"));
    }
}
