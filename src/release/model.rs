// ABOUTME: Release record and status for one (service, version) pairing.
// ABOUTME: Status advances Pending -> Tagged -> Verifying -> Verified -> Deployed | RolledBack.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CommitId, ImageRef, ServiceName, VersionLabel};

/// Lifecycle status of a single release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Pending,
    Tagged,
    Verifying,
    Verified,
    Failed,
    Deployed,
    RolledBack,
}

impl ReleaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReleaseStatus::Failed | ReleaseStatus::Deployed | ReleaseStatus::RolledBack
        )
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Tagged => "tagged",
            ReleaseStatus::Verifying => "verifying",
            ReleaseStatus::Verified => "verified",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::RolledBack => "rolled back",
        };
        write!(f, "{s}")
    }
}

/// A requested (service, version) pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub service: ServiceName,
    /// Version actually tagged; differs from `requested` after an auto-bump.
    pub version: VersionLabel,
    pub requested: VersionLabel,
    pub commit: Option<CommitId>,
    /// Digest-pinned image once verified.
    pub image: Option<ImageRef>,
    pub status: ReleaseStatus,
    /// The tag already pointed at `commit` before this release ran.
    #[serde(default)]
    pub tag_existed: bool,
}

impl Release {
    pub fn pending(service: ServiceName, version: VersionLabel) -> Self {
        Self {
            service,
            requested: version.clone(),
            version,
            commit: None,
            image: None,
            status: ReleaseStatus::Pending,
            tag_existed: false,
        }
    }

    pub fn tag_name(&self) -> String {
        self.version.tag_name()
    }

    pub(crate) fn mark_tagged(&mut self, commit: CommitId, existed: bool) {
        self.commit = Some(commit);
        self.tag_existed = existed;
        self.status = ReleaseStatus::Tagged;
    }

    pub(crate) fn mark_verifying(&mut self) {
        self.status = ReleaseStatus::Verifying;
    }

    pub(crate) fn mark_verified(&mut self, image: ImageRef) {
        self.image = Some(image);
        self.status = ReleaseStatus::Verified;
    }

    /// Move to a terminal status. Terminal releases never change again.
    pub(crate) fn finish(&mut self, status: ReleaseStatus) {
        debug_assert!(status.is_terminal());
        if !self.status.is_terminal() {
            self.status = status;
        }
    }
}
