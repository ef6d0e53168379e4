// ABOUTME: Tag manager: issues version tags with collision detection.
// ABOUTME: Never moves an existing tag; proposes the next free patch version instead.

use serde::Serialize;

use crate::config::{Config, ServiceConfig};
use crate::release::Release;
use crate::types::{CommitId, ServiceName, VersionLabel};
use crate::vcs::{GitError, Repository, SourceControl};

/// A tag that already exists at a different commit than the one requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagConflict {
    pub service: ServiceName,
    pub tag: String,
    pub existing: CommitId,
    pub requested: CommitId,
}

impl std::fmt::Display for TagConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tag {} for {} already points at {} (requested {})",
            self.tag,
            self.service,
            self.existing.short(),
            self.requested.short()
        )
    }
}

/// Errors from tag operations.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("{0}")]
    Conflict(TagConflict),

    #[error("git error for {service}: {source}")]
    Git {
        service: ServiceName,
        #[source]
        source: GitError,
    },

    #[error("no patch version left above {latest} for {service}")]
    VersionsExhausted {
        service: ServiceName,
        latest: VersionLabel,
    },
}

impl TagError {
    pub fn conflict(&self) -> Option<&TagConflict> {
        match self {
            TagError::Conflict(conflict) => Some(conflict),
            TagError::Git { .. } | TagError::VersionsExhausted { .. } => None,
        }
    }
}

/// Creates and validates release tags against each service's remote.
pub struct TagManager<'a> {
    vcs: &'a dyn SourceControl,
    config: &'a Config,
}

impl<'a> TagManager<'a> {
    pub fn new(vcs: &'a dyn SourceControl, config: &'a Config) -> Self {
        Self { vcs, config }
    }

    /// Tag the service's configured ref with `version` and push the tag.
    ///
    /// Re-tagging the same commit is idempotent; a tag pointing elsewhere is a
    /// [`TagConflict`] and nothing is mutated.
    pub async fn create_tag(
        &self,
        service: &ServiceConfig,
        version: &VersionLabel,
    ) -> Result<Release, TagError> {
        let repo = Repository::for_service(self.config, service);
        let tag = version.tag_name();
        let git_err = |source| TagError::Git {
            service: service.name.clone(),
            source,
        };

        let head = self.vcs.resolve_ref(&repo).await.map_err(git_err)?;
        let remote = self.vcs.remote_tag(&repo, &tag).await.map_err(git_err)?;
        let local = self.vcs.local_tag(&repo, &tag).await.map_err(git_err)?;

        let mut release = Release::pending(service.name.clone(), version.clone());

        // The remote is authoritative when both sides know the tag
        if let Some(existing) = remote.clone().or_else(|| local.clone()) {
            if existing != head {
                tracing::warn!(
                    service = %service.name,
                    tag = %tag,
                    existing = %existing,
                    requested = %head,
                    "tag conflict"
                );
                return Err(TagError::Conflict(TagConflict {
                    service: service.name.clone(),
                    tag,
                    existing,
                    requested: head,
                }));
            }

            if local.is_none() {
                self.vcs
                    .create_tag(&repo, &tag, &head)
                    .await
                    .map_err(git_err)?;
            }
            if remote.is_none() {
                self.vcs.push_tag(&repo, &tag).await.map_err(git_err)?;
            }

            tracing::info!(service = %service.name, tag = %tag, commit = %head.short(), "tag already present");
            release.mark_tagged(head, true);
            return Ok(release);
        }

        self.vcs
            .create_tag(&repo, &tag, &head)
            .await
            .map_err(git_err)?;
        self.vcs.push_tag(&repo, &tag).await.map_err(git_err)?;

        tracing::info!(service = %service.name, tag = %tag, commit = %head.short(), "tag created");
        release.mark_tagged(head, false);
        Ok(release)
    }

    /// Next free version: highest known version with the patch incremented.
    /// Returns `v0.1.0` when the service has no version tags yet.
    pub async fn suggest_next_version(
        &self,
        service: &ServiceConfig,
    ) -> Result<VersionLabel, TagError> {
        let repo = Repository::for_service(self.config, service);
        let tags = self
            .vcs
            .list_tags(&repo)
            .await
            .map_err(|source| TagError::Git {
                service: service.name.clone(),
                source,
            })?;

        next_free_version(&tags).map_err(|latest| TagError::VersionsExhausted {
            service: service.name.clone(),
            latest,
        })
    }
}

/// Pick the next patch version above every parseable tag. Being above the
/// highest version, it is never taken. Errors with the highest version when
/// its patch component cannot grow.
pub fn next_free_version(tags: &[String]) -> Result<VersionLabel, VersionLabel> {
    let Some(latest) = tags
        .iter()
        .filter_map(|t| VersionLabel::parse(t).ok())
        .max()
    else {
        return Ok(VersionLabel::new(0, 1, 0));
    };

    latest.next_patch().ok_or(latest)
}
