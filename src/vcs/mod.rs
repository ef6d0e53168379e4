// ABOUTME: Source-control remote abstraction used by the tag manager.
// ABOUTME: Exposes tag lookup, creation, and push; SystemGit shells out to git.

mod system_git;

pub use system_git::SystemGit;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::{Config, ServiceConfig};
use crate::types::CommitId;

/// A service's source repository as seen by git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Local checkout.
    pub path: PathBuf,
    /// Remote that receives tags.
    pub remote: String,
    /// Ref to tag.
    pub git_ref: String,
}

impl Repository {
    pub fn for_service(config: &Config, service: &ServiceConfig) -> Self {
        Self {
            path: config.repo_path(service),
            remote: service.repo.remote.clone(),
            git_ref: service.repo.git_ref.clone(),
        }
    }
}

/// Source-control operations the tag manager needs.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Resolve the repository's configured ref to a commit.
    async fn resolve_ref(&self, repo: &Repository) -> Result<CommitId, GitError>;

    /// Commit a local tag points at, if the tag exists locally.
    async fn local_tag(&self, repo: &Repository, tag: &str) -> Result<Option<CommitId>, GitError>;

    /// Commit a tag points at on the remote, if the tag exists there.
    async fn remote_tag(&self, repo: &Repository, tag: &str)
    -> Result<Option<CommitId>, GitError>;

    /// All tag names known locally or on the remote.
    async fn list_tags(&self, repo: &Repository) -> Result<Vec<String>, GitError>;

    /// Create a tag at the given commit. Never moves an existing tag.
    async fn create_tag(
        &self,
        repo: &Repository,
        tag: &str,
        commit: &CommitId,
    ) -> Result<(), GitError>;

    /// Push a single tag to the remote.
    async fn push_tag(&self, repo: &Repository, tag: &str) -> Result<(), GitError>;
}

/// Errors from git operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected git output from {command}: {output}")]
    UnexpectedOutput { command: String, output: String },
}
