// ABOUTME: SourceControl implementation backed by the system git binary.
// ABOUTME: Runs plumbing commands with an isolated, non-interactive environment.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Output;
use tokio::process::Command;

use super::{GitError, Repository, SourceControl};
use crate::types::CommitId;

/// Git backend using the `git` executable.
#[derive(Debug, Default, Clone)]
pub struct SystemGit;

impl SystemGit {
    pub fn new() -> Self {
        Self
    }

    /// Build a git command rooted at the repository with prompts disabled.
    fn git_cmd(repo: &Repository) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&repo.path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .kill_on_drop(true);
        cmd
    }

    async fn run(repo: &Repository, args: &[&str]) -> Result<Output, GitError> {
        tracing::debug!(repo = %repo.path.display(), "git {}", args.join(" "));
        let output = Self::git_cmd(repo).args(args).output().await?;
        Ok(output)
    }

    async fn run_checked(repo: &Repository, args: &[&str]) -> Result<String, GitError> {
        let output = Self::run(repo, args).await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl SourceControl for SystemGit {
    async fn resolve_ref(&self, repo: &Repository) -> Result<CommitId, GitError> {
        let spec = format!("{}^{{commit}}", repo.git_ref);
        let sha = Self::run_checked(repo, &["rev-parse", "--verify", &spec]).await?;
        Ok(CommitId::new(sha))
    }

    async fn local_tag(&self, repo: &Repository, tag: &str) -> Result<Option<CommitId>, GitError> {
        let spec = format!("refs/tags/{}^{{commit}}", tag);
        let output = Self::run(repo, &["rev-parse", "-q", "--verify", &spec]).await?;
        if !output.status.success() {
            // rev-parse -q exits non-zero without output for a missing ref
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(CommitId::new(sha)))
    }

    async fn remote_tag(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<CommitId>, GitError> {
        let direct = format!("refs/tags/{}", tag);
        let peeled = format!("refs/tags/{}^{{}}", tag);
        let stdout =
            Self::run_checked(repo, &["ls-remote", "--tags", &repo.remote, &direct]).await?;
        Ok(parse_ls_remote(&stdout, &direct, &peeled))
    }

    async fn list_tags(&self, repo: &Repository) -> Result<Vec<String>, GitError> {
        let mut tags = BTreeSet::new();

        let local = Self::run_checked(repo, &["tag", "--list"]).await?;
        tags.extend(local.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from));

        let remote =
            Self::run_checked(repo, &["ls-remote", "--tags", "--refs", &repo.remote]).await?;
        for line in remote.lines() {
            if let Some((_, reference)) = line.split_once('\t')
                && let Some(name) = reference.strip_prefix("refs/tags/")
            {
                tags.insert(name.to_string());
            }
        }

        Ok(tags.into_iter().collect())
    }

    async fn create_tag(
        &self,
        repo: &Repository,
        tag: &str,
        commit: &CommitId,
    ) -> Result<(), GitError> {
        Self::run_checked(repo, &["tag", tag, commit.as_str()]).await?;
        Ok(())
    }

    async fn push_tag(&self, repo: &Repository, tag: &str) -> Result<(), GitError> {
        let refspec = format!("refs/tags/{0}:refs/tags/{0}", tag);
        Self::run_checked(repo, &["push", &repo.remote, &refspec]).await?;
        Ok(())
    }
}

/// Pick the commit for a tag from `git ls-remote` output. Annotated tags are
/// listed twice; the peeled (`^{}`) line names the commit.
fn parse_ls_remote(stdout: &str, direct: &str, peeled: &str) -> Option<CommitId> {
    let mut direct_sha = None;
    for line in stdout.lines() {
        let Some((sha, reference)) = line.split_once('\t') else {
            continue;
        };
        if reference == peeled {
            return Some(CommitId::new(sha.trim()));
        }
        if reference == direct {
            direct_sha = Some(CommitId::new(sha.trim()));
        }
    }
    direct_sha
}
