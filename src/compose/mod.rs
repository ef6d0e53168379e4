// ABOUTME: Compose runtime abstraction: pull, restart, and inspect stack services.
// ABOUTME: Image overrides travel as environment variables, leaving the env file untouched.

mod cli;

pub use cli::ComposeCli;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Environment variables passed to the compose process, overriding the env file.
pub type EnvOverrides = BTreeMap<String, String>;

/// Errors from the compose runtime.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unreadable compose ps output: {0}")]
    Parse(String),
}

/// One container row from `compose ps`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceState {
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Image", default)]
    pub image: String,
}

impl ServiceState {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Operations on the compose-managed stack.
#[async_trait]
pub trait ComposeOps: Send + Sync {
    /// Pull images for the given compose services.
    async fn pull(&self, services: &[String], env: &EnvOverrides) -> Result<(), ComposeError>;

    /// Recreate the given compose services without touching their dependencies.
    async fn up(&self, services: &[String], env: &EnvOverrides) -> Result<(), ComposeError>;

    /// Container states for the whole stack.
    async fn ps(&self, env: &EnvOverrides) -> Result<Vec<ServiceState>, ComposeError>;
}

/// Parse `compose ps --format json` output. Newer compose releases print one
/// object per line, older ones a single array.
pub fn parse_ps_output(output: &str) -> Result<Vec<ServiceState>, ComposeError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| ComposeError::Parse(e.to_string()));
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| ComposeError::Parse(e.to_string())))
        .collect()
}
