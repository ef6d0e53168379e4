// ABOUTME: Per-service release configuration.
// ABOUTME: Image prefix, source repository, env-file key, compose name, health check.

use serde::Deserialize;
use std::path::PathBuf;

use super::HealthcheckConfig;
use super::deserialize::deserialize_image_prefix;
use crate::types::{ImageRef, ServiceName};

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: ServiceName,

    /// Registry repository without tag, e.g. `ghcr.io/acme/langgraph`.
    #[serde(deserialize_with = "deserialize_image_prefix")]
    pub image: ImageRef,

    pub repo: RepoConfig,

    #[serde(default)]
    pub env_key: Option<String>,

    #[serde(default)]
    pub compose_service: Option<String>,

    #[serde(default)]
    pub healthcheck: Option<HealthcheckConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    /// Local checkout of the service's source repository.
    pub path: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Ref that gets tagged; the runbook tags the current head.
    #[serde(default = "default_git_ref", rename = "ref")]
    pub git_ref: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_git_ref() -> String {
    "HEAD".to_string()
}

impl RepoConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remote: default_remote(),
            git_ref: default_git_ref(),
        }
    }
}

impl ServiceConfig {
    /// Key in the environment file holding this service's image reference.
    pub fn env_key(&self) -> String {
        self.env_key
            .clone()
            .unwrap_or_else(|| self.name.default_env_key())
    }

    /// Name of the service in the compose file.
    pub fn compose_service(&self) -> &str {
        self.compose_service
            .as_deref()
            .unwrap_or(self.name.as_str())
    }
}
