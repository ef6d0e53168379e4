// ABOUTME: Application-wide error types for skipper.
// ABOUTME: Uses thiserror for ergonomic error handling; wraps each module's error.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::DeployError;
use crate::registry::{RegistryError, VerifyError};
use crate::release::JournalError;
use crate::runtime::RuntimeError;
use crate::store::StoreError;
use crate::tag::TagError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid release request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
