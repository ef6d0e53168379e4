// ABOUTME: Release version labels backed by semver.
// ABOUTME: Accepts "v1.2.3" or "1.2.3" and always renders the tag form "v1.2.3".

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionLabelError {
    #[error("version label cannot be empty")]
    Empty,

    #[error("invalid version label '{label}': {source}")]
    Invalid {
        label: String,
        source: semver::Error,
    },

    #[error("build metadata is not allowed in version label: {0}")]
    BuildMetadata(String),
}

/// A semver version used as a release label and git tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionLabel(Version);

impl VersionLabel {
    pub fn parse(input: &str) -> Result<Self, VersionLabelError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionLabelError::Empty);
        }

        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let version = Version::parse(bare).map_err(|source| VersionLabelError::Invalid {
            label: trimmed.to_string(),
            source,
        })?;

        // '+' is not valid in a registry tag
        if !version.build.is_empty() {
            return Err(VersionLabelError::BuildMetadata(trimmed.to_string()));
        }

        Ok(Self(version))
    }

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    pub fn version(&self) -> &Version {
        &self.0
    }

    /// Git tag and image tag name, e.g. `v1.0.1`.
    pub fn tag_name(&self) -> String {
        format!("v{}", self.0)
    }

    /// Next patch release. Pre-release identifiers are dropped. `None` once
    /// the patch component is exhausted.
    pub fn next_patch(&self) -> Option<Self> {
        let patch = self.0.patch.checked_add(1)?;
        Some(Self(Version::new(self.0.major, self.0.minor, patch)))
    }
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for VersionLabel {
    type Err = VersionLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        VersionLabel::parse(&value).map_err(serde::de::Error::custom)
    }
}
