// ABOUTME: Environment snapshots: immutable service -> image mappings.
// ABOUTME: Revisions are monotonic and allocated by the store at stage time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{ImageRef, ServiceName};

/// Monotonic snapshot revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub const INITIAL: Revision = Revision(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Revision {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches(['r', 'R']).parse().map(Revision)
    }
}

/// The image every managed service should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub revision: Revision,
    /// Revision this snapshot was staged on; `None` for the imported baseline.
    pub base: Option<Revision>,
    pub images: BTreeMap<ServiceName, ImageRef>,
    pub created_at: DateTime<Utc>,
}

impl EnvironmentSnapshot {
    pub fn image(&self, service: &ServiceName) -> Option<&ImageRef> {
        self.images.get(service)
    }

    /// Services whose image differs from `previous`, including ones new to this snapshot.
    pub fn changed_from(&self, previous: &EnvironmentSnapshot) -> Vec<ServiceName> {
        self.images
            .iter()
            .filter(|(name, image)| previous.images.get(*name) != Some(*image))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
