// ABOUTME: Environment config store: versioned service -> image snapshots.
// ABOUTME: Stages, commits, and rolls back snapshots; persists the env file atomically.

mod envfile;
mod snapshot;

pub use envfile::EnvFile;
pub use snapshot::{EnvironmentSnapshot, Revision};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::types::{ImageRef, ServiceName};

const STATE_FILE: &str = "environment.json";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("failed to access {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("corrupt store state {}: {source}", path.display()))]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("unknown revision {revision}"))]
    UnknownRevision { revision: Revision },

    #[snafu(display("unknown service {service}"))]
    UnknownService { service: ServiceName },

    #[snafu(display("snapshot {revision} was staged on {base:?} but revision {active} is active"))]
    StaleBase {
        revision: Revision,
        base: Option<Revision>,
        active: Revision,
    },

    #[snafu(display("snapshot {revision} is not newer than committed revision {latest}"))]
    StaleRevision { revision: Revision, latest: Revision },
}

/// Persisted store state: committed history plus the revision counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreState {
    active: Revision,
    next_revision: Revision,
    committed: Vec<EnvironmentSnapshot>,
}

impl StoreState {
    fn snapshot(&self, revision: Revision) -> Option<&EnvironmentSnapshot> {
        self.committed.iter().find(|s| s.revision == revision)
    }

    fn active_snapshot(&self) -> Result<&EnvironmentSnapshot, StoreError> {
        self.snapshot(self.active).ok_or(StoreError::UnknownRevision {
            revision: self.active,
        })
    }

    fn latest(&self) -> Revision {
        self.committed
            .iter()
            .map(|s| s.revision)
            .max()
            .unwrap_or(self.active)
    }

    fn prune(&mut self, limit: usize) {
        let limit = limit.max(1);
        while self.committed.len() > limit {
            let Some(oldest) = self
                .committed
                .iter()
                .position(|s| s.revision != self.active)
            else {
                break;
            };
            self.committed.remove(oldest);
        }
    }
}

/// Versioned store for the environment file's image entries.
pub struct EnvStore {
    env_path: PathBuf,
    state_path: PathBuf,
    /// Env-file key for each managed service.
    keys: BTreeMap<ServiceName, String>,
    history_limit: usize,
    lock: Mutex<()>,
}

impl EnvStore {
    /// Open the store described by `config`, importing the env file as the
    /// first revision when no history exists yet.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let state_dir = config.state_dir_path();
        std::fs::create_dir_all(&state_dir).context(IoSnafu { path: &state_dir })?;

        let store = Self {
            env_path: config.env_file_path(),
            state_path: state_dir.join(STATE_FILE),
            keys: config
                .services
                .iter()
                .map(|s| (s.name.clone(), s.env_key()))
                .collect(),
            history_limit: config.history_limit,
            lock: Mutex::new(()),
        };

        let _guard = store.lock.lock();
        if !store.state_path.exists() {
            let baseline = store.import_env_file()?;
            tracing::info!(
                path = %store.env_path.display(),
                services = baseline.images.len(),
                "imported environment file as revision 1"
            );
            store.save_state(&StoreState {
                active: baseline.revision,
                next_revision: baseline.revision.next(),
                committed: vec![baseline],
            })?;
        }
        drop(_guard);

        Ok(store)
    }

    pub fn env_path(&self) -> &Path {
        &self.env_path
    }

    /// The currently active committed snapshot.
    pub fn active(&self) -> Result<EnvironmentSnapshot, StoreError> {
        let _guard = self.lock.lock();
        let state = self.load_state()?;
        state.active_snapshot().cloned()
    }

    /// A committed snapshot by revision.
    pub fn get(&self, revision: Revision) -> Result<EnvironmentSnapshot, StoreError> {
        let _guard = self.lock.lock();
        let state = self.load_state()?;
        state
            .snapshot(revision)
            .cloned()
            .ok_or(StoreError::UnknownRevision { revision })
    }

    /// Committed snapshots, oldest first.
    pub fn history(&self) -> Result<Vec<EnvironmentSnapshot>, StoreError> {
        let _guard = self.lock.lock();
        let mut committed = self.load_state()?.committed;
        committed.sort_by_key(|s| s.revision);
        Ok(committed)
    }

    /// Build a new snapshot from the committed snapshot at `base` with
    /// `changes` applied. Nothing is activated.
    pub fn stage(
        &self,
        base: Revision,
        changes: &BTreeMap<ServiceName, ImageRef>,
    ) -> Result<EnvironmentSnapshot, StoreError> {
        let _guard = self.lock.lock();
        let mut state = self.load_state()?;

        if let Some(service) = changes.keys().find(|s| !self.keys.contains_key(*s)) {
            return UnknownServiceSnafu {
                service: service.clone(),
            }
            .fail();
        }

        let mut images = state
            .snapshot(base)
            .ok_or(StoreError::UnknownRevision { revision: base })?
            .images
            .clone();
        images.extend(changes.iter().map(|(s, i)| (s.clone(), i.clone())));

        let revision = state.next_revision;
        state.next_revision = revision.next();
        self.save_state(&state)?;

        tracing::debug!(revision = %revision, base = %base, "staged snapshot");
        Ok(EnvironmentSnapshot {
            revision,
            base: Some(base),
            images,
            created_at: Utc::now(),
        })
    }

    /// Make a staged snapshot active. Either the env file and history both
    /// reflect `snapshot`, or neither changes.
    pub fn commit(&self, snapshot: &EnvironmentSnapshot) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut state = self.load_state()?;

        if snapshot.base != Some(state.active) {
            return StaleBaseSnafu {
                revision: snapshot.revision,
                base: snapshot.base,
                active: state.active,
            }
            .fail();
        }
        let latest = state.latest();
        if snapshot.revision <= latest {
            return StaleRevisionSnafu {
                revision: snapshot.revision,
                latest,
            }
            .fail();
        }

        state.committed.push(snapshot.clone());
        state.active = snapshot.revision;
        if state.next_revision <= snapshot.revision {
            state.next_revision = snapshot.revision.next();
        }
        state.prune(self.history_limit);

        self.apply(snapshot, &state)?;
        tracing::info!(revision = %snapshot.revision, "committed snapshot");
        Ok(())
    }

    /// Re-activate a committed snapshot.
    pub fn rollback(&self, to: Revision) -> Result<EnvironmentSnapshot, StoreError> {
        let _guard = self.lock.lock();
        let mut state = self.load_state()?;

        let target = state
            .snapshot(to)
            .cloned()
            .ok_or(StoreError::UnknownRevision { revision: to })?;
        let from = state.active;
        state.active = to;

        self.apply(&target, &state)?;
        tracing::info!(from = %from, to = %to, "rolled back snapshot");
        Ok(target)
    }

    /// Write the env file for `snapshot`, then the history. A failed history
    /// write restores the previous env file.
    fn apply(&self, snapshot: &EnvironmentSnapshot, state: &StoreState) -> Result<(), StoreError> {
        let previous = self.read_env_file()?;
        let mut file = EnvFile::parse(&previous);
        let mut changed = false;
        for (service, key) in &self.keys {
            changed |= match snapshot.images.get(service) {
                Some(image) => file.set(key, &image.to_string()),
                None => file.remove(key),
            };
        }

        if changed {
            write_atomic(&self.env_path, file.render().as_bytes())?;
        }

        if let Err(e) = self.save_state(state) {
            if changed && let Err(restore) = write_atomic(&self.env_path, previous.as_bytes()) {
                tracing::error!(error = %restore, "failed to restore environment file");
            }
            return Err(e);
        }
        Ok(())
    }

    fn import_env_file(&self) -> Result<EnvironmentSnapshot, StoreError> {
        let file = EnvFile::parse(&self.read_env_file()?);
        let mut images = BTreeMap::new();
        for (service, key) in &self.keys {
            let Some(value) = file.get(key) else {
                continue;
            };
            match ImageRef::parse(value) {
                Ok(image) => {
                    images.insert(service.clone(), image);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "ignoring unparseable image entry");
                }
            }
        }

        Ok(EnvironmentSnapshot {
            revision: Revision::INITIAL,
            base: None,
            images,
            created_at: Utc::now(),
        })
    }

    fn read_env_file(&self) -> Result<String, StoreError> {
        match std::fs::read_to_string(&self.env_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StoreError::Io {
                path: self.env_path.clone(),
                source,
            }),
        }
    }

    fn load_state(&self) -> Result<StoreState, StoreError> {
        let content =
            std::fs::read_to_string(&self.state_path).context(IoSnafu { path: &self.state_path })?;
        serde_json::from_str(&content).context(JsonSnafu {
            path: &self.state_path,
        })
    }

    fn save_state(&self, state: &StoreState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state).context(JsonSnafu {
            path: &self.state_path,
        })?;
        write_atomic(&self.state_path, &json)
    }
}

/// Write `data` to a temp file beside `path`, fsync it, and rename it into place.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).context(IoSnafu { path: &dir })?;
    tmp.write_all(data).context(IoSnafu { path })?;
    tmp.as_file().sync_all().context(IoSnafu { path })?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .context(IoSnafu { path })?;
    Ok(())
}
