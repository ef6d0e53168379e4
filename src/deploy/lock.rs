// ABOUTME: Deploy lock that serializes batches touching the same stack.
// ABOUTME: Uses atomic file creation in the state directory with holder info inside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::BatchId;

use super::DeployError;

const LOCK_FILE: &str = "deploy.lock";

/// How often a waiting batch re-checks the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// An empty lock file this young is still being written by its creator.
const LOCK_WRITE_GRACE: Duration = Duration::from_secs(5);

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Batch being deployed.
    pub batch: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(batch: &BatchId) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            batch: batch.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file inside a state directory.
    pub fn lock_path(state_dir: &Path) -> PathBuf {
        state_dir.join(LOCK_FILE)
    }

    /// The current lock holder, if any. Unreadable lock files count as unlocked.
    pub fn read(state_dir: &Path) -> Option<LockInfo> {
        let content = std::fs::read_to_string(Self::lock_path(state_dir)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// A held deploy lock that releases on drop.
pub struct DeployLock {
    path: PathBuf,
    batch: BatchId,
    released: bool,
}

impl std::fmt::Debug for DeployLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("path", &self.path)
            .field("batch", &self.batch)
            .finish()
    }
}

impl DeployLock {
    /// Acquire the deploy lock for `batch`.
    ///
    /// Uses create-new file semantics for atomic acquisition (no TOCTOU race).
    /// Returns `LockHeld` if another process holds the lock.
    /// Auto-breaks stale locks (>1 hour) with a warning; `force` breaks any lock.
    pub fn acquire(state_dir: &Path, batch: &BatchId, force: bool) -> Result<Self, DeployError> {
        std::fs::create_dir_all(state_dir).map_err(|e| {
            DeployError::lock_error(format!("failed to create state directory: {}", e))
        })?;
        let path = LockInfo::lock_path(state_dir);
        let lock_info = LockInfo::new(batch);

        if Self::try_create(&path, &lock_info)? {
            return Ok(Self::held(path, batch));
        }

        if !Self::check_existing_lock(&path, force)? {
            return match LockInfo::read(state_dir) {
                Some(existing) => Err(DeployError::lock_held(
                    existing.holder,
                    existing.pid,
                    existing.batch,
                    existing.started_at,
                )),
                None => Err(DeployError::lock_held(
                    "unknown".to_string(),
                    0,
                    "unknown".to_string(),
                    Utc::now(),
                )),
            };
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to break lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        if !Self::try_create(&path, &lock_info)? {
            return Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ));
        }
        Ok(Self::held(path, batch))
    }

    /// Acquire the lock, polling while another batch holds it for up to `wait`.
    pub async fn acquire_with_wait(
        state_dir: &Path,
        batch: &BatchId,
        force: bool,
        wait: Duration,
    ) -> Result<Self, DeployError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match Self::acquire(state_dir, batch, force) {
                Err(DeployError::LockHeld { holder, pid, .. })
                    if tokio::time::Instant::now() < deadline =>
                {
                    tracing::info!(holder = %holder, pid, "waiting for deploy lock");
                    let remaining = deadline - tokio::time::Instant::now();
                    tokio::time::sleep(LOCK_POLL_INTERVAL.min(remaining)).await;
                }
                other => return other,
            }
        }
    }

    fn held(path: PathBuf, batch: &BatchId) -> Self {
        Self {
            path,
            batch: batch.clone(),
            released: false,
        }
    }

    /// Create the lock file if absent. Returns false if it already exists.
    fn try_create(path: &Path, info: &LockInfo) -> Result<bool, DeployError> {
        let json = serde_json::to_string(info)
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to create lock {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| DeployError::lock_error(format!("failed to write lock: {}", e)))?;
        Ok(true)
    }

    /// Check if an existing lock should be broken (stale, forced, or corrupted).
    fn check_existing_lock(path: &Path, force: bool) -> Result<bool, DeployError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            // Released between our create attempt and this read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to read lock info: {}",
                    e
                )));
            }
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(existing_lock) => {
                if force {
                    tracing::warn!(
                        "Breaking lock held by {} (pid {}) since {}",
                        existing_lock.holder,
                        existing_lock.pid,
                        existing_lock.started_at
                    );
                    Ok(true)
                } else if existing_lock.is_stale() {
                    tracing::warn!(
                        "Auto-breaking stale lock held by {} (pid {}) since {}",
                        existing_lock.holder,
                        existing_lock.pid,
                        existing_lock.started_at
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(_) if !force && content.trim().is_empty() && Self::recently_created(path) => {
                tracing::debug!("Lock file is still being written, treating as held");
                Ok(false)
            }
            Err(_) => {
                tracing::warn!("Lock info corrupted, breaking lock");
                Ok(true)
            }
        }
    }

    fn recently_created(path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age < LOCK_WRITE_GRACE)
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), DeployError> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to release lock {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
