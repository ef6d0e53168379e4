// ABOUTME: Test support utilities.
// ABOUTME: In-memory git, registry, compose, and probe fakes plus an on-disk project fixture.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use skipper::compose::{ComposeError, ComposeOps, EnvOverrides, ServiceState};
use skipper::config::Config;
use skipper::health::{HealthProbe, ProbeError};
use skipper::registry::{Registry, RegistryError, ResolvedImage};
use skipper::release::{Backends, ReleaseController};
use skipper::store::EnvStore;
use skipper::types::{CommitId, ImageRef};
use skipper::vcs::{GitError, Repository, SourceControl};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("skipper=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const CONFIG_YAML: &str = r#"
env_file: .env
state_dir: .skipper

verify:
  timeout: 2m
  initial_delay: 1s
  max_interval: 10s

release:
  lock_wait: 1s

services:
  - name: langgraph
    image: ghcr.io/acme/langgraph
    repo:
      path: repos/langgraph
    healthcheck:
      url: http://langgraph.test/ok
      attempts: 3
      interval: 1s
      timeout: 1s
      start_period: 0s
  - name: mcpserver
    image: ghcr.io/acme/mcpserver
    repo:
      path: repos/mcpserver
    healthcheck:
      url: http://mcpserver.test/ok
      attempts: 3
      interval: 1s
      timeout: 1s
      start_period: 0s
"#;

pub const ENV_FILE: &str = "# production stack\nPOSTGRES_PASSWORD=\"s3cret\"\nLANGGRAPH_IMAGE=ghcr.io/acme/langgraph:v1.0.0\nMCPSERVER_IMAGE=ghcr.io/acme/mcpserver:v0.4.0\n";

/// A project directory with skipper.yml and an env file.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(CONFIG_YAML)
    }

    pub fn with_config(yaml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("skipper.yml"), yaml).unwrap();
        std::fs::write(dir.path().join(".env"), ENV_FILE).unwrap();
        let config = Config::load(&dir.path().join("skipper.yml")).unwrap();
        Self { dir, config }
    }

    pub fn env_contents(&self) -> String {
        std::fs::read_to_string(self.config.env_file_path()).unwrap()
    }

    pub fn open_store(&self) -> Arc<EnvStore> {
        Arc::new(EnvStore::open(&self.config).unwrap())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.config.state_dir_path()
    }
}

pub fn image(s: &str) -> ImageRef {
    ImageRef::parse(s).unwrap()
}

// =============================================================================
// Source control
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct FakeRepo {
    pub head: String,
    pub local: HashMap<String, String>,
    pub remote: HashMap<String, String>,
    pub pushes: Vec<String>,
}

/// In-memory git keyed by the repository directory name (e.g. `langgraph`).
#[derive(Default)]
pub struct FakeGit {
    repos: Mutex<HashMap<String, FakeRepo>>,
    unreachable: Mutex<BTreeSet<String>>,
}

impl FakeGit {
    pub fn new() -> Self {
        let git = Self::default();
        git.set_head("langgraph", "1111111111111111111111111111111111111111");
        git.set_head("mcpserver", "2222222222222222222222222222222222222222");
        git
    }

    fn key(repo: &Repository) -> String {
        repo.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn set_head(&self, repo: &str, sha: &str) {
        self.repos.lock().entry(repo.to_string()).or_default().head = sha.to_string();
    }

    pub fn head(&self, repo: &str) -> String {
        self.repos.lock()[repo].head.clone()
    }

    pub fn add_remote_tag(&self, repo: &str, tag: &str, sha: &str) {
        self.repos
            .lock()
            .entry(repo.to_string())
            .or_default()
            .remote
            .insert(tag.to_string(), sha.to_string());
    }

    pub fn add_local_tag(&self, repo: &str, tag: &str, sha: &str) {
        self.repos
            .lock()
            .entry(repo.to_string())
            .or_default()
            .local
            .insert(tag.to_string(), sha.to_string());
    }

    pub fn repo(&self, repo: &str) -> FakeRepo {
        self.repos.lock().get(repo).cloned().unwrap_or_default()
    }

    pub fn make_unreachable(&self, repo: &str) {
        self.unreachable.lock().insert(repo.to_string());
    }

    fn check_reachable(&self, key: &str) -> Result<(), GitError> {
        if self.unreachable.lock().contains(key) {
            return Err(GitError::CommandFailed {
                command: "git ls-remote".to_string(),
                stderr: "fatal: could not read from remote repository".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceControl for FakeGit {
    async fn resolve_ref(&self, repo: &Repository) -> Result<CommitId, GitError> {
        Ok(CommitId::new(self.repo(&Self::key(repo)).head))
    }

    async fn local_tag(&self, repo: &Repository, tag: &str) -> Result<Option<CommitId>, GitError> {
        Ok(self
            .repo(&Self::key(repo))
            .local
            .get(tag)
            .map(|sha| CommitId::new(sha.clone())))
    }

    async fn remote_tag(
        &self,
        repo: &Repository,
        tag: &str,
    ) -> Result<Option<CommitId>, GitError> {
        let key = Self::key(repo);
        self.check_reachable(&key)?;
        Ok(self
            .repo(&key)
            .remote
            .get(tag)
            .map(|sha| CommitId::new(sha.clone())))
    }

    async fn list_tags(&self, repo: &Repository) -> Result<Vec<String>, GitError> {
        let key = Self::key(repo);
        self.check_reachable(&key)?;
        let state = self.repo(&key);
        let tags: BTreeSet<String> = state
            .local
            .keys()
            .chain(state.remote.keys())
            .cloned()
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn create_tag(
        &self,
        repo: &Repository,
        tag: &str,
        commit: &CommitId,
    ) -> Result<(), GitError> {
        let mut repos = self.repos.lock();
        let state = repos.entry(Self::key(repo)).or_default();
        if state.local.contains_key(tag) {
            return Err(GitError::CommandFailed {
                command: format!("git tag {tag}"),
                stderr: format!("fatal: tag '{tag}' already exists"),
            });
        }
        state.local.insert(tag.to_string(), commit.to_string());
        Ok(())
    }

    async fn push_tag(&self, repo: &Repository, tag: &str) -> Result<(), GitError> {
        let key = Self::key(repo);
        self.check_reachable(&key)?;
        let mut repos = self.repos.lock();
        let state = repos.entry(key).or_default();
        let sha = state
            .local
            .get(tag)
            .cloned()
            .ok_or_else(|| GitError::CommandFailed {
                command: format!("git push {tag}"),
                stderr: "src refspec does not match any".to_string(),
            })?;
        state.remote.insert(tag.to_string(), sha);
        state.pushes.push(tag.to_string());
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Clone)]
struct Published {
    digest: Option<String>,
    /// Lookups that report "not found" before the image appears.
    hidden_for: u32,
}

/// In-memory registry keyed by `repository:tag`.
#[derive(Default)]
pub struct FakeRegistry {
    images: Mutex<HashMap<String, Published>>,
    lookups: Mutex<HashMap<String, u32>>,
    failing: Mutex<bool>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, image: &str, digest: &str) {
        self.publish_after(image, digest, 0);
    }

    /// Publish an image that only shows up after `polls` lookups.
    pub fn publish_after(&self, image: &str, digest: &str, polls: u32) {
        self.images.lock().insert(
            image.to_string(),
            Published {
                digest: Some(digest.to_string()),
                hidden_for: polls,
            },
        );
    }

    pub fn publish_without_digest(&self, image: &str) {
        self.images.lock().insert(
            image.to_string(),
            Published {
                digest: None,
                hidden_for: 0,
            },
        );
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn lookups(&self, image: &str) -> u32 {
        self.lookups.lock().get(image).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn resolve(&self, image: &ImageRef) -> Result<Option<ResolvedImage>, RegistryError> {
        let key = image.unpinned().to_string();
        let count = {
            let mut lookups = self.lookups.lock();
            let count = lookups.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if *self.failing.lock() {
            return Err(RegistryError::Unavailable("503 Service Unavailable".to_string()));
        }

        Ok(self
            .images
            .lock()
            .get(&key)
            .filter(|p| count > p.hidden_for)
            .map(|p| ResolvedImage {
                reference: image.unpinned(),
                digest: p.digest.clone(),
            }))
    }
}

// =============================================================================
// Compose
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeCall {
    Pull(Vec<String>, EnvOverrides),
    Up(Vec<String>, EnvOverrides),
}

/// Records compose calls; containers are running unless told otherwise.
#[derive(Default)]
pub struct FakeCompose {
    calls: Mutex<Vec<ComposeCall>>,
    fail_pull: Mutex<bool>,
    fail_up: Mutex<bool>,
    stopped: Mutex<BTreeSet<String>>,
    /// Image each service currently runs, as seen through env overrides.
    running: Mutex<HashMap<String, String>>,
}

impl FakeCompose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_pull(&self, fail: bool) {
        *self.fail_pull.lock() = fail;
    }

    pub fn fail_up(&self, fail: bool) {
        *self.fail_up.lock() = fail;
    }

    pub fn stop(&self, service: &str) {
        self.stopped.lock().insert(service.to_string());
    }

    pub fn calls(&self) -> Vec<ComposeCall> {
        self.calls.lock().clone()
    }

    pub fn ups(&self) -> Vec<(Vec<String>, EnvOverrides)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ComposeCall::Up(services, env) => Some((services, env)),
                ComposeCall::Pull(..) => None,
            })
            .collect()
    }

    /// Image a service was last recreated with.
    pub fn running_image(&self, service: &str) -> Option<String> {
        self.running.lock().get(service).cloned()
    }
}

fn env_key(service: &str) -> String {
    format!("{}_IMAGE", service.to_ascii_uppercase().replace('-', "_"))
}

#[async_trait]
impl ComposeOps for FakeCompose {
    async fn pull(&self, services: &[String], env: &EnvOverrides) -> Result<(), ComposeError> {
        self.calls
            .lock()
            .push(ComposeCall::Pull(services.to_vec(), env.clone()));
        if *self.fail_pull.lock() {
            return Err(ComposeError::CommandFailed {
                command: "docker compose pull".to_string(),
                stderr: "manifest unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn up(&self, services: &[String], env: &EnvOverrides) -> Result<(), ComposeError> {
        self.calls
            .lock()
            .push(ComposeCall::Up(services.to_vec(), env.clone()));
        if *self.fail_up.lock() {
            return Err(ComposeError::CommandFailed {
                command: "docker compose up".to_string(),
                stderr: "container exited".to_string(),
            });
        }
        let mut running = self.running.lock();
        for service in services {
            if let Some(image) = env.get(&env_key(service)) {
                running.insert(service.clone(), image.clone());
            }
        }
        Ok(())
    }

    async fn ps(&self, _env: &EnvOverrides) -> Result<Vec<ServiceState>, ComposeError> {
        let stopped = self.stopped.lock();
        Ok(["langgraph", "mcpserver", "postgres"]
            .iter()
            .map(|name| ServiceState {
                service: name.to_string(),
                state: if stopped.contains(*name) {
                    "exited".to_string()
                } else {
                    "running".to_string()
                },
                image: String::new(),
            })
            .collect())
    }
}

// =============================================================================
// Health probe
// =============================================================================

/// Healthy unless the URL was marked unhealthy.
#[derive(Default)]
pub struct FakeProbe {
    unhealthy: Mutex<BTreeSet<String>>,
    checks: Mutex<HashMap<String, u32>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unhealthy(&self, url: &str) {
        self.unhealthy.lock().insert(url.to_string());
    }

    pub fn checks(&self, url: &str) -> u32 {
        self.checks.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn check(&self, url: &str, _timeout: Duration) -> Result<(), ProbeError> {
        *self.checks.lock().entry(url.to_string()).or_insert(0) += 1;
        if self.unhealthy.lock().contains(url) {
            return Err(ProbeError::Status(503));
        }
        Ok(())
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub const LANGGRAPH_URL: &str = "http://langgraph.test/ok";
pub const MCPSERVER_URL: &str = "http://mcpserver.test/ok";

/// Fakes plus a controller over a fresh fixture.
pub struct Harness {
    pub fixture: Fixture,
    pub git: Arc<FakeGit>,
    pub registry: Arc<FakeRegistry>,
    pub compose: Arc<FakeCompose>,
    pub probe: Arc<FakeProbe>,
    pub store: Arc<EnvStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fixture(Fixture::new())
    }

    pub fn with_fixture(fixture: Fixture) -> Self {
        init_tracing();
        let store = fixture.open_store();
        Self {
            fixture,
            git: Arc::new(FakeGit::new()),
            registry: Arc::new(FakeRegistry::new()),
            compose: Arc::new(FakeCompose::new()),
            probe: Arc::new(FakeProbe::new()),
            store,
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            vcs: self.git.clone(),
            registry: self.registry.clone(),
            compose: self.compose.clone(),
            probe: self.probe.clone(),
        }
    }

    pub fn controller(&self) -> ReleaseController {
        ReleaseController::new(
            self.fixture.config.clone(),
            self.store.clone(),
            self.backends(),
        )
    }
}
