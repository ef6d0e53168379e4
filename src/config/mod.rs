// ABOUTME: Configuration types and parsing for skipper.yml.
// ABOUTME: Handles YAML parsing, discovery, defaults, and path resolution.

mod deserialize;
mod healthcheck;
mod init;
mod service;

pub use healthcheck::HealthcheckConfig;
pub use init::init_config;
pub use service::{RepoConfig, ServiceConfig};

use crate::error::{Error, Result};
use crate::runtime::{RuntimeConfig, RuntimeType};
use crate::types::ServiceName;
use deserialize::deserialize_services;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "skipper.yml";
pub const CONFIG_FILENAME_ALT: &str = "skipper.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".skipper/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_services")]
    pub services: NonEmpty<ServiceConfig>,

    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub registry: Option<RegistryConfig>,

    /// Directory the config was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeConfig {
    #[serde(default = "default_compose_file")]
    pub file: PathBuf,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    #[serde(default)]
    pub socket: Option<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            file: default_compose_file(),
            project: None,
            runtime: None,
            socket: None,
        }
    }
}

impl ComposeConfig {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            runtime: self.runtime,
            socket: self.socket.clone(),
        }
    }
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

/// Artifact verification polling.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_verify_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout: default_verify_timeout(),
            initial_delay: default_initial_delay(),
            max_interval: default_max_interval(),
        }
    }
}

fn default_verify_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseConfig {
    /// Retry a conflicting tag with the next free patch version.
    #[serde(default)]
    pub auto_bump: bool,

    /// How long a batch waits for another batch's deploy lock.
    #[serde(default = "default_lock_wait", with = "humantime_serde")]
    pub lock_wait: Duration,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            auto_bump: false,
            lock_wait: default_lock_wait(),
        }
    }
}

fn default_lock_wait() -> Duration {
    Duration::from_secs(10 * 60)
}

/// Registry credentials. The token itself is never stored in config, only the
/// name of the environment variable that carries it.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub username: String,
    pub token_env: String,
    #[serde(default)]
    pub server: Option<String>,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".skipper")
}

fn default_history_limit() -> usize {
    50
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        // .skipper/config.yml lives one level below the project root
        if config.base_dir.ends_with(".skipper")
            && let Some(root) = config.base_dir.parent()
        {
            config.base_dir = root.to_path_buf();
        }
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Resolve a possibly relative path against the config directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn env_file_path(&self) -> PathBuf {
        self.resolve(&self.env_file)
    }

    pub fn state_dir_path(&self) -> PathBuf {
        self.resolve(&self.state_dir)
    }

    pub fn compose_file_path(&self) -> PathBuf {
        self.resolve(&self.compose.file)
    }

    pub fn repo_path(&self, service: &ServiceConfig) -> PathBuf {
        self.resolve(&service.repo.path)
    }

    pub fn service(&self, name: &ServiceName) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| &s.name == name)
    }

    /// Look up a service by its raw name.
    pub fn service_named(&self, name: &str) -> Result<&ServiceConfig> {
        self.services
            .iter()
            .find(|s| s.name.as_str() == name)
            .ok_or_else(|| Error::UnknownService(name.to_string()))
    }

    pub fn template() -> Self {
        let langgraph = ServiceName::new("langgraph").expect("valid template name");
        let mcpserver = ServiceName::new("mcpserver").expect("valid template name");

        let service = |name: ServiceName, image: &str, port: u16| ServiceConfig {
            image: crate::types::ImageRef::parse(image).expect("valid template image"),
            repo: RepoConfig::new(format!("../{}", name)),
            env_key: None,
            compose_service: None,
            healthcheck: Some(HealthcheckConfig::new(format!(
                "http://localhost:{}/ok",
                port
            ))),
            name,
        };

        Config {
            services: NonEmpty {
                head: service(langgraph, "ghcr.io/my-org/langgraph", 8123),
                tail: vec![service(mcpserver, "ghcr.io/my-org/mcpserver", 8000)],
            },
            env_file: default_env_file(),
            state_dir: default_state_dir(),
            history_limit: default_history_limit(),
            compose: ComposeConfig::default(),
            verify: VerifyConfig::default(),
            release: ReleaseConfig::default(),
            registry: None,
            base_dir: PathBuf::new(),
        }
    }
}
