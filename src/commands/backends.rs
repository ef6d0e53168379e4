// ABOUTME: Shared helper that wires the production backends for a config.
// ABOUTME: Detects the container runtime once and builds git, registry, compose, and probe clients.

use skipper::compose::ComposeCli;
use skipper::config::Config;
use skipper::error::Result;
use skipper::health::HttpProbe;
use skipper::output::Output;
use skipper::registry::DaemonRegistry;
use skipper::release::Backends;
use skipper::runtime::{self, RuntimeError, detect_runtime};
use skipper::vcs::SystemGit;
use std::sync::Arc;

/// Connect to the local container runtime and build every backend.
///
/// This handles the common pattern of:
/// 1. Detecting the runtime type and socket path
/// 2. Outputting progress messages
/// 3. Establishing the daemon connection
pub fn connect_backends(config: &Config, output: &Output) -> Result<Backends> {
    output.progress("  → Detecting runtime...");
    let runtime_info =
        detect_runtime(Some(&config.compose.runtime_config())).map_err(RuntimeError::from)?;

    output.progress(&format!(
        "  → Found {} at {}",
        runtime_info.runtime_type, runtime_info.socket_path
    ));

    let docker = runtime::connect(&runtime_info)?;

    Ok(Backends {
        vcs: Arc::new(SystemGit::new()),
        registry: Arc::new(DaemonRegistry::new(docker, config.registry.clone())),
        compose: Arc::new(ComposeCli::new(config, runtime_info.runtime_type)),
        probe: Arc::new(HttpProbe::new()),
    })
}
