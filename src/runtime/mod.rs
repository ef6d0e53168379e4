// ABOUTME: Container runtime detection and daemon connection.
// ABOUTME: Auto-detects Docker or Podman, or uses explicit config.

mod detection;
mod error;
mod types;

pub use detection::{DetectionError, detect_runtime};
pub use error::RuntimeError;
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};

use bollard::Docker;
use snafu::ResultExt;

/// Connect to the daemon API behind a detected runtime socket.
/// Podman serves the Docker-compatible API on the same socket.
pub fn connect(info: &RuntimeInfo) -> Result<Docker, RuntimeError> {
    Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION).context(
        error::ConnectionSnafu {
            socket: info.socket_path.clone(),
        },
    )
}
