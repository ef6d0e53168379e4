// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and daemon connection errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;

/// Unified runtime error for detection and connection failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("failed to connect to {socket}: {source}"))]
    Connection {
        socket: String,
        source: bollard::errors::Error,
    },
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}
