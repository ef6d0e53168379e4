// ABOUTME: Container registry access and artifact availability polling.
// ABOUTME: Registry trait plus the daemon-backed client and the verifier.

mod client;
mod verify;

pub use client::{DaemonRegistry, Registry, RegistryError, ResolvedImage};
pub use verify::{ArtifactVerifier, PollPolicy, VerifyError};
