// ABOUTME: Registry client that resolves image tags to manifest digests.
// ABOUTME: DaemonRegistry asks the local Docker/Podman daemon via bollard.

use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;

use crate::config::RegistryConfig;
use crate::types::ImageRef;

/// A tag that exists in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub reference: ImageRef,
    /// Manifest digest, when the registry reports one.
    pub digest: Option<String>,
}

impl ResolvedImage {
    /// Digest-pinned reference when a digest is known, else the tag reference.
    pub fn pinned(&self) -> ImageRef {
        match &self.digest {
            Some(digest) => self.reference.pinned(digest),
            None => self.reference.clone(),
        }
    }
}

/// Errors talking to a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry credentials not available: environment variable {0} is not set")]
    MissingToken(String),

    #[error("registry request for {image} failed: {source}")]
    Request {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of a container registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Look up `image` (prefix plus tag). `Ok(None)` means the tag does not exist yet.
    async fn resolve(&self, image: &ImageRef) -> Result<Option<ResolvedImage>, RegistryError>;
}

/// Registry lookups through the container daemon's distribution endpoint.
pub struct DaemonRegistry {
    client: Docker,
    auth: Option<RegistryConfig>,
}

impl DaemonRegistry {
    pub fn new(client: Docker, auth: Option<RegistryConfig>) -> Self {
        Self { client, auth }
    }

    fn credentials(&self) -> Result<Option<DockerCredentials>, RegistryError> {
        let Some(auth) = &self.auth else {
            return Ok(None);
        };
        let token = std::env::var(&auth.token_env)
            .map_err(|_| RegistryError::MissingToken(auth.token_env.clone()))?;
        Ok(Some(DockerCredentials {
            username: Some(auth.username.clone()),
            password: Some(token),
            serveraddress: auth.server.clone(),
            ..Default::default()
        }))
    }
}

#[async_trait]
impl Registry for DaemonRegistry {
    async fn resolve(&self, image: &ImageRef) -> Result<Option<ResolvedImage>, RegistryError> {
        let name = image.to_string();
        let credentials = self.credentials()?;

        match self.client.inspect_registry_image(&name, credentials).await {
            Ok(inspect) => {
                let digest = inspect.descriptor.digest.filter(|d| !d.is_empty());
                tracing::debug!(image = %name, digest = ?digest, "registry manifest found");
                Ok(Some(ResolvedImage {
                    reference: image.unpinned(),
                    digest,
                }))
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(source) => Err(RegistryError::Request { image: name, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_uses_digest_when_known() {
        let resolved = ResolvedImage {
            reference: ImageRef::parse("ghcr.io/org/langgraph:v1.0.1").unwrap(),
            digest: Some("sha256:abc".to_string()),
        };
        assert_eq!(
            resolved.pinned().to_string(),
            "ghcr.io/org/langgraph:v1.0.1@sha256:abc"
        );
    }

    #[test]
    fn pinned_falls_back_to_tag() {
        let resolved = ResolvedImage {
            reference: ImageRef::parse("ghcr.io/org/langgraph:v1.0.1").unwrap(),
            digest: None,
        };
        assert_eq!(resolved.pinned().to_string(), "ghcr.io/org/langgraph:v1.0.1");
    }
}
