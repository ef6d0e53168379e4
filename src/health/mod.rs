// ABOUTME: HTTP health probes for deployed services.
// ABOUTME: A probe passes when the endpoint answers 2xx within the timeout.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::Uri;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

/// Why a probe did not pass.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid health check url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("compose service {0} is not running")]
    NotRunning(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("unhealthy status {0}")]
    Status(u16),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// A single health check against a URL.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, url: &str, timeout: Duration) -> Result<(), ProbeError>;
}

/// Plain-HTTP GET probe over a fresh HTTP/1 connection.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }

    async fn get(&self, url: &str) -> Result<(), ProbeError> {
        let target = HttpTarget::parse(url)?;

        let stream = TcpStream::connect(&target.addr)
            .await
            .map_err(|source| ProbeError::Connect {
                addr: target.addr.clone(),
                source,
            })?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "health probe connection closed");
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(&target.path)
            .header("Host", &target.host)
            .header("User-Agent", concat!("skipper/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Other(format!("failed to build request: {e}")))?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, url: &str, timeout: Duration) -> Result<(), ProbeError> {
        match tokio::time::timeout(timeout, self.get(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct HttpTarget {
    addr: String,
    host: String,
    path: String,
}

impl HttpTarget {
    fn parse(url: &str) -> Result<Self, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|_| invalid("not a valid URI"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// URLs are supported"));
        }
        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let port = authority.port_u16().unwrap_or(80);
        let host = authority.host();
        let path = uri
            .path_and_query()
            .map(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .unwrap_or("/");

        Ok(Self {
            addr: format!("{}:{}", host, port),
            host: authority.as_str().to_string(),
            path: path.to_string(),
        })
    }
}
