//! Probe traits and the built-in HTTP, TCP and static probes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Caller-supplied liveness logic.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self) -> bool;
}

/// One named readiness predicate.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self) -> bool;
}

/// Probe with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticProbe(pub bool);

impl StaticProbe {
    pub fn up() -> Self {
        Self(true)
    }

    pub fn down() -> Self {
        Self(false)
    }
}

#[async_trait]
impl LivenessProbe for StaticProbe {
    async fn is_alive(&self) -> bool {
        self.0
    }
}

#[async_trait]
impl ReadinessProbe for StaticProbe {
    async fn is_ready(&self) -> bool {
        self.0
    }
}

/// HTTP GET, passes on 2xx.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Single attempt; `Err` carries the reason.
    pub async fn get(&self) -> Result<(), String> {
        http_get(&self.client, &self.url, self.timeout).await
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn is_alive(&self) -> bool {
        self.get().await.is_ok()
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn is_ready(&self) -> bool {
        self.get().await.is_ok()
    }
}

/// TCP connect, passes when the handshake completes.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            timeout,
        }
    }

    pub async fn connect(&self) -> Result<(), String> {
        tcp_connect(&self.addr, self.timeout).await
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn is_alive(&self) -> bool {
        self.connect().await.is_ok()
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn is_ready(&self) -> bool {
        self.connect().await.is_ok()
    }
}

/// GET `url`, cancelled at `timeout`. No retries.
pub(crate) async fn http_get(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<(), String> {
    let request = client.get(url).timeout(timeout).send();
    match tokio::time::timeout(timeout, request).await {
        Err(_) => Err(format!("GET {} timed out after {:?}", url, timeout)),
        Ok(Err(e)) => {
            debug!(url, error = %e, "HTTP probe failed");
            Err(format!("GET {} failed: {}", url, e))
        }
        Ok(Ok(resp)) if resp.status().is_success() => Ok(()),
        Ok(Ok(resp)) => Err(format!("GET {} returned {}", url, resp.status())),
    }
}

/// Connect to `addr` within `timeout`.
pub(crate) async fn tcp_connect(addr: &str, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await {
        Err(_) => Err(format!("TCP {} timed out after {:?}", addr, timeout)),
        Ok(Err(e)) => Err(format!("TCP {} unreachable: {}", addr, e)),
        Ok(Ok(_)) => Ok(()),
    }
}
