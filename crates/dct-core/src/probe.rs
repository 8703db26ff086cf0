//! Health probes gating address resolution
//!
//! A probe receives a published address (`host:port`) and reports whether the
//! service behind it is ready. Failures are retried by the resolver until its
//! budget runs out.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    Failed(String),
}

pub type ProbeResult = std::result::Result<(), ProbeError>;

/// Readiness check for a published address
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, address: &str) -> ProbeResult;
}

/// `GET http://<address>/`, succeeding on any complete response regardless of status
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        // Published ports are local; a proxy from the environment would only get in the way
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, address: &str) -> ProbeResult {
        let response = self.client.get(format!("http://{}/", address)).send().await?;
        // Drain the body so a half-written response counts as a failure
        response.bytes().await?;
        Ok(())
    }
}

/// Opens a TCP connection and closes it immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn check(&self, address: &str) -> ProbeResult {
        let (host, port) = split_host_port(address)?;
        let stream = TcpStream::connect((host, port)).await?;
        drop(stream);
        Ok(())
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts (`[::]:8080`)
pub fn split_host_port(address: &str) -> std::result::Result<(&str, u16), ProbeError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ProbeError::InvalidAddress(address.to_string()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| ProbeError::InvalidAddress(address.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ProbeError::InvalidAddress(address.to_string()));
    }
    Ok((host, port))
}

/// Probe backed by an async closure
pub struct FnProbe<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    async fn check(&self, address: &str) -> ProbeResult {
        (self.f)(address.to_string()).await
    }
}

/// Wrap an async closure as a [`HealthProbe`]
///
/// ```ignore
/// let probe = probe_fn(|address| async move {
///     redis_ping(&address).await.map_err(|e| ProbeError::Failed(e.to_string()))
/// });
/// ```
pub fn probe_fn<F, Fut>(f: F) -> Arc<dyn HealthProbe>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    Arc::new(FnProbe { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Address of a port nothing listens on
    async fn closed_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        address
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("0.0.0.0:49153").unwrap(), ("0.0.0.0", 49153));
        assert_eq!(split_host_port("[::]:8080").unwrap(), ("::", 8080));
        assert!(split_host_port("localhost").is_err());
        assert!(split_host_port("localhost:http").is_err());
        assert!(split_host_port(":80").is_err());
    }

    #[tokio::test]
    async fn test_tcp_probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        TcpProbe.check(&address).await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_probe_fails_when_closed() {
        let address = closed_address().await;
        let err = TcpProbe.check(&address).await.unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }

    #[tokio::test]
    async fn test_http_probe_accepts_any_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        HttpProbe::new().check(&address).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_probe_fails_when_closed() {
        let address = closed_address().await;
        let err = HttpProbe::new().check(&address).await.unwrap_err();
        assert!(matches!(err, ProbeError::Http(_)));
    }

    #[tokio::test]
    async fn test_probe_fn_receives_address() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let probe = probe_fn(move |address| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                if address == "db:5432" {
                    Ok(())
                } else {
                    Err(ProbeError::Failed(format!("unexpected {}", address)))
                }
            }
        });

        probe.check("db:5432").await.unwrap();
        assert!(probe.check("db:5433").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
