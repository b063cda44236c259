//! TCP transport implementation

use crate::error::{GnssError, GnssResult};
use crate::stream::{RxStream, Transport, TransportKind};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
        }
    }

    /// Create TCP settings with a read timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Some(timeout),
        }
    }
}

/// TCP transport to a receiver's IP port
///
/// Resolves the configured host name, connects to the first resolved
/// endpoint and disables Nagle coalescing: the receiver protocol is
/// latency-sensitive and small-message oriented. Connection failures are
/// reported once and returned; retry policy belongs to the caller.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
        }
    }

    /// Create a TCP transport from a `host:port` string
    pub fn from_address(address: &str) -> GnssResult<Self> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| GnssError::Config(format!("Invalid TCP address: {address}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| GnssError::Config(format!("Invalid TCP port in {address}: {e}")))?;
        Ok(Self::new(TcpSettings::new(host, port)))
    }

    async fn resolve(&self) -> GnssResult<SocketAddr> {
        let query = format!("{}:{}", self.settings.host, self.settings.port);
        let mut endpoints = lookup_host(&query).await.map_err(|e| {
            log::error!(
                "Could not resolve {} on port {}: {}",
                self.settings.host,
                self.settings.port,
                e
            );
            GnssError::Connection(e)
        })?;
        endpoints
            .next()
            .ok_or_else(|| GnssError::Config(format!("No endpoint resolved for {query}")))
    }

    fn stream_mut(&mut self) -> GnssResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            GnssError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> GnssResult<()> {
        // Re-connect drops any previous stream first.
        self.stream = None;

        let endpoint = self.resolve().await?;

        log::info!(
            "Connecting to tcp://{}:{}...",
            self.settings.host,
            self.settings.port
        );
        let stream = TcpStream::connect(endpoint).await.map_err(|e| {
            log::error!("Could not connect to {endpoint}: {e}");
            GnssError::Connection(e)
        })?;
        stream.set_nodelay(true).map_err(GnssError::Connection)?;

        log::info!("Connected to {endpoint}.");
        self.stream = Some(stream);
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }
}

#[async_trait]
impl RxStream for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> GnssResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> GnssResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        let n = if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.read(buf))
                .await
                .map_err(|_| GnssError::Timeout)?
                .map_err(GnssError::Connection)?
        } else {
            stream.read(buf).await.map_err(GnssError::Connection)?
        };
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> GnssResult<usize> {
        let stream = self.stream_mut()?;
        stream.write(buf).await.map_err(GnssError::Connection)
    }

    async fn flush(&mut self) -> GnssResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(GnssError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                log::warn!("TCP shutdown failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_address() {
        let transport = TcpTransport::from_address("192.168.3.1:28784").unwrap();
        assert_eq!(transport.settings.host, "192.168.3.1");
        assert_eq!(transport.settings.port, 28784);
        assert!(TcpTransport::from_address("no-port-here").is_err());
        assert!(TcpTransport::from_address("host:notanumber").is_err());
    }

    #[tokio::test]
    async fn test_connect_unresolvable_host_leaves_no_state() {
        let mut transport = TcpTransport::new(TcpSettings::new("nonexistent.invalid", 28784));
        assert!(transport.connect().await.is_err());
        assert!(transport.is_closed());
        // No partially constructed socket is observable afterwards.
        let mut buf = [0u8; 4];
        assert!(transport.read(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut peer, _) = listener.accept().await.unwrap();
            peer.write_all(b"$@receiver").await.unwrap();
            let mut cmd = [0u8; 4];
            peer.read_exact(&mut cmd).await.unwrap();
            cmd
        });

        let mut transport = TcpTransport::new(TcpSettings::new("127.0.0.1", addr.port()));
        transport.connect().await.unwrap();
        assert_eq!(transport.kind(), TransportKind::Tcp);
        assert!(!transport.is_closed());

        let mut buf = [0u8; 10];
        transport.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"$@receiver");

        transport.write_all(b"grc\r").await.unwrap();
        transport.flush().await.unwrap();
        assert_eq!(&server.await.unwrap(), b"grc\r");

        transport.close().await;
        assert!(transport.is_closed());
        // Second close must be a no-op.
        transport.close().await;
    }

    #[tokio::test]
    async fn test_reconnect_replaces_stream() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_a, _) = listener.accept().await.unwrap();
            let (_b, _) = listener.accept().await.unwrap();
        });

        let mut transport = TcpTransport::new(TcpSettings::new("127.0.0.1", addr.port()));
        transport.connect().await.unwrap();
        transport.connect().await.unwrap();
        assert!(!transport.is_closed());
        server.await.unwrap();
    }
}
