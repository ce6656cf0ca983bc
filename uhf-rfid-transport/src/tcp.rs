//! TCP transport

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{error::*, Transport};

/// Bytes of each transfer shown in trace logs
const TRACE_DUMP_LEN: usize = 32;

/// TCP client for readers running in network server mode
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use uhf_rfid_transport::{TcpTransport, Transport};
///
/// # async fn example() -> uhf_rfid_transport::Result<()> {
/// let mut transport = TcpTransport::new("192.168.1.178", 6000)
///     .with_connect_timeout(Duration::from_secs(3));
/// transport.connect().await?;
/// transport.send(&[0x52, 0x46, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x28]).await?;
/// let reply = transport.receive(1024).await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    host: String,
    port: u16,
    peer: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    poll_interval: Duration,
    keepalive: bool,
}

impl TcpTransport {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            peer: None,
            stream: None,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            keepalive: true,
        }
    }

    /// Give up on each candidate address after this long
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long one `receive` waits before returning empty-handed
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable TCP keepalive probes on the socket (on by default)
    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    async fn candidates(&self) -> Result<Vec<SocketAddr>> {
        let target = format!("{}:{}", self.host, self.port);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", target, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(Error::InvalidAddress(format!("{} resolved to nothing", target)));
        }
        Ok(addrs)
    }

    async fn open(&self, addr: SocketAddr) -> Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(self.keepalive)?;

        let stream = timeout(self.connect_timeout, socket.connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout {
                addr: addr.to_string(),
                after: self.connect_timeout,
            })??;

        // Frames are small; don't let Nagle hold them back
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let mut last_error = None;
        for addr in self.candidates().await? {
            debug!("Trying {}...", addr);
            match self.open(addr).await {
                Ok(stream) => {
                    info!("TCP link to {} open", addr);
                    self.peer = Some(addr);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    debug!("{} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(Error::NotConnected))
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        debug!("Closing TCP link to {}", self.remote_addr());
        if let Err(e) = stream.shutdown().await {
            trace!("Shutdown of {} failed: {}", self.remote_addr(), e);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotConnected);
        };

        trace!("TX {} bytes: {:02X?}", data.len(), &data[..data.len().min(TRACE_DUMP_LEN)]);

        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize) -> Result<BytesMut> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotConnected);
        };

        let mut chunk = BytesMut::with_capacity(max_bytes);

        // `read_buf` is cancel-safe, so the timeout cannot lose bytes
        let read = match timeout(self.poll_interval, stream.read_buf(&mut chunk)).await {
            Err(_) => return Ok(BytesMut::new()),
            Ok(result) => result?,
        };

        if read == 0 {
            self.stream = None;
            return Err(Error::ConnectionClosed);
        }

        trace!("RX {} bytes: {:02X?}", read, &chunk[..read.min(TRACE_DUMP_LEN)]);
        Ok(chunk)
    }

    fn remote_addr(&self) -> String {
        match self.peer {
            Some(addr) => addr.to_string(),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("TCP link to {} dropped without disconnect", self.remote_addr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    #[test]
    fn test_unresolved_remote_addr() {
        let transport = TcpTransport::new("192.168.1.178", 6000).with_keepalive(false);
        assert!(!transport.is_connected());
        assert_eq!(transport.remote_addr(), "192.168.1.178:6000");
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let mut transport = TcpTransport::new("reader..invalid", 6000)
            .with_connect_timeout(Duration::from_millis(100));

        let err = transport.connect().await.unwrap_err();
        assert!(err.is_connect_failure() || matches!(err, Error::Io(_)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_refused_port() {
        // Bind then drop to find a port with no listener
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut transport = TcpTransport::new("127.0.0.1", port);
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::ConnectionTimeout { .. }));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let mut transport = TcpTransport::new("127.0.0.1", 6000);
        assert!(matches!(transport.send(&[0x52]).await, Err(Error::NotConnected)));
        assert!(matches!(transport.receive(16).await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_loopback_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 9];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(&[0xAA, 0xBB]).await.unwrap();
            request
        });

        let mut transport = TcpTransport::new("127.0.0.1", port)
            .with_poll_interval(Duration::from_millis(500));
        transport.connect().await.unwrap();
        assert!(matches!(transport.connect().await, Err(Error::AlreadyConnected)));

        let command = [0x52, 0x46, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x28];
        transport.send(&command).await.unwrap();

        let mut received = Vec::new();
        while received.len() < 2 {
            received.extend_from_slice(&transport.receive(64).await.unwrap());
        }
        assert_eq!(received, vec![0xAA, 0xBB]);
        assert_eq!(server.await.unwrap(), command);

        // Server side is gone now
        let mut closed = false;
        for _ in 0..20 {
            match transport.receive(64).await {
                Err(Error::ConnectionClosed) => {
                    closed = true;
                    break;
                }
                Ok(_) => continue,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert!(closed);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_quiet_link_returns_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::new("127.0.0.1", port)
            .with_poll_interval(Duration::from_millis(20));
        transport.connect().await.unwrap();

        assert!(transport.receive(64).await.unwrap().is_empty());
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }
}
