//! Outbound connection establishment and lifetime tracking.
//!
//! # Responsibilities
//! - Open a plain or TLS stream to a [`TargetDescriptor`]
//! - Bound establishment (DNS + TCP + handshake) by the configured timeout
//! - Tag every connection with an ID and trace its close

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::forward::error::ForwardError;
use crate::net::target::TargetDescriptor;
use crate::net::tls;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream-{}", self.0)
    }
}

/// Options controlling connection establishment.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub timeout: Duration,
    pub insecure_skip_verify: bool,
}

#[derive(Debug)]
enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// An open byte stream to one target, exclusively owned by one forwarding call.
///
/// The socket is closed when the value is dropped; [`OutboundConnection::close`] additionally
/// sends a TLS close_notify / TCP FIN first.
#[derive(Debug)]
pub struct OutboundConnection {
    id: ConnectionId,
    stream: Stream,
}

impl OutboundConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }

    /// Orderly shutdown. Errors are logged, never returned: the peer may already be gone.
    pub async fn close(mut self) {
        if let Err(e) = self.shutdown().await {
            tracing::trace!(connection_id = %self.id, error = %e, "Upstream shutdown failed");
        }
    }
}

impl Drop for OutboundConnection {
    fn drop(&mut self) {
        tracing::trace!(connection_id = %self.id, "Upstream connection closed");
    }
}

impl AsyncRead for OutboundConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.stream {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for OutboundConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.stream {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.stream {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.stream {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Open a connection to `target`, TLS-wrapped when the scheme is `https`.
///
/// The whole establishment sequence shares one deadline; expiry maps to `ConnectionFailed`.
pub async fn connect(
    target: &TargetDescriptor,
    options: ConnectOptions,
) -> Result<OutboundConnection, ForwardError> {
    let host = target.connect_host().to_string();
    let port = target.port;
    let id = ConnectionId::new();

    tracing::debug!(connection_id = %id, %host, port, tls = target.scheme.is_tls(), "Dialing upstream");

    let establish = async {
        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| connection_failed(&host, port, &e))?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::trace!(connection_id = %id, error = %e, "set_nodelay failed");
        }

        if !target.scheme.is_tls() {
            return Ok(Stream::Plain(tcp));
        }

        let config = tls::client_config(options.insecure_skip_verify).map_err(|e| {
            ForwardError::ConnectionFailed {
                host: host.clone(),
                port,
                errno: None,
                message: format!("TLS configuration: {e}"),
            }
        })?;
        let server_name =
            ServerName::try_from(host.clone()).map_err(|e| ForwardError::ConnectionFailed {
                host: host.clone(),
                port,
                errno: None,
                message: format!("invalid server name: {e}"),
            })?;

        let tls = TlsConnector::from(config)
            .connect(server_name, tcp)
            .await
            .map_err(|e| connection_failed(&host, port, &e))?;
        Ok::<_, ForwardError>(Stream::Tls(Box::new(tls)))
    };

    let stream = match timeout(options.timeout, establish).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(connection_id = %id, %host, port, "Upstream connect timed out after {:?}", options.timeout);
            return Err(ForwardError::ConnectionFailed {
                host,
                port,
                errno: None,
                message: format!("connect timed out after {:?}", options.timeout),
            });
        }
    };

    tracing::debug!(connection_id = %id, "Upstream connected");
    Ok(OutboundConnection { id, stream })
}

fn connection_failed(host: &str, port: u16, err: &io::Error) -> ForwardError {
    ForwardError::ConnectionFailed {
        host: host.to_string(),
        port,
        errno: err.raw_os_error(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn options() -> ConnectOptions {
        ConnectOptions {
            timeout: Duration::from_secs(2),
            insecure_skip_verify: false,
        }
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[tokio::test]
    async fn plain_connection_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let target = TargetDescriptor::parse(&format!("http://{addr}/")).unwrap();
        let mut conn = connect(&target, options()).await.unwrap();
        assert!(!conn.is_tls());
        conn.write_all(b"hello").await.unwrap();
        conn.close().await;

        assert_eq!(&server.await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn refused_connection_reports_errno() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = TargetDescriptor::parse(&format!("http://{addr}/")).unwrap();
        match connect(&target, options()).await {
            Err(ForwardError::ConnectionFailed { port, errno, .. }) => {
                assert_eq!(port, addr.port());
                assert!(errno.is_some());
            }
            other => panic!("expected ConnectionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_host_fails() {
        let target = TargetDescriptor::parse("http://nonexistent.invalid/").unwrap();
        let err = connect(&target, options()).await.unwrap_err();
        assert!(matches!(err, ForwardError::ConnectionFailed { .. }));
    }
}
