//! Transport abstraction for reaching a management controller
//!
//! A transport owns the connection for the duration of one exchange and
//! enforces the per-call timeout. It never retries; resend policy belongs
//! to the command client, which knows whether a command is idempotent.
//!
//! On the stream transport every message is framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: message ]
//! ```

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::codec::MAX_MESSAGE_SIZE;
use crate::{limits, Endpoint};

/// Errors raised by a transport exchange
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect to {address} failed: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("invalid response length prefix: {0}")]
    InvalidLength(u32),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// One request/response exchange with a controller.
///
/// Implementations must return within the given timeout and release the
/// underlying connection on every exit path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a raw request frame and wait for the raw response frame
    async fn exchange(
        &self,
        endpoint: &Endpoint,
        request: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// TCP transport to a LAN-side management channel.
///
/// Opens one connection per exchange; the stream is dropped (and therefore
/// closed) on success, error, timeout and cancellation alike.
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with the default connect timeout
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_millis(limits::CONNECT_TIMEOUT_MS),
        }
    }

    /// Override the connect timeout
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn exchange(
        &self,
        endpoint: &Endpoint,
        request: Bytes,
        deadline: Duration,
    ) -> Result<Bytes, TransportError> {
        let mut stream = match timeout(self.connect_timeout, TcpStream::connect(&endpoint.address))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectFailed {
                    address: endpoint.address.clone(),
                    source: e,
                });
            }
            Err(_) => return Err(TransportError::Timeout(self.connect_timeout)),
        };

        debug!("exchange with {} ({} bytes)", endpoint.address, request.len());

        timeout(deadline, exchange_framed(&mut stream, &request))
            .await
            .map_err(|_| TransportError::Timeout(deadline))?
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

/// Write one length-prefixed frame, then read one back
async fn exchange_framed(
    stream: &mut TcpStream,
    request: &[u8],
) -> Result<Bytes, TransportError> {
    let mut out = BytesMut::with_capacity(4 + request.len());
    out.put_u32(request.len() as u32);
    out.extend_from_slice(request);
    stream.write_all(&out).await?;

    let mut prefix = [0u8; 4];
    if let Err(e) = stream.read_exact(&mut prefix).await {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Err(TransportError::ConnectionClosed);
        }
        return Err(TransportError::Io(e));
    }

    let len = u32::from_be_bytes(prefix);
    if len == 0 || len > MAX_MESSAGE_SIZE {
        return Err(TransportError::InvalidLength(len));
    }

    let mut body = vec![0u8; len as usize];
    if let Err(e) = stream.read_exact(&mut body).await {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Err(TransportError::ConnectionClosed);
        }
        return Err(TransportError::Io(e));
    }

    Ok(Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection and answer every frame with `reply`
    async fn spawn_responder(reply: Option<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");

            let mut prefix = [0u8; 4];
            stream.read_exact(&mut prefix).await.expect("read prefix");
            let len = u32::from_be_bytes(prefix) as usize;
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).await.expect("read body");

            match reply {
                Some(reply) => {
                    let mut out = BytesMut::new();
                    out.put_u32(reply.len() as u32);
                    out.extend_from_slice(&reply);
                    stream.write_all(&out).await.expect("write reply");
                }
                None => {
                    // Hold the connection open without answering
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            }
        });

        address
    }

    #[tokio::test]
    async fn test_exchange_roundtrip() {
        let address = spawn_responder(Some(vec![0xAA, 0xBB, 0xCC])).await;
        let transport = TcpTransport::new();
        let endpoint = Endpoint::new(address);

        let reply = transport
            .exchange(
                &endpoint,
                Bytes::from_static(&[0x01, 0x02]),
                Duration::from_secs(1),
            )
            .await
            .expect("exchange failed");

        assert_eq!(&reply[..], &[0xAA, 0xBB, 0xCC]);
    }

    #[tokio::test]
    async fn test_exchange_timeout() {
        let address = spawn_responder(None).await;
        let transport = TcpTransport::new();
        let endpoint = Endpoint::new(address);

        let result = transport
            .exchange(
                &endpoint,
                Bytes::from_static(&[0x01]),
                Duration::from_millis(100),
            )
            .await;

        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get an address nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let transport = TcpTransport::new();
        let endpoint = Endpoint::new(address);

        let result = transport
            .exchange(
                &endpoint,
                Bytes::from_static(&[0x01]),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }

    #[test]
    fn test_transport_name() {
        assert_eq!(TcpTransport::new().name(), "TCP");
    }
}
