//! Established connections handed to callers.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A duplex byte channel.
pub trait DuplexIo: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug {}

impl<T> DuplexIo for T where T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug {}

/// A duplex byte channel plus the canonical address of the peer on the other end.
///
/// Ownership moves to the caller when a server delivers it or a dial succeeds;
/// the plugin keeps no reference to it afterwards. Dropping it closes the channel.
pub struct ConnectionHandle {
    peer_address: String,
    io: Box<dyn DuplexIo>,
}

impl ConnectionHandle {
    /// Wraps `io` with the peer's address string.
    pub fn new(io: impl DuplexIo + 'static, peer_address: impl Into<String>) -> Self {
        Self {
            peer_address: peer_address.into(),
            io: Box::new(io),
        }
    }

    /// The peer's address in its transport's canonical form.
    pub fn peer_address(&self) -> &str {
        &self.peer_address
    }

    /// Splits the handle into its address and the underlying channel.
    pub fn into_parts(self) -> (String, Box<dyn DuplexIo>) {
        (self.peer_address, self.io)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("peer_address", &self.peer_address)
            .field("io", &self.io)
            .finish()
    }
}

impl AsyncRead for ConnectionHandle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for ConnectionHandle {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_handle_is_a_duplex_channel() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut handle = ConnectionHandle::new(local, "net:127.0.0.1:9000");
        assert_eq!(handle.peer_address(), "net:127.0.0.1:9000");

        handle.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        remote.write_all(b"pong").await.unwrap();
        handle.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }
}
