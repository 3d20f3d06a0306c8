//! TCP stream wrapper applying the half-open policy.

use std::io;
use std::net::Shutdown;
use std::pin::Pin;
use std::task::{Context, Poll};

use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

/// Per-socket options applied to accepted and dialed streams.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StreamOptions {
    pub(crate) allow_half_open: bool,
    pub(crate) nodelay: bool,
}

/// A connected TCP stream.
///
/// Unless half-open connections are allowed, reading EOF shuts down the write
/// side as well, so a peer that finishes sending also sees this end finish.
#[derive(Debug)]
pub struct NetStream {
    inner: TcpStream,
    allow_half_open: bool,
    write_closed: bool,
}

impl NetStream {
    pub(crate) fn new(inner: TcpStream, options: StreamOptions) -> io::Result<Self> {
        if options.nodelay {
            inner.set_nodelay(true)?;
        }
        Ok(Self {
            inner,
            allow_half_open: options.allow_half_open,
            write_closed: false,
        })
    }

    /// The underlying tokio stream.
    pub fn get_ref(&self) -> &TcpStream {
        &self.inner
    }

    /// Unwraps the underlying tokio stream.
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }

    fn close_write_side(&mut self) {
        if self.write_closed {
            return;
        }
        self.write_closed = true;
        if let Err(e) = SockRef::from(&self.inner).shutdown(Shutdown::Write) {
            // peer may already be gone
            debug!("Failed to shut down write side after EOF: {}", e);
        }
    }
}

impl AsyncRead for NetStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let wants_bytes = buf.remaining() > 0;
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll
            && wants_bytes
            && buf.filled().len() == before
            && !self.allow_half_open
        {
            self.close_write_side();
        }
        poll
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.write_closed {
            return Poll::Ready(Ok(()));
        }
        let poll = Pin::new(&mut self.inner).poll_shutdown(cx);
        if let Poll::Ready(Ok(())) = poll {
            self.write_closed = true;
        }
        poll
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn pair(options: StreamOptions) -> (NetStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server, _) = accepted.unwrap();
        (NetStream::new(server, options).unwrap(), client.unwrap())
    }

    #[tokio::test]
    async fn test_eof_closes_write_side_by_default() {
        let (mut server, mut client) = pair(StreamOptions::default()).await;

        client.shutdown().await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);

        // our side followed the peer's EOF
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_half_open_keeps_write_side() {
        let (mut server, mut client) = pair(StreamOptions {
            allow_half_open: true,
            nodelay: true,
        })
        .await;
        assert!(server.get_ref().nodelay().unwrap());

        client.shutdown().await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);

        server.write_all(b"late").await.unwrap();
        server.shutdown().await.unwrap();
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"late");
    }
}
