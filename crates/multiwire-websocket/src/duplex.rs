//! Byte-stream view of a WebSocket.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Frame type used for outgoing bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    /// One binary frame per write
    #[default]
    Binary,
    /// One text frame per write. A multi-byte character split across writes
    /// is held back until it completes; invalid UTF-8 is rejected.
    Text,
}

/// A WebSocket exposed as `AsyncRead + AsyncWrite`.
///
/// Incoming binary and text frames are both delivered as bytes, ping and pong
/// frames are skipped, and a close frame reads as EOF.
pub struct WsDuplex<S> {
    inner: WebSocketStream<S>,
    mode: FrameMode,
    pending: Bytes,
    read_closed: bool,
    /// Leading bytes of a character whose remainder has not been written yet
    carry: Vec<u8>,
}

impl<S> WsDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established WebSocket.
    pub fn new(inner: WebSocketStream<S>, mode: FrameMode) -> Self {
        Self {
            inner,
            mode,
            pending: Bytes::new(),
            read_closed: false,
            carry: Vec::new(),
        }
    }

    /// Frame type used for writes.
    pub fn frame_mode(&self) -> FrameMode {
        self.mode
    }

    /// Unwraps the WebSocket. Bytes already read from a frame but not yet
    /// consumed are lost.
    pub fn into_inner(self) -> WebSocketStream<S> {
        self.inner
    }
}

impl<S> fmt::Debug for WsDuplex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsDuplex")
            .field("mode", &self.mode)
            .field("pending", &self.pending.len())
            .field("read_closed", &self.read_closed)
            .field("carry", &self.carry.len())
            .finish_non_exhaustive()
    }
}

fn invalid_utf8(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Splits `carry ++ buf` into the longest valid UTF-8 prefix and the trailing
/// bytes of an unfinished character.
fn split_text(carry: &[u8], buf: &[u8]) -> io::Result<(String, Vec<u8>)> {
    let mut joined = Vec::with_capacity(carry.len() + buf.len());
    joined.extend_from_slice(carry);
    joined.extend_from_slice(buf);
    let valid = match std::str::from_utf8(&joined) {
        Ok(_) => joined.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(e) => return Err(invalid_utf8(e)),
    };
    let rest = joined.split_off(valid);
    let text = String::from_utf8(joined).map_err(invalid_utf8)?;
    Ok((text, rest))
}

fn ws_to_io(err: WsError) -> io::Error {
    match err {
        WsError::Io(e) => e,
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            io::Error::new(io::ErrorKind::BrokenPipe, err)
        }
        other => io::Error::other(other),
    }
}

impl<S> AsyncRead for WsDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending[..n]);
                this.pending.advance(n);
                return Poll::Ready(Ok(()));
            }
            if this.read_closed {
                return Poll::Ready(Ok(()));
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(message)) if message.is_binary() || message.is_text() => {
                    this.pending = message.into_data();
                }
                Some(Ok(Message::Close(_))) | None => this.read_closed = true,
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    this.read_closed = true;
                }
                Some(Err(e)) => return Poll::Ready(Err(ws_to_io(e))),
            }
        }
    }
}

impl<S> AsyncWrite for WsDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.inner.poll_ready_unpin(cx)).map_err(ws_to_io)?;
        let message = match this.mode {
            FrameMode::Binary => Message::binary(Bytes::copy_from_slice(buf)),
            FrameMode::Text => {
                let (text, rest) = split_text(&this.carry, buf)?;
                this.carry = rest;
                if text.is_empty() {
                    return Poll::Ready(Ok(buf.len()));
                }
                Message::text(text)
            }
        };
        this.inner.start_send_unpin(message).map_err(ws_to_io)?;
        // push the frame out now; a pending flush finishes on the next poll
        if let Poll::Ready(Err(e)) = this.inner.poll_flush_unpin(cx) {
            return Poll::Ready(Err(ws_to_io(e)));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().inner.poll_flush_unpin(cx).map_err(ws_to_io)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.carry.is_empty() {
            this.carry.clear();
            return Poll::Ready(Err(invalid_utf8("stream ended inside a UTF-8 sequence")));
        }
        match ready!(this.inner.poll_close_unpin(cx)) {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Poll::Ready(Ok(())),
            Err(e) => Poll::Ready(Err(ws_to_io(e))),
        }
    }
}
