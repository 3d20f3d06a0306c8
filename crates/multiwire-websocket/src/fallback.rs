//! Plain HTTP requests arriving on the WebSocket port.
//!
//! When a fallback responder is configured, the request head of every inbound
//! connection is read before the WebSocket handshake. Upgrade requests are
//! replayed into the handshake through [`Rewind`]; anything else is answered by
//! the responder and the connection is closed.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_tungstenite::tungstenite::http::header::{CONNECTION, CONTENT_LENGTH, UPGRADE};
use tokio_tungstenite::tungstenite::http::{Request, Response, Version};

/// Answers plain (non-upgrade) HTTP requests on the WebSocket port.
pub type FallbackHandler = Arc<dyn Fn(Request<()>) -> Response<Bytes> + Send + Sync>;

/// Largest request head read before giving up on a connection.
const MAX_HEAD: usize = 16 * 1024;

const HEAD_END: &[u8] = b"\r\n\r\n";

/// A stream that yields `prefix` before reading from `inner`.
pub(crate) struct Rewind<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> Rewind<S> {
    pub(crate) fn new(prefix: Bytes, inner: S) -> Self {
        Self { prefix, inner }
    }
}

impl<S> fmt::Debug for Rewind<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rewind")
            .field("prefix", &self.prefix.len())
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Rewind<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix[..n]);
            this.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Rewind<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Reads until the end of the request head. Returns every byte read, which may
/// run past the head.
pub(crate) async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<Bytes> {
    let mut head = BytesMut::with_capacity(1024);
    loop {
        if find_head_end(&head).is_some() {
            return Ok(head.freeze());
        }
        if head.len() >= MAX_HEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
        if stream.read_buf(&mut head).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
}

fn find_head_end(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(HEAD_END.len())
        .position(|window| window == HEAD_END)
        .map(|at| at + HEAD_END.len())
}

/// Parses the request line and headers at the start of `bytes`.
pub(crate) fn parse_head(bytes: &[u8]) -> io::Result<Request<()>> {
    let invalid = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());
    let end = find_head_end(bytes).ok_or_else(|| invalid("incomplete request head"))?;
    let head = std::str::from_utf8(&bytes[..end - HEAD_END.len()])
        .map_err(|_| invalid("request head is not UTF-8"))?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let (Some(method), Some(uri), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("malformed request line"));
    };
    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        _ => return Err(invalid("unsupported HTTP version")),
    };

    let mut builder = Request::builder().method(method).uri(uri).version(version);
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| invalid("malformed header line"))?;
        builder = builder.header(name.trim(), value.trim());
    }
    builder.body(()).map_err(|e| invalid(&e.to_string()))
}

/// Whether `request` asks to switch to the WebSocket protocol.
pub(crate) fn is_upgrade(request: &Request<()>) -> bool {
    request
        .headers()
        .get_all(UPGRADE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
}

/// Writes `response` as HTTP/1.1 and closes the write side.
pub(crate) async fn write_response<S: AsyncWrite + Unpin>(
    stream: &mut S,
    response: Response<Bytes>,
) -> io::Result<()> {
    let (parts, body) = response.into_parts();
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            parts.status.as_u16(),
            parts.status.canonical_reason().unwrap_or_default()
        )
        .as_bytes(),
    );
    for (name, value) in &parts.headers {
        if name == CONNECTION {
            continue;
        }
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    if !parts.headers.contains_key(CONTENT_LENGTH) {
        head.extend_from_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
    }
    head.extend_from_slice(b"connection: close\r\n\r\n");

    stream.write_all(&head).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_tungstenite::tungstenite::http::{Method, StatusCode};

    const UPGRADE_HEAD: &[u8] = b"GET /chat HTTP/1.1\r\nHost: localhost\r\n\
        Upgrade: websocket\r\nConnection: Upgrade\r\n\r\n";

    #[test]
    fn test_parse_plain_get() {
        let request =
            parse_head(b"GET /status?full=1 HTTP/1.1\r\nHost: localhost:8080\r\n\r\n").unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri(), "/status?full=1");
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.headers()["host"], "localhost:8080");
        assert!(!is_upgrade(&request));
    }

    #[test]
    fn test_parse_upgrade() {
        let request = parse_head(UPGRADE_HEAD).unwrap();
        assert!(is_upgrade(&request));

        let mixed = parse_head(b"GET / HTTP/1.1\r\nUpgrade: h2c, WebSocket\r\n\r\n").unwrap();
        assert!(is_upgrade(&mixed));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            &b"GET / HTTP/1.1\r\nHost: x\r\n"[..],
            b"GET /\r\n\r\n",
            b"GET / HTTP/2\r\n\r\n",
            b"GET / HTTP/1.1\r\nno colon here\r\n\r\n",
        ] {
            assert!(parse_head(bad).is_err(), "{:?}", String::from_utf8_lossy(bad));
        }
    }

    #[tokio::test]
    async fn test_read_head_then_rewind() {
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(UPGRADE_HEAD).await.unwrap();
        client.write_all(b"extra").await.unwrap();
        drop(client);

        let mut server = server;
        let head = read_head(&mut server).await.unwrap();
        assert!(head.starts_with(b"GET /chat"));

        let mut replayed = Vec::new();
        Rewind::new(head, server)
            .read_to_end(&mut replayed)
            .await
            .unwrap();
        assert_eq!(&replayed[..UPGRADE_HEAD.len()], UPGRADE_HEAD);
        assert!(replayed.ends_with(b"extra"));
    }

    #[tokio::test]
    async fn test_read_head_eof() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        drop(client);
        let err = read_head(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_write_response() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("content-type", "text/plain")
            .body(Bytes::from_static(b"nothing here"))
            .unwrap();
        write_response(&mut server, response).await.unwrap();

        let mut raw = String::new();
        client.read_to_string(&mut raw).await.unwrap();
        assert_eq!(
            raw,
            "HTTP/1.1 404 Not Found\r\ncontent-type: text/plain\r\n\
             content-length: 12\r\nconnection: close\r\n\r\nnothing here"
        );
    }
}
