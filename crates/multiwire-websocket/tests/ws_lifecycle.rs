//! WebSocket listener and dial lifecycle against real loopback sockets.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use multiwire_transport_traits::{AddressResolver, OnConnection, OsAssignedPorts, StaticInterfaces};
use multiwire_websocket::{
    ConnectionHandle, DialTarget, FrameMode, Scope, ServerCloser, TlsConfig, TransportError,
    TransportPlugin, WsPlugin, WsPluginBuilder,
};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{Request, Response, StatusCode};

fn loopback_builder() -> WsPluginBuilder {
    WsPlugin::builder()
        .resolver(AddressResolver::new(Arc::new(StaticInterfaces(vec![
            "127.0.0.1".parse().unwrap(),
        ]))))
        .ports(Arc::new(OsAssignedPorts))
}

fn echo_handler(peers: mpsc::UnboundedSender<String>) -> OnConnection {
    Arc::new(move |conn: ConnectionHandle| {
        let _ = peers.send(conn.peer_address().to_string());
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(conn);
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });
    })
}

async fn start_echo(plugin: &WsPlugin) -> (ServerCloser, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let closer = plugin
        .listen(echo_handler(tx))
        .expect("tokio runtime present")
        .await
        .expect("listener starts");
    (closer, rx)
}

#[tokio::test]
async fn test_stringify_and_echo() {
    let plugin = loopback_builder().build();
    assert_eq!(plugin.stringify(&Scope::Device), None);

    let (closer, mut peers) = start_echo(&plugin).await;
    let port = closer.local_addr().unwrap().port();
    let advertised = plugin.stringify(&Scope::Device).unwrap();
    assert_eq!(advertised, format!("ws://127.0.0.1:{port}"));
    assert_eq!(plugin.stringify(&Scope::Public), None);

    let record = plugin.parse(&advertised).unwrap();
    let mut conn = plugin.dial(record.into()).await.unwrap();
    assert_eq!(conn.peer_address(), advertised);

    conn.write_all(b"over websocket").await.unwrap();
    conn.flush().await.unwrap();
    let mut buf = [0u8; 14];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"over websocket");

    // no origin header: the socket address names the peer
    let inbound = peers.recv().await.unwrap();
    assert!(inbound.starts_with("ws:127.0.0.1:"), "unexpected peer {inbound}");

    closer.shutdown().await.unwrap();
}

async fn echo_round_trip(plugin: &WsPlugin, payload: &[u8]) {
    let advertised = plugin.stringify(&Scope::Device).unwrap();
    let mut conn = plugin
        .dial(plugin.parse(&advertised).unwrap().into())
        .await
        .unwrap();
    conn.write_all(payload).await.unwrap();
    conn.flush().await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, payload);
}

#[tokio::test]
async fn test_attached_listener() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let plugin = loopback_builder().listener(listener).build();
    assert!(plugin.is_attached());

    // the attached port is advertised before any server() call
    assert_eq!(plugin.bound_port(), Some(port));
    assert_eq!(
        plugin.stringify(&Scope::Device),
        Some(format!("ws://127.0.0.1:{port}"))
    );

    let (closer, mut peers) = start_echo(&plugin).await;
    assert_eq!(closer.local_addr().unwrap().port(), port);
    echo_round_trip(&plugin, b"attached").await;
    assert!(peers.recv().await.unwrap().starts_with("ws:127.0.0.1:"));

    closer.shutdown().await.unwrap();
    assert!(matches!(
        closer.shutdown().await,
        Err(TransportError::NotListening(_))
    ));
}

#[tokio::test]
async fn test_fallback_answers_plain_http() {
    let plugin = loopback_builder()
        .fallback(Arc::new(|request: Request<()>| {
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/plain")
                .body(Bytes::from(format!("hello {}", request.uri().path())))
                .unwrap()
        }))
        .build();
    let (closer, mut peers) = start_echo(&plugin).await;
    let port = closer.local_addr().unwrap().port();

    let mut plain = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .unwrap();
    plain
        .write_all(b"GET /status HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    plain.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.ends_with("\r\n\r\nhello /status"), "{raw}");

    // upgrade requests on the same port still reach the connection handler
    echo_round_trip(&plugin, b"upgraded").await;
    assert!(peers.recv().await.unwrap().starts_with("ws:127.0.0.1:"));

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_without_fallback_plain_http_is_dropped() {
    let plugin = loopback_builder().build();
    let (closer, _peers) = start_echo(&plugin).await;
    let port = closer.local_addr().unwrap().port();

    let mut plain = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .unwrap();
    plain
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    let _ = plain.read_to_end(&mut raw).await;
    assert!(!raw.starts_with(b"HTTP/1.1 200"));

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_loopback_origin_names_the_peer() {
    let plugin = loopback_builder().build();
    let (closer, mut peers) = start_echo(&plugin).await;

    let mut request = plugin
        .stringify(&Scope::Device)
        .unwrap()
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://localhost:3000".parse().unwrap());
    let (_ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    assert_eq!(peers.recv().await.unwrap(), "ws://localhost:3000");
    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_text_frame_mode() {
    let plugin = loopback_builder().frame_mode(FrameMode::Text).build();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let closer = plugin
        .listen(Arc::new(move |conn| {
            let _ = tx.send(conn);
        }))
        .unwrap()
        .await
        .unwrap();

    let url = plugin.stringify(&Scope::Device).unwrap();
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let mut conn = rx.recv().await.unwrap();

    conn.write_all(b"plain text").await.unwrap();
    conn.flush().await.unwrap();
    assert_eq!(
        ws.next().await.unwrap().unwrap(),
        Message::text("plain text".to_string())
    );

    ws.send(Message::binary(b"bin".to_vec())).await.unwrap();
    let mut buf = [0u8; 3];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"bin");

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fresh_port_per_server_call() {
    let plugin = loopback_builder().build();

    let (first, _) = start_echo(&plugin).await;
    let first_port = first.local_addr().unwrap().port();
    let (second, _) = start_echo(&plugin).await;
    let second_port = second.local_addr().unwrap().port();

    assert_ne!(first_port, second_port);
    assert_eq!(plugin.bound_port(), Some(second_port));

    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_tls_material_fails_start() {
    let plugin = loopback_builder()
        .tls(TlsConfig::from_files(
            "/nonexistent/key.pem",
            "/nonexistent/cert.pem",
        ))
        .build();

    let result = plugin.listen(Arc::new(|_| {})).unwrap().await;
    assert!(matches!(result, Err(TransportError::Tls(_))), "{result:?}");
}

#[tokio::test]
async fn test_wss_with_tls_from_files() {
    let cert = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap();
    let mut key_file = NamedTempFile::new().unwrap();
    let mut cert_file = NamedTempFile::new().unwrap();
    key_file
        .write_all(cert.key_pair.serialize_pem().as_bytes())
        .unwrap();
    cert_file.write_all(cert.cert.pem().as_bytes()).unwrap();

    let plugin = loopback_builder()
        .tls(TlsConfig::from_files(key_file.path(), cert_file.path()))
        .build();
    let (closer, mut peers) = start_echo(&plugin).await;
    let advertised = plugin.stringify(&Scope::Device).unwrap();
    assert!(advertised.starts_with("wss://127.0.0.1:"), "{advertised}");

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert.cert.der().clone()).unwrap();
    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let (mut ws, _) = tokio_tungstenite::connect_async_tls_with_config(
        advertised.as_str(),
        None,
        false,
        Some(tokio_tungstenite::Connector::Rustls(Arc::new(client_config))),
    )
    .await
    .unwrap();

    ws.send(Message::binary(b"secure".to_vec())).await.unwrap();
    let echoed = ws.next().await.unwrap().unwrap();
    assert_eq!(echoed.into_data().as_ref(), b"secure");
    assert!(peers.recv().await.unwrap().starts_with("ws:127.0.0.1:"));

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_abort_dial() {
    let plugin = loopback_builder().build();
    let (closer, _peers) = start_echo(&plugin).await;
    let address = plugin.stringify(&Scope::Device).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let (tx, rx) = oneshot::channel();
    let aborter = plugin.client(
        DialTarget::Native(address),
        Box::new(move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        }),
    );
    aborter.abort();
    aborter.abort();

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_abort());
    assert_eq!(err.to_string(), "multiwire.ws: aborted");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_refused_dial_fails() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let plugin = loopback_builder().build();
    let result = plugin
        .dial(DialTarget::Native(format!("ws://127.0.0.1:{port}")))
        .await;
    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_close_twice() {
    let plugin = loopback_builder().build();
    let (closer, _peers) = start_echo(&plugin).await;
    let local_addr = closer.local_addr().unwrap();

    closer.shutdown().await.unwrap();
    assert!(matches!(
        closer.shutdown().await,
        Err(TransportError::NotListening(_))
    ));
    tokio::net::TcpListener::bind(local_addr).await.unwrap();
}
