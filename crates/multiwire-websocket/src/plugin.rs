//! The WebSocket transport plugin.

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use bytes::Bytes;
use multiwire_transport_traits::{
    Aborter, AddressCodec, AddressRecord, AddressResolver, Advertiser, ClientCallback,
    ConnectionHandle, DialTarget, OnConnection, PortAllocator, Scope, ScopeConfig, ServerCloser,
    ServerTask, StartedCallback, TransportError, TransportPlugin, TransportResult,
    is_wildcard_host, runtime_handle,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::{accept_hdr_async, connect_async};
use tracing::{debug, error, info};
use url::Url;

use crate::codec::{WS_TRANSPORT, WsCodec};
use crate::config::{WsConfig, WsPluginBuilder};
use crate::duplex::{FrameMode, WsDuplex};
use crate::fallback::{FallbackHandler, Rewind, is_upgrade, parse_head, read_head, write_response};
use crate::origin::peer_address;
use crate::tls::TlsConfig;

/// Upper bound on TLS plus WebSocket handshake for one inbound connection.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Host dialed for records that carry no host.
const FALLBACK_DIAL_HOST: &str = "localhost";

/// WebSocket transport plugin.
///
/// Unlike the net transport, an unpinned port is allocated anew on every
/// `server()` call; `stringify` advertises the most recently bound one.
///
/// A plugin built with an attached listener never binds: every `server()`
/// accepts from that listener, `started` fires as soon as the task runs, and
/// the listener's port is the advertised one from the start.
pub struct WsPlugin {
    advertiser: Advertiser,
    host: Option<String>,
    port: Option<u16>,
    ports: Arc<dyn PortAllocator>,
    /// Port reported by the most recent successful bind, `0` before any
    bound_port: Arc<AtomicU16>,
    tls: Option<TlsConfig>,
    frame_mode: FrameMode,
    attached: Option<Arc<StdTcpListener>>,
    fallback: Option<FallbackHandler>,
}

/// Where a server's listener comes from.
enum ListenSource {
    Bind { host: String, port: u16 },
    Attach(io::Result<StdTcpListener>),
}

/// Everything the start task needs, detached from the plugin.
struct ListenPlan {
    source: ListenSource,
    tls: Option<TlsConfig>,
    frame_mode: FrameMode,
    bound_port: Arc<AtomicU16>,
    fallback: Option<FallbackHandler>,
}

/// Per-connection settings shared by every accepted socket of one server.
#[derive(Clone)]
struct Inbound {
    acceptor: Option<TlsAcceptor>,
    frame_mode: FrameMode,
    fallback: Option<FallbackHandler>,
    on_connection: OnConnection,
}

impl WsPlugin {
    pub(crate) fn new(
        config: WsConfig,
        resolver: AddressResolver,
        ports: Arc<dyn PortAllocator>,
        attached: Option<StdTcpListener>,
        fallback: Option<FallbackHandler>,
    ) -> Self {
        let attached_port = attached
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
            .map_or(0, |addr| addr.port());
        Self {
            advertiser: Advertiser::new(
                resolver,
                config.scope,
                config.host.clone(),
                config.external,
            ),
            host: config.host,
            port: config.port,
            ports,
            bound_port: Arc::new(AtomicU16::new(attached_port)),
            tls: config.tls,
            frame_mode: config.frame_mode,
            attached: attached.map(Arc::new),
            fallback,
        }
    }

    /// Create a builder
    #[must_use]
    pub fn builder() -> WsPluginBuilder {
        WsPluginBuilder::new()
    }

    /// Build a plugin straight from a configuration.
    #[must_use]
    pub fn from_config(config: WsConfig) -> Self {
        WsPluginBuilder::new().config(config).build()
    }

    /// The port the most recent listener reported, once one has been bound.
    pub fn bound_port(&self) -> Option<u16> {
        match self.bound_port.load(Ordering::Acquire) {
            0 => None,
            port => Some(port),
        }
    }

    /// Whether this instance accepts from a listener it was handed.
    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// Whether this instance serves `wss://`.
    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    fn codec(&self) -> WsCodec {
        if self.is_secure() {
            WsCodec::secure()
        } else {
            WsCodec::plain()
        }
    }

    fn advertised_port(&self) -> Option<u16> {
        self.bound_port().or(self.port)
    }

    fn dial_url(&self, target: DialTarget) -> TransportResult<String> {
        match target {
            DialTarget::Address(record) => {
                let codec = WsCodec::for_scheme(&record.transport).ok_or_else(|| {
                    TransportError::InvalidAddress(format!(
                        "{} address given to the ws transport",
                        record.transport
                    ))
                })?;
                let host = if record.host.is_empty() {
                    self.host
                        .clone()
                        .filter(|host| !is_wildcard_host(host))
                        .unwrap_or_else(|| FALLBACK_DIAL_HOST.to_string())
                } else {
                    record.host
                };
                Ok(codec.encode(&host, record.port))
            }
            DialTarget::Native(url) => {
                let parsed = Url::parse(&url)
                    .map_err(|e| TransportError::InvalidAddress(format!("{url}: {e}")))?;
                if WsCodec::for_scheme(parsed.scheme()).is_none() {
                    return Err(TransportError::InvalidAddress(format!(
                        "{url}: expected a ws:// or wss:// URL"
                    )));
                }
                Ok(url)
            }
        }
    }
}

impl fmt::Debug for WsPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsPlugin")
            .field("advertiser", &self.advertiser)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bound_port", &self.bound_port())
            .field("secure", &self.is_secure())
            .field("frame_mode", &self.frame_mode)
            .field("attached", &self.is_attached())
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

impl TransportPlugin for WsPlugin {
    fn name(&self) -> &'static str {
        WS_TRANSPORT
    }

    fn scope(&self) -> &ScopeConfig {
        self.advertiser.scope()
    }

    fn server(
        &self,
        on_connection: OnConnection,
        started: Option<StartedCallback>,
    ) -> Option<ServerCloser> {
        let runtime = runtime_handle()?;
        let (label, source) = match &self.attached {
            Some(listener) => (
                listener
                    .local_addr()
                    .map_or_else(|_| "attached listener".to_string(), |addr| addr.to_string()),
                ListenSource::Attach(listener.try_clone()),
            ),
            None => {
                let host = self.advertiser.bind_host();
                let port = self.port.unwrap_or_else(|| self.ports.allocate());
                (format!("{host}:{port}"), ListenSource::Bind { host, port })
            }
        };
        let plan = ListenPlan {
            source,
            tls: self.tls.clone(),
            frame_mode: self.frame_mode,
            bound_port: Arc::clone(&self.bound_port),
            fallback: self.fallback.clone(),
        };
        let (closer, task) = ServerCloser::new(label, runtime.clone());
        runtime.spawn(run_server(plan, task, on_connection, started));
        Some(closer)
    }

    fn client(&self, target: DialTarget, callback: ClientCallback) -> Aborter {
        let url = self.dial_url(target);
        let mode = self.frame_mode;
        Aborter::spawn(WS_TRANSPORT, callback, async move {
            let url = url?;
            debug!("Dialing {}", url);
            let (ws, _) = connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(format!("{url}: {e}")))?;
            Ok(ConnectionHandle::new(WsDuplex::new(ws, mode), url))
        })
    }

    fn parse(&self, address: &str) -> Option<AddressRecord> {
        WsCodec::plain().decode(address)
    }

    fn stringify(&self, target: &Scope) -> Option<String> {
        self.advertiser
            .stringify(&self.codec(), target, self.advertised_port())
    }
}

fn report(started: &mut Option<StartedCallback>, result: TransportResult<SocketAddr>) {
    if let Some(started) = started.take() {
        started(result);
    }
}

async fn run_server(
    plan: ListenPlan,
    task: ServerTask,
    on_connection: OnConnection,
    mut started: Option<StartedCallback>,
) {
    let acceptor = match plan.tls.as_ref().map(TlsConfig::acceptor).transpose() {
        Ok(acceptor) => acceptor,
        Err(e) => {
            error!("Failed to load TLS material for {}: {}", task.label(), e);
            task.failed(&e);
            report(&mut started, Err(e));
            return;
        }
    };

    let bind = match plan.source {
        ListenSource::Attach(listener) => {
            debug!("Attaching to {}", task.label());
            listener.and_then(|listener| {
                listener.set_nonblocking(true)?;
                TcpListener::from_std(listener)
            })
        }
        ListenSource::Bind { host, port } => {
            debug!("Binding {}", task.label());
            tokio::select! {
                () = task.shutdown_requested() => {
                    report(&mut started, Err(TransportError::aborted(WS_TRANSPORT)));
                    return;
                }
                bind = TcpListener::bind((host.as_str(), port)) => bind,
            }
        }
    };

    let listener = match bind.and_then(|listener| {
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }) {
        Ok((listener, local_addr)) => {
            if !task.listening(local_addr) {
                report(&mut started, Err(TransportError::aborted(WS_TRANSPORT)));
                return;
            }
            plan.bound_port.store(local_addr.port(), Ordering::Release);
            debug!("Listening on {}", local_addr);
            report(&mut started, Ok(local_addr));
            listener
        }
        Err(e) => {
            let err = TransportError::BindFailed {
                address: task.label().to_string(),
                reason: e.to_string(),
            };
            error!("{}", err);
            task.failed(&err);
            report(&mut started, Err(err));
            return;
        }
    };

    let inbound = Inbound {
        acceptor,
        frame_mode: plan.frame_mode,
        fallback: plan.fallback,
        on_connection,
    };
    loop {
        tokio::select! {
            () = task.shutdown_requested() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tokio::spawn(upgrade(stream, remote, inbound.clone()));
                }
                Err(e) => {
                    error!("Failed to accept connection on {}: {}", task.label(), e);
                    break;
                }
            }
        }
    }

    drop(listener);
    debug!("Accept loop on {} finished", task.label());
}

/// Runs the TLS and WebSocket handshakes for one accepted socket and hands the
/// result to the connection handler.
async fn upgrade(stream: TcpStream, remote: SocketAddr, inbound: Inbound) {
    let on_connection = Arc::clone(&inbound.on_connection);
    let result = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshakes(stream, remote, inbound))
        .await
        .unwrap_or_else(|_| Err(TransportError::Handshake("timed out".into())));

    match result {
        Ok(Some(conn)) => {
            info!("Accepted connection from {}", conn.peer_address());
            on_connection(conn);
        }
        Ok(None) => debug!("Answered plain HTTP request from {}", remote),
        Err(e) => debug!("Dropped connection from {}: {}", remote, e),
    }
}

async fn handshakes(
    stream: TcpStream,
    remote: SocketAddr,
    inbound: Inbound,
) -> TransportResult<Option<ConnectionHandle>> {
    match &inbound.acceptor {
        Some(acceptor) => {
            let tls = acceptor
                .accept(stream)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            serve(tls, remote, &inbound).await
        }
        None => serve(stream, remote, &inbound).await,
    }
}

/// Answers a plain HTTP request through the fallback responder, or completes
/// the WebSocket handshake. `None` means the request was answered.
async fn serve<S>(
    mut stream: S,
    remote: SocketAddr,
    inbound: &Inbound,
) -> TransportResult<Option<ConnectionHandle>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Some(fallback) = &inbound.fallback else {
        return handshake(Rewind::new(Bytes::new(), stream), remote, inbound.frame_mode)
            .await
            .map(Some);
    };

    let head = read_head(&mut stream)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    let request = parse_head(&head).map_err(|e| TransportError::Handshake(e.to_string()))?;
    if is_upgrade(&request) {
        return handshake(Rewind::new(head, stream), remote, inbound.frame_mode)
            .await
            .map(Some);
    }

    debug!("{} {} from {}", request.method(), request.uri(), remote);
    let response = fallback(request);
    write_response(&mut stream, response).await?;
    Ok(None)
}

async fn handshake<S>(
    stream: S,
    remote: SocketAddr,
    mode: FrameMode,
) -> TransportResult<ConnectionHandle>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut origin = None;
    let ws = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            origin = request
                .headers()
                .get(ORIGIN)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            Ok(response)
        },
    )
    .await
    .map_err(|e| TransportError::Handshake(e.to_string()))?;

    let peer = peer_address(origin.as_deref(), remote);
    Ok(ConnectionHandle::new(WsDuplex::new(ws, mode), peer))
}
