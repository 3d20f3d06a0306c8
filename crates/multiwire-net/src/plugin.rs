//! The stream transport plugin.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use multiwire_transport_traits::{
    Aborter, AddressCodec, AddressRecord, AddressResolver, Advertiser, ClientCallback,
    ConnectionHandle, DialTarget, OnConnection, Scope, ScopeConfig, ServerCloser, ServerTask,
    StartedCallback, TransportError, TransportPlugin, TransportResult, runtime_handle,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::codec::{NET_TRANSPORT, NetCodec, split_host_port};
use crate::config::{NetConfig, NetPluginBuilder};
use crate::stream::{NetStream, StreamOptions};

/// TCP transport plugin.
///
/// The listening port is fixed when the plugin is built; every `server()` call
/// binds the same port.
#[derive(Debug)]
pub struct NetPlugin {
    advertiser: Advertiser,
    port: u16,
    /// Port reported by the most recent successful bind, `0` before any
    bound_port: Arc<AtomicU16>,
    options: StreamOptions,
}

impl NetPlugin {
    pub(crate) fn new(config: NetConfig, resolver: AddressResolver, port: u16) -> Self {
        Self {
            advertiser: Advertiser::new(resolver, config.scope, config.host, config.external),
            port,
            bound_port: Arc::new(AtomicU16::new(0)),
            options: StreamOptions {
                allow_half_open: config.allow_half_open,
                nodelay: config.nodelay,
            },
        }
    }

    /// Create a builder
    #[must_use]
    pub fn builder() -> NetPluginBuilder {
        NetPluginBuilder::new()
    }

    /// Build a plugin straight from a configuration.
    #[must_use]
    pub fn from_config(config: NetConfig) -> Self {
        NetPluginBuilder::new().config(config).build()
    }

    /// The port `server()` binds; `0` lets the OS choose.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The port the listener reported, once one has been bound.
    pub fn bound_port(&self) -> Option<u16> {
        match self.bound_port.load(Ordering::Acquire) {
            0 => None,
            port => Some(port),
        }
    }

    fn advertised_port(&self) -> Option<u16> {
        self.bound_port().or(Some(self.port))
    }

    fn resolve_target(target: DialTarget) -> TransportResult<(String, u16)> {
        match target {
            DialTarget::Address(record) if record.transport == NET_TRANSPORT => {
                Ok((record.host, record.port))
            }
            DialTarget::Address(record) => Err(TransportError::InvalidAddress(format!(
                "{} address given to the net transport",
                record.transport
            ))),
            DialTarget::Native(native) => split_host_port(&native).ok_or_else(|| {
                TransportError::InvalidAddress(format!("expected host:port, got {native:?}"))
            }),
        }
    }
}

impl TransportPlugin for NetPlugin {
    fn name(&self) -> &'static str {
        NET_TRANSPORT
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
        let host = self.advertiser.bind_host();
        let (closer, task) = ServerCloser::new(format!("{host}:{}", self.port), runtime.clone());
        runtime.spawn(run_server(
            task,
            host,
            self.port,
            self.options,
            Arc::clone(&self.bound_port),
            on_connection,
            started,
        ));
        Some(closer)
    }

    fn client(&self, target: DialTarget, callback: ClientCallback) -> Aborter {
        let resolved = Self::resolve_target(target);
        let options = self.options;
        Aborter::spawn(NET_TRANSPORT, callback, async move {
            let (host, port) = resolved?;
            let peer = NetCodec.encode(&host, port);
            debug!("Dialing {}", peer);
            let stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| TransportError::ConnectionFailed(format!("{peer}: {e}")))?;
            let stream = NetStream::new(stream, options)?;
            Ok(ConnectionHandle::new(stream, peer))
        })
    }

    fn parse(&self, address: &str) -> Option<AddressRecord> {
        NetCodec.decode(address)
    }

    fn stringify(&self, target: &Scope) -> Option<String> {
        self.advertiser
            .stringify(&NetCodec, target, self.advertised_port())
    }
}

fn report(started: &mut Option<StartedCallback>, result: TransportResult<SocketAddr>) {
    if let Some(started) = started.take() {
        started(result);
    }
}

async fn run_server(
    task: ServerTask,
    host: String,
    port: u16,
    options: StreamOptions,
    bound_port: Arc<AtomicU16>,
    on_connection: OnConnection,
    mut started: Option<StartedCallback>,
) {
    debug!("Binding {}", task.label());
    let bind = tokio::select! {
        () = task.shutdown_requested() => {
            report(&mut started, Err(TransportError::aborted(NET_TRANSPORT)));
            return;
        }
        bind = TcpListener::bind((host.as_str(), port)) => bind,
    };

    let listener = match bind.and_then(|listener| {
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }) {
        Ok((listener, local_addr)) => {
            if !task.listening(local_addr) {
                report(&mut started, Err(TransportError::aborted(NET_TRANSPORT)));
                return;
            }
            bound_port.store(local_addr.port(), Ordering::Release);
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

    loop {
        tokio::select! {
            () = task.shutdown_requested() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let peer = NetCodec.encode(&remote.ip().to_string(), remote.port());
                    info!("Accepted connection from {}", peer);
                    match NetStream::new(stream, options) {
                        Ok(stream) => on_connection(ConnectionHandle::new(stream, peer)),
                        Err(e) => error!("Failed to configure connection from {}: {}", peer, e),
                    }
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
