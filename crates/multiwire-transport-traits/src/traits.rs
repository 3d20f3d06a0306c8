//! The transport plugin contract.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::address::{AddressRecord, DialTarget};
use crate::client::{Aborter, ClientAttempt};
use crate::connection::ConnectionHandle;
use crate::error::{TransportError, TransportResult};
use crate::scope::{Scope, ScopeConfig};
use crate::server::ServerCloser;

/// Receives every connection a listener accepts. May run concurrently for
/// concurrent accepts.
pub type OnConnection = Arc<dyn Fn(ConnectionHandle) + Send + Sync>;

/// Reports the outcome of starting a listener, with the bound address on success.
pub type StartedCallback = Box<dyn FnOnce(TransportResult<SocketAddr>) + Send>;

/// Reports the outcome of a dial.
pub type ClientCallback = Box<dyn FnOnce(TransportResult<ConnectionHandle>) + Send>;

/// Reports the outcome of closing a listener.
pub type CloseCallback = Box<dyn FnOnce(TransportResult<()>) + Send>;

/// Future returned by [`TransportPlugin::listen`].
pub type ListenFuture = Pin<Box<dyn Future<Output = TransportResult<ServerCloser>> + Send>>;

/// The ambient tokio runtime, if there is one.
pub fn runtime_handle() -> Option<Handle> {
    Handle::try_current().ok()
}

/// One transport's implementation of the listen/dial/address contract.
///
/// Plugins share no base type; a combinator holds them as
/// `Arc<dyn TransportPlugin>` and tries each in turn.
pub trait TransportPlugin: Send + Sync + fmt::Debug {
    /// Transport tag, e.g. `net` or `ws`.
    fn name(&self) -> &'static str;

    /// The scope this instance is configured with.
    fn scope(&self) -> &ScopeConfig;

    /// Starts listening.
    ///
    /// `started` fires exactly once: with the bound address, or with the bind
    /// error. `on_connection` never fires before a successful `started`, and
    /// never after a failed one. Returns `None` when this transport cannot
    /// listen in the current environment (no tokio runtime).
    fn server(
        &self,
        on_connection: OnConnection,
        started: Option<StartedCallback>,
    ) -> Option<ServerCloser>;

    /// Dials `target`; `callback` fires exactly once with the connection or an
    /// error. The returned [`Aborter`] cancels the attempt.
    fn client(&self, target: DialTarget, callback: ClientCallback) -> Aborter;

    /// Decodes one of this transport's canonical address strings; `None` for
    /// anything else.
    fn parse(&self, address: &str) -> Option<AddressRecord>;

    /// Returns this instance's addresses for `target`, joined with `;`.
    ///
    /// `None` when `target` is outside the configured scope or nothing is
    /// advertisable in it.
    fn stringify(&self, target: &Scope) -> Option<String>;

    /// Starts listening and waits for the started callback.
    ///
    /// `None` means the transport is unsupported here, as for [`server`](Self::server).
    fn listen(&self, on_connection: OnConnection) -> Option<ListenFuture> {
        let (tx, rx) = oneshot::channel();
        let closer = self.server(
            on_connection,
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        )?;
        Some(Box::pin(async move {
            match rx.await {
                Ok(Ok(_)) => Ok(closer),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(TransportError::Internal(
                    "listener start task ended without reporting".into(),
                )),
            }
        }))
    }

    /// Dials `target`, returning an awaitable attempt.
    fn dial(&self, target: DialTarget) -> ClientAttempt {
        let (tx, rx) = oneshot::channel();
        let aborter = self.client(
            target,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        ClientAttempt::new(rx, aborter)
    }
}
