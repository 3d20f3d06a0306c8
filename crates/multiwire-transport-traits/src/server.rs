//! Listener lifecycle shared by every plugin.
//!
//! `server()` creates a [`ServerCloser`]/[`ServerTask`] pair. The task side is
//! moved into the spawned start/accept task and records the state transitions;
//! the closer side goes back to the caller. Dropping the task marks the server
//! closed and wakes any pending close, which is how "the port has been
//! released" is observed.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, warn};

use crate::error::{TransportError, TransportResult};
use crate::traits::CloseCallback;

/// Listener state machine: `Starting -> Listening -> Closing -> Closed`, or
/// `Starting -> Failed` when the bind fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    /// The bind has been requested but has not completed.
    Starting,
    /// Accepting connections on the given local address.
    Listening {
        /// Address reported by the bound listener.
        local_addr: SocketAddr,
    },
    /// Close requested; waiting for the listener to be released.
    Closing,
    /// The listener has been released.
    Closed,
    /// The listener never started.
    Failed {
        /// A description of the failure reason.
        reason: String,
    },
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Listening { local_addr } => write!(f, "listening on {local_addr}"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

struct ServerShared {
    /// `host:port` as configured, for log lines and errors
    label: String,
    state: Mutex<ServerState>,
    shutdown: CancellationToken,
    released: watch::Sender<bool>,
    runtime: Handle,
}

/// Caller-side handle of one listening instance.
///
/// Cloning yields another handle to the same listener.
#[derive(Clone)]
pub struct ServerCloser {
    shared: Arc<ServerShared>,
}

/// Task-side handle of one listening instance, owned by the start/accept task.
pub struct ServerTask {
    shared: Arc<ServerShared>,
}

impl ServerCloser {
    /// Creates the handle pair for a listener on `label`, in the `Starting` state.
    pub fn new(label: impl Into<String>, runtime: Handle) -> (Self, ServerTask) {
        let (released, _) = watch::channel(false);
        let shared = Arc::new(ServerShared {
            label: label.into(),
            state: Mutex::new(ServerState::Starting),
            shutdown: CancellationToken::new(),
            released,
            runtime,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ServerTask { shared },
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.shared.state.lock().clone()
    }

    /// The bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.shared.state.lock() {
            ServerState::Listening { local_addr } => Some(local_addr),
            _ => None,
        }
    }

    /// Stops accepting and releases the port.
    ///
    /// `callback` is invoked exactly once per call: with `Ok(())` after the
    /// listener has been dropped, or with [`TransportError::NotListening`] when
    /// the server is not starting or listening (already closed, closing, or
    /// failed). If the runtime the server was started on has shut down, the
    /// callback gets [`TransportError::Internal`] instead. Connections already
    /// delivered are left alone. Never panics.
    pub fn close(&self, callback: Option<CloseCallback>) {
        let accepted = {
            let mut state = self.shared.state.lock();
            match *state {
                ServerState::Starting | ServerState::Listening { .. } => {
                    *state = ServerState::Closing;
                    true
                }
                _ => false,
            }
        };

        if !accepted {
            let err = TransportError::NotListening(self.shared.label.clone());
            warn!("{}", err);
            if let Some(callback) = callback {
                callback(Err(err));
            }
            return;
        }

        debug!("Closing server on {}", self.shared.label);
        self.shared.shutdown.cancel();

        let mut released = self.shared.released.subscribe();
        let label = self.shared.label.clone();
        let report = CloseReport {
            label: label.clone(),
            callback,
        };
        // on a runtime that has shut down the future is dropped unpolled and
        // `report` answers from its Drop
        self.shared.runtime.spawn(async move {
            let result = released
                .wait_for(|released| *released)
                .await
                .map(|_| ())
                .map_err(|_| TransportError::Internal(format!("listener task for {label} vanished")));
            match &result {
                Ok(()) => debug!("No longer listening on {}", label),
                Err(e) => error!("Failed to close server on {}: {}", label, e),
            }
            report.deliver(result);
        });
    }

    /// Awaitable form of [`close`](Self::close).
    pub async fn shutdown(&self) -> TransportResult<()> {
        let (tx, rx) = oneshot::channel();
        self.close(Some(Box::new(move |result| {
            let _ = tx.send(result);
        })));
        rx.await
            .unwrap_or_else(|_| Err(TransportError::Internal("close callback dropped".into())))
    }
}

/// A pending close callback that still fires if the task delivering it is
/// dropped first.
struct CloseReport {
    label: String,
    callback: Option<CloseCallback>,
}

impl CloseReport {
    fn deliver(mut self, result: TransportResult<()>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for CloseReport {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            let err = TransportError::Internal(format!(
                "runtime for {} shut down before close completed",
                self.label
            ));
            error!("{}", err);
            callback(Err(err));
        }
    }
}

impl fmt::Debug for ServerCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCloser")
            .field("label", &self.shared.label)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

impl ServerTask {
    /// The configured `host:port` label.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Resolves once `close` has been requested.
    pub fn shutdown_requested(&self) -> WaitForCancellationFuture<'_> {
        self.shared.shutdown.cancelled()
    }

    /// Returns `true` once `close` has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Records a successful bind. Returns `false` if a close raced the bind, in
    /// which case the caller should drop the listener instead of accepting.
    pub fn listening(&self, local_addr: SocketAddr) -> bool {
        let mut state = self.shared.state.lock();
        if *state == ServerState::Starting {
            *state = ServerState::Listening { local_addr };
            true
        } else {
            false
        }
    }

    /// Records a failed start.
    pub fn failed(&self, error: &TransportError) {
        *self.shared.state.lock() = ServerState::Failed {
            reason: error.to_string(),
        };
    }
}

impl fmt::Debug for ServerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTask")
            .field("label", &self.shared.label)
            .finish()
    }
}

impl Drop for ServerTask {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if !matches!(*state, ServerState::Failed { .. }) {
                *state = ServerState::Closed;
            }
        }
        self.shared.released.send_replace(true);
    }
}
