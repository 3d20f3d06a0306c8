//! Outbound dial lifecycle.
//!
//! Every dial resolves exactly once, to connected, failed or aborted. The
//! connect future runs on its own task; [`Aborter::abort`] races it through a
//! shared [`OneShot`] and cancels the task, which drops the half-open socket.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::error::{TransportError, TransportResult};
use crate::latch::OneShot;
use crate::traits::{ClientCallback, runtime_handle};

/// Dial state machine: `Connecting -> {Connected | Failed | Aborted}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// The connect is in flight.
    Connecting,
    /// The connection was handed to the callback.
    Connected,
    /// The connect failed.
    Failed {
        /// A description of the failure reason.
        reason: String,
    },
    /// The caller aborted before the connect resolved.
    Aborted,
}

struct AttemptShared {
    transport: &'static str,
    state: Arc<Mutex<ClientState>>,
    latch: OneShot<TransportResult<ConnectionHandle>>,
    cancel: CancellationToken,
}

/// Cancels one in-flight dial.
///
/// Cloning yields another handle to the same attempt.
#[derive(Clone)]
pub struct Aborter {
    shared: Arc<AttemptShared>,
}

impl Aborter {
    /// Runs `connect` for the named transport and reports its outcome to
    /// `callback` exactly once.
    ///
    /// Without a tokio runtime the callback receives
    /// [`TransportError::NotAvailable`] before this returns.
    pub fn spawn<F>(transport: &'static str, callback: ClientCallback, connect: F) -> Self
    where
        F: Future<Output = TransportResult<ConnectionHandle>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(ClientState::Connecting));
        let latch_state = Arc::clone(&state);
        let latch = OneShot::new(move |outcome: TransportResult<ConnectionHandle>| {
            *latch_state.lock() = match &outcome {
                Ok(_) => ClientState::Connected,
                Err(e) if e.is_abort() => ClientState::Aborted,
                Err(e) => ClientState::Failed {
                    reason: e.to_string(),
                },
            };
            callback(outcome);
        });

        let aborter = Self {
            shared: Arc::new(AttemptShared {
                transport,
                state,
                latch,
                cancel: CancellationToken::new(),
            }),
        };

        let Some(runtime) = runtime_handle() else {
            aborter.shared.latch.fire(Err(TransportError::NotAvailable(format!(
                "multiwire.{transport} needs a tokio runtime to dial"
            ))));
            return aborter;
        };

        let shared = Arc::clone(&aborter.shared);
        runtime.spawn(async move {
            let outcome = tokio::select! {
                () = shared.cancel.cancelled() => return,
                outcome = connect => outcome,
            };
            if let Err(e) = &outcome {
                debug!("multiwire.{} dial failed: {}", shared.transport, e);
            }
            if !shared.latch.fire(outcome) {
                debug!(
                    "multiwire.{} dial resolved after abort, dropping it",
                    shared.transport
                );
            }
        });

        aborter
    }

    /// Aborts the dial. The callback receives [`TransportError::Aborted`] if it
    /// has not fired yet; otherwise this is a no-op for the callback.
    pub fn abort(&self) {
        if self
            .shared
            .latch
            .fire(Err(TransportError::aborted(self.shared.transport)))
        {
            debug!("multiwire.{} dial aborted", self.shared.transport);
        }
        self.shared.cancel.cancel();
    }

    /// Current state of the attempt.
    pub fn state(&self) -> ClientState {
        self.shared.state.lock().clone()
    }

    /// Returns `true` once the attempt has reported its outcome.
    pub fn is_resolved(&self) -> bool {
        self.shared.latch.has_fired()
    }
}

impl fmt::Debug for Aborter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aborter")
            .field("transport", &self.shared.transport)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

/// Awaitable dial, produced by [`TransportPlugin::dial`](crate::TransportPlugin::dial).
///
/// Dropping an attempt that has not resolved aborts it.
#[derive(Debug)]
pub struct ClientAttempt {
    outcome: oneshot::Receiver<TransportResult<ConnectionHandle>>,
    aborter: Aborter,
}

impl ClientAttempt {
    /// Wraps the receiving end of a dial callback.
    pub fn new(
        outcome: oneshot::Receiver<TransportResult<ConnectionHandle>>,
        aborter: Aborter,
    ) -> Self {
        Self { outcome, aborter }
    }

    /// A handle that can abort this attempt from elsewhere.
    pub fn aborter(&self) -> Aborter {
        self.aborter.clone()
    }

    /// Aborts the attempt; awaiting it then yields [`TransportError::Aborted`].
    pub fn abort(&self) {
        self.aborter.abort();
    }
}

impl Future for ClientAttempt {
    type Output = TransportResult<ConnectionHandle>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(TransportError::Internal("dial callback dropped".into()))
            })
        })
    }
}

impl Drop for ClientAttempt {
    fn drop(&mut self) {
        self.aborter.abort();
    }
}
