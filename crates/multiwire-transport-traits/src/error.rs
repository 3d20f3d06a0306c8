//! Transport error types.

use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors surfaced through started, dial and close callbacks.
///
/// Malformed address strings and scope mismatches are not errors: `parse` and
/// `stringify` answer them with `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The listener could not bind its host and port.
    #[error("Failed to listen on {address}: {reason}")]
    BindFailed {
        /// The `host:port` the listener tried to bind
        address: String,
        /// Underlying failure description
        reason: String,
    },

    /// An outbound connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The caller aborted the operation before it resolved.
    #[error("{0}: aborted")]
    Aborted(String),

    /// `close` was called on a server that is not listening.
    #[error("Server on {0} is not listening")]
    NotListening(String),

    /// The transport cannot run in the current environment.
    #[error("Transport not available: {0}")]
    NotAvailable(String),

    /// A dial target could not be turned into a transport address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The WebSocket upgrade handshake failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// TLS material could not be loaded or the TLS session failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The plugin was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Creates the abort error for the named transport, e.g. `multiwire.net: aborted`.
    pub fn aborted(transport: &str) -> Self {
        Self::Aborted(format!("multiwire.{transport}"))
    }

    /// Returns `true` when the caller cancelled the operation, as opposed to
    /// the network refusing it.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
