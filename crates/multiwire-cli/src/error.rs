//! Error types for CLI operations

use multiwire::TransportError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Transport layer errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No configured transport understands the address
    #[error("Address not recognised: {0}")]
    Unrecognised(String),

    /// The transport cannot run here
    #[error("Transport '{0}' is not supported in this environment")]
    Unsupported(&'static str),

    /// Operation timed out
    #[error("Operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// How long it waited
        elapsed: std::time::Duration,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CliError {
    /// Hints for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Unrecognised(_) => vec![
                "net addresses look like net:<host>:<port>",
                "WebSocket addresses look like ws://host[:port] or wss://host[:port]",
            ],
            Self::Transport(TransportError::ConnectionFailed(_)) => vec![
                "Check if the listener is running",
                "Verify the address with `multiwire parse`",
            ],
            Self::Transport(TransportError::BindFailed { .. }) => vec![
                "Pick another port with --port",
                "Leave the port unset to have one allocated",
            ],
            Self::Timeout { .. } => vec!["Increase the timeout with --timeout"],
            _ => vec![],
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = CliError::Unrecognised("udp:1.2.3.4:5".into());
        assert_eq!(err.to_string(), "Address not recognised: udp:1.2.3.4:5");
        assert_eq!(err.suggestions().len(), 2);

        let err: CliError = TransportError::aborted("net").into();
        assert_eq!(err.to_string(), "Transport error: multiwire.net: aborted");
        assert!(err.suggestions().is_empty());
    }
}
