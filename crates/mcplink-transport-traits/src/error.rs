//! Transport error types.

use std::time::Duration;

use mcplink_protocol::{ErrorKind, McpError, MessageError};
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised while moving messages over a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The operation needs a connected transport.
    #[error("Transport is not connected")]
    NotConnected,

    /// Failed to send a message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive a message.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The peer violated the framing rules of the transport.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Connection establishment did not finish in time.
    #[error("Connection timed out after {timeout:?}")]
    ConnectionTimeout {
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// One inbound message could not be turned into text; the stream goes on.
    #[error("Malformed inbound message: {0}")]
    Malformed(MessageError),

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The requested transport is not available.
    #[error("Transport not available: {0}")]
    NotAvailable(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A message is larger than the configured limit.
    #[error("Message size ({size} bytes) exceeds maximum allowed ({max} bytes)")]
    MessageTooLarge {
        /// The actual size of the message in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },
}

impl TransportError {
    /// Whether the connection is gone and the session cannot continue.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ConnectionLost(_)
                | Self::NotConnected
                | Self::ConnectionTimeout { .. }
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::ConfigurationError(_) | TransportError::NotAvailable(_) => {
                ErrorKind::Configuration
            }
            TransportError::ProtocolError(_) => ErrorKind::Protocol,
            TransportError::Internal(_) => ErrorKind::Internal,
            TransportError::Malformed(inner) => {
                return McpError::from(inner.clone()).with_component("transport");
            }
            _ => ErrorKind::Transport,
        };

        McpError::new(kind, err.to_string()).with_component("transport")
    }
}
