//! Core transport traits.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::types::{TransportConfig, TransportState, TransportType};

/// A message channel a session runs over.
///
/// Messages are whole JSON-RPC documents as text; framing is the transport's
/// business. Implementations are written with `#[async_trait]`.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Returns the current state of the transport.
    async fn state(&self) -> TransportState;

    /// Establishes a connection to the remote endpoint.
    async fn connect(&self) -> TransportResult<()>;

    /// Closes the connection to the remote endpoint.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Sends a single message over the transport.
    async fn send(&self, message: String) -> TransportResult<()>;

    /// Receives a single message, waiting at most `timeout` (forever when `None`).
    ///
    /// `Ok(None)` means nothing arrived in time. It does not mean the stream
    /// ended; check [`is_connected`](Self::is_connected) for that.
    async fn receive(&self, timeout: Option<Duration>) -> TransportResult<Option<String>>;

    /// Returns `true` if the transport is currently in the `Connected` state.
    async fn is_connected(&self) -> bool {
        matches!(self.state().await, TransportState::Connected)
    }

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// A factory for creating instances of a specific transport type.
pub trait TransportFactory: Send + Sync + std::fmt::Debug {
    /// Returns the type of transport this factory creates.
    fn transport_type(&self) -> TransportType;

    /// Creates a new, unconnected transport with the given configuration.
    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>>;

    /// Returns `true` if this transport is available on the current system.
    fn is_available(&self) -> bool {
        true
    }
}
