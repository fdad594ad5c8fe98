//! # mcplink stdio transport
//!
//! Runs an MCP server as a child process and talks to it over its
//! stdin/stdout, one JSON-RPC message per line:
//!
//! - Outbound messages must not contain a literal `\n` or `\r`; they would
//!   split the message across lines and desynchronize the stream.
//! - Inbound lines are read by a background task into a bounded channel, so
//!   `receive(timeout)` is a timed channel wait.
//! - A line that is not UTF-8 surfaces as one `TransportError::Malformed`
//!   from `receive`; a line over the size limit is skipped. Neither ends the
//!   stream.
//! - The child's stderr is forwarded to `tracing` at debug level.
//! - When the child closes its stdout the transport reports itself
//!   disconnected; messages already read can still be received.
//!
//! ```rust,no_run
//! use mcplink_stdio::StdioTransport;
//! use mcplink_transport_traits::{Transport, TransportConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = StdioTransport::new(TransportConfig::command("my-mcp-server", ["--stdio"]));
//! transport.connect().await?;
//! transport
//!     .send(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#.to_string())
//!     .await?;
//! let reply = transport.receive(Some(std::time::Duration::from_secs(5))).await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::missing_errors_doc)]

mod transport;

pub use transport::{StdioTransport, StdioTransportFactory};

// Re-export common types for convenience
pub use mcplink_transport_traits::{
    Transport, TransportConfig, TransportError, TransportFactory, TransportResult,
    TransportState, TransportType,
};
