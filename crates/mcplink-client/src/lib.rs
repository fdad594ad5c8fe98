//! # mcplink client
//!
//! The session layer of an MCP client: it correlates JSON-RPC requests with
//! their responses over any [`Transport`], drives the
//! `initialize` handshake, tracks session state and manages many sessions at
//! once.
//!
//! ## Architecture
//!
//! ```text
//! McpClient            transport factory registry, config-driven connect
//!    ↓
//! SessionManager       name → Session, bulk teardown, stats
//!    ↓
//! Session              handshake, typed operations, close
//!    ↓
//! RequestCorrelator    ids, pending table, deadline-bounded receive loop
//!    ↓
//! Transport            connect / send / receive(timeout) / disconnect
//! ```
//!
//! A session has at most one request in flight. Requests on different
//! sessions run independently.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcplink_client::{McpClient, TransportConfig};
//! use serde_json::json;
//!
//! # async fn example() -> mcplink_client::McpResult<()> {
//! let client = McpClient::with_defaults();
//! let session = client
//!     .create_session("stdio", TransportConfig::command("my-mcp-server", ["--stdio"]))
//!     .await?;
//!
//! let info = session.initialize().await?;
//! println!("connected to {}", info.server_info.name);
//!
//! let result = session.call_tool("echo", Some(json!({"msg": "hi"}))).await?;
//! println!("{}", result.text().unwrap_or_default());
//!
//! client.shutdown().await;
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

pub mod client;
pub mod config;
pub mod logging;
pub mod manager;
pub mod session;

#[cfg(test)]
mod test_support;

pub use client::McpClient;
pub use config::{
    ClientConfig, ClientInfo, ConfigError, ServerConfig, SessionConfig, SessionConfigBuilder,
    SessionSettings,
};
pub use logging::LoggingConfig;
pub use manager::{CloseReport, SessionManager, SessionStats};
pub use session::correlator::{RequestCorrelator, UnexpectedMessageHook, receive_timeout};
pub use session::state::{SessionState, SessionStatus};
pub use session::Session;

pub use mcplink_protocol::{
    CallToolResult, ErrorKind, Implementation, InitializeResult, JsonRpcMessage,
    JsonRpcNotification, McpError, McpResult, RequestId,
};
pub use mcplink_transport_traits::{
    Transport, TransportConfig, TransportError, TransportFactory, TransportResult, TransportState,
    TransportType,
};
#[cfg(feature = "stdio")]
pub use mcplink_stdio::{StdioTransport, StdioTransportFactory};
pub use tokio_util::sync::CancellationToken;
