//! # mcplink transport traits
//!
//! The contract every transport implements to carry JSON-RPC messages for a
//! session: connect, send one message, receive one message with an optional
//! timeout, report connection state, disconnect.
//!
//! A `receive` that returns `Ok(None)` means "nothing arrived in time", not
//! end of stream; callers tell the two apart with [`Transport::is_connected`].
//!
//! ```rust,ignore
//! use mcplink_transport_traits::{Transport, TransportResult, TransportState, TransportType};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     fn transport_type(&self) -> TransportType { /* ... */ }
//!     // ... other trait methods
//! }
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

mod config;
mod error;
mod traits;
mod types;

pub use config::{LimitsConfig, validate_message_size};
pub use error::{TransportError, TransportResult};
pub use traits::{Transport, TransportFactory};
pub use types::{TransportConfig, TransportState, TransportType};
