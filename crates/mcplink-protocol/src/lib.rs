//! # mcplink protocol
//!
//! Wire-level building blocks of the MCP session core: JSON-RPC 2.0 message
//! types, the JSON codec, the layered message validator and the unified error
//! taxonomy shared by every other crate in the workspace.
//!
//! ## Validation layers
//!
//! Incoming bytes pass through four layers, each with its own error variant
//! in [`MessageError`]:
//!
//! 1. UTF-8 well-formedness
//! 2. stdio framing (no literal line breaks) when strict mode is on
//! 3. JSON syntax, bounded in nesting depth by the [`JsonCodec`]
//! 4. JSON-RPC structure, including batch rules
//!
//! ```rust
//! use mcplink_protocol::{classify, MessageKind};
//!
//! let info = classify(br#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#).unwrap();
//! assert_eq!(info.kind, MessageKind::Request);
//! assert_eq!(info.method.as_deref(), Some("ping"));
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

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod ids;
pub mod jsonrpc;
pub mod types;
pub mod validation;

pub use codec::{CodecError, DEFAULT_MAX_DEPTH, JsonCodec};
pub use error::{ErrorContext, ErrorKind, McpError, McpResult};
pub use ids::{RequestIdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcBatch, JsonRpcError, JsonRpcErrorCode, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload,
    JsonRpcVersion, McpErrorCode, RequestId, ResponseId,
};
pub use types::{
    CallToolResult, CancelledNotification, Implementation, InitializeRequest, InitializeResult,
    PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS, methods,
};
pub use validation::{
    MessageError, MessageInfo, MessageKind, MessageValidator, ValidationLayer, classify,
    validate_message, validate_structure,
};

/// Default upper bound for a single wire message (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
