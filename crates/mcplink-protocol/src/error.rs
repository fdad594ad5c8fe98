//! Unified error handling for the session core.
//!
//! Every fallible operation in the workspace returns [`McpResult`]. The
//! [`ErrorKind`] separates failures raised locally (validation, codec,
//! transport, protocol, timeout, cancellation) from errors the peer reported
//! through a JSON-RPC error object. Remote errors keep the peer's code,
//! message and data verbatim so callers can branch on MCP-specific codes.
//!
//! ## Example
//!
//! ```rust
//! use mcplink_protocol::{ErrorKind, JsonRpcError, McpError};
//!
//! let err = McpError::remote(JsonRpcError::new(-32001, "Tool not found: echo"));
//! assert!(err.is_remote());
//! assert_eq!(err.kind, ErrorKind::ToolNotFound);
//! assert_eq!(err.remote_code(), Some(-32001));
//! ```

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::jsonrpc::{JsonRpcError, McpErrorCode};

/// Result type alias for MCP operations
pub type McpResult<T> = std::result::Result<T, McpError>;

/// Unified MCP error type
///
/// The `context` and `remote` fields are boxed to keep `Result<T, McpError>` small.
#[derive(Debug, Clone)]
pub struct McpError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: Option<Box<ErrorContext>>,
    /// Error object returned by the peer, if this error came off the wire
    remote: Option<Box<JsonRpcError>>,
}

/// Additional error context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Operation being performed
    pub operation: Option<String>,
    /// Component where error occurred
    pub component: Option<String>,
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Time spent before the failure, for timeouts
    pub elapsed: Option<Duration>,
}

/// Error classification for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Raised locally ===
    /// Malformed input at the API boundary
    Validation,
    /// A value could not be serialized
    Encoding,
    /// Bytes could not be parsed as JSON
    Decoding,
    /// The underlying channel failed
    Transport,
    /// JSON-RPC/MCP structural violation or lifecycle misuse
    Protocol,
    /// A request outlived its deadline
    Timeout,
    /// The caller cancelled the operation
    Cancelled,
    /// Invalid configuration
    Configuration,

    // === JSON-RPC standard ===
    /// Parse error (-32700)
    ParseError,
    /// Invalid request (-32600)
    InvalidRequest,
    /// Method not found (-32601)
    MethodNotFound,
    /// Invalid params (-32602)
    InvalidParams,
    /// Internal error (-32603)
    Internal,

    // === MCP-specific ===
    /// Tool not found (-32001)
    ToolNotFound,
    /// Tool execution failed (-32002)
    ToolExecutionFailed,
    /// Prompt not found (-32003)
    PromptNotFound,
    /// Resource not found (-32004)
    ResourceNotFound,
    /// Resource access denied (-32005)
    ResourceAccessDenied,
    /// Capability not supported (-32006)
    CapabilityNotSupported,
    /// Protocol version mismatch (-32007)
    ProtocolVersionMismatch,
    /// Authentication required (-32008)
    Authentication,
}

impl McpError {
    /// Create a new error with kind and message
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
            remote: None,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an encoding error
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding, message)
    }

    /// Create a decoding error
    #[must_use]
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decoding, message)
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message).with_component("transport")
    }

    /// Create a protocol error
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Create a request timeout error naming the request and the time it waited
    #[must_use]
    pub fn timeout(request_id: impl fmt::Display, elapsed: Duration) -> Self {
        let request_id = request_id.to_string();
        let mut err = Self::new(
            ErrorKind::Timeout,
            format!(
                "Request '{}' timed out after {:.2}s",
                request_id,
                elapsed.as_secs_f64()
            ),
        )
        .with_request_id(request_id);
        if let Some(ctx) = err.context.as_mut() {
            ctx.elapsed = Some(elapsed);
        }
        err
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create an invalid params error
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    /// Create a capability not supported error
    #[must_use]
    pub fn capability_not_supported(capability: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::CapabilityNotSupported,
            format!("Capability not supported by server: {}", capability.into()),
        )
    }

    /// Create a protocol version mismatch error
    #[must_use]
    pub fn protocol_version_mismatch(
        client_version: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::ProtocolVersionMismatch,
            format!(
                "Protocol version mismatch: client requested {}, server answered {}",
                client_version.into(),
                server_version.into()
            ),
        )
    }

    /// Wrap an error object returned by the peer.
    ///
    /// The kind is derived from the code; the object itself is kept verbatim.
    #[must_use]
    pub fn remote(error: JsonRpcError) -> Self {
        Self {
            kind: ErrorKind::from_code(error.code),
            message: error.message.clone(),
            context: None,
            remote: Some(Box::new(error)),
        }
    }

    /// Set the operation context
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(Box::default);
        ctx.operation = Some(operation.into());
        self
    }

    /// Set the component context
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(Box::default);
        ctx.component = Some(component.into());
        self
    }

    /// Set the request ID context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(Box::default);
        ctx.request_id = Some(request_id.into());
        self
    }

    /// Request ID attached to this error, if any
    pub fn request_id(&self) -> Option<&str> {
        self.context.as_ref()?.request_id.as_deref()
    }

    /// Time waited before a timeout fired
    pub fn elapsed(&self) -> Option<Duration> {
        self.context.as_ref()?.elapsed
    }

    /// Whether the peer reported this error
    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// The peer's error object, verbatim
    pub fn remote_error(&self) -> Option<&JsonRpcError> {
        self.remote.as_deref()
    }

    /// The peer's error code
    pub fn remote_code(&self) -> Option<i32> {
        self.remote.as_ref().map(|e| e.code)
    }

    /// The peer's error data
    pub fn remote_data(&self) -> Option<&Value> {
        self.remote.as_ref()?.data.as_ref()
    }

    /// Whether this is a protocol-class failure (structure, lifecycle or timeout)
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Protocol | ErrorKind::Timeout | ErrorKind::ProtocolVersionMismatch
        )
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout | ErrorKind::Transport)
    }

    /// Get the JSON-RPC error code for this error.
    ///
    /// Remote errors report the peer's code unchanged.
    pub fn jsonrpc_code(&self) -> i32 {
        match &self.remote {
            Some(remote) => remote.code,
            None => self.kind.code(),
        }
    }

    /// The MCP-specific code, when the error falls in the -32000..-32009 range
    pub fn mcp_code(&self) -> Option<McpErrorCode> {
        McpErrorCode::from_code(self.jsonrpc_code())
    }

    /// Convert into a JSON-RPC error object suitable for the wire
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match &self.remote {
            Some(remote) => (**remote).clone(),
            None => JsonRpcError::new(self.kind.code(), self.message.clone()),
        }
    }
}

impl ErrorKind {
    /// Classify a JSON-RPC error code.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::Internal,
            other => match McpErrorCode::from_code(other) {
                Some(McpErrorCode::TransportError) => Self::Transport,
                Some(McpErrorCode::ToolNotFound) => Self::ToolNotFound,
                Some(McpErrorCode::ToolExecutionFailed) => Self::ToolExecutionFailed,
                Some(McpErrorCode::PromptNotFound) => Self::PromptNotFound,
                Some(McpErrorCode::ResourceNotFound) => Self::ResourceNotFound,
                Some(McpErrorCode::ResourceAccessDenied) => Self::ResourceAccessDenied,
                Some(McpErrorCode::CapabilityNotSupported) => Self::CapabilityNotSupported,
                Some(McpErrorCode::ProtocolError) => Self::Protocol,
                Some(McpErrorCode::AuthenticationRequired) => Self::Authentication,
                Some(McpErrorCode::ValidationFailed) => Self::Validation,
                None => Self::Internal,
            },
        }
    }

    /// JSON-RPC code used when this kind is reported on the wire
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError | Self::Decoding => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal | Self::Encoding | Self::Cancelled | Self::Configuration => -32603,
            Self::Transport => McpErrorCode::TransportError.code(),
            Self::ToolNotFound => McpErrorCode::ToolNotFound.code(),
            Self::ToolExecutionFailed => McpErrorCode::ToolExecutionFailed.code(),
            Self::PromptNotFound => McpErrorCode::PromptNotFound.code(),
            Self::ResourceNotFound => McpErrorCode::ResourceNotFound.code(),
            Self::ResourceAccessDenied => McpErrorCode::ResourceAccessDenied.code(),
            Self::CapabilityNotSupported => McpErrorCode::CapabilityNotSupported.code(),
            Self::Protocol | Self::Timeout | Self::ProtocolVersionMismatch => {
                McpErrorCode::ProtocolError.code()
            }
            Self::Authentication => McpErrorCode::AuthenticationRequired.code(),
            Self::Validation => McpErrorCode::ValidationFailed.code(),
        }
    }

    /// Get a human-readable description
    pub const fn description(self) -> &'static str {
        match self {
            Self::Validation => "Validation error",
            Self::Encoding => "Encoding error",
            Self::Decoding => "Decoding error",
            Self::Transport => "Transport error",
            Self::Protocol => "Protocol error",
            Self::Timeout => "Request timed out",
            Self::Cancelled => "Operation cancelled",
            Self::Configuration => "Configuration error",
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid parameters",
            Self::Internal => "Internal error",
            Self::ToolNotFound => "Tool not found",
            Self::ToolExecutionFailed => "Tool execution failed",
            Self::PromptNotFound => "Prompt not found",
            Self::ResourceNotFound => "Resource not found",
            Self::ResourceAccessDenied => "Resource access denied",
            Self::CapabilityNotSupported => "Capability not supported",
            Self::ProtocolVersionMismatch => "Protocol version mismatch",
            Self::Authentication => "Authentication required",
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(remote) = &self.remote {
            write!(f, " (code: {})", remote.code)?;
        }
        if let Some(ctx) = &self.context {
            if let Some(op) = &ctx.operation {
                write!(f, " (operation: {})", op)?;
            }
            if let Some(comp) = &ctx.component {
                write!(f, " (component: {})", comp)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for McpError {}

impl From<Box<McpError>> for McpError {
    fn from(boxed: Box<McpError>) -> Self {
        *boxed
    }
}
