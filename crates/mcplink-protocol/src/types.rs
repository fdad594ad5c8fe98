//! Typed payloads for the handful of MCP shapes the session core interprets.
//!
//! Everything else (tool schemas, resource contents, prompt messages) stays
//! as [`serde_json::Value`] and is passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::jsonrpc::RequestId;

/// Protocol version this client prefers
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol versions this client accepts from a server, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// MCP method names used by the session layer
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Handshake acknowledgement notification
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Liveness check
    pub const PING: &str = "ping";
    /// Tool listing
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation
    pub const TOOLS_CALL: &str = "tools/call";
    /// Resource listing
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Resource read
    pub const RESOURCES_READ: &str = "resources/read";
    /// Prompt listing
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// Prompt retrieval
    pub const PROMPTS_GET: &str = "prompts/get";
    /// Cancellation notification
    pub const CANCELLED: &str = "notifications/cancelled";
}

/// Name and version of an MCP implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    /// Create an implementation descriptor without a title
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

/// Params of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Version the client wants to speak
    pub protocol_version: String,
    /// Client capabilities
    pub capabilities: Value,
    /// Client identification
    pub client_info: Implementation,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Version the server chose
    pub protocol_version: String,
    /// Server capabilities
    #[serde(default = "empty_object")]
    pub capabilities: Value,
    /// Server identification
    pub server_info: Implementation,
    /// Usage hints for the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content blocks, kept as raw JSON
    #[serde(default)]
    pub content: Vec<Value>,
    /// Whether the tool reported a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Machine-readable output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Text of every `{"type":"text"}` block, in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| {
            (block.get("type")?.as_str()? == "text")
                .then(|| block.get("text")?.as_str())
                .flatten()
        })
    }

    /// All text blocks joined with newlines; `None` when there are none
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.texts().collect();
        (!texts.is_empty()).then(|| texts.join("\n"))
    }

    /// Whether the tool reported a failure
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// Params of `notifications/cancelled`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledNotification {
    /// Request being abandoned
    pub request_id: RequestId,
    /// Why it was abandoned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
