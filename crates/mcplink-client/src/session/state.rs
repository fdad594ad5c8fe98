//! Session lifecycle state and negotiated server capabilities

use std::fmt;

use chrono::{DateTime, Utc};
use mcplink_protocol::capabilities;
use mcplink_protocol::{Implementation, InitializeResult};
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

/// Lifecycle position of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No transport connection
    #[default]
    Disconnected,
    /// Transport connecting
    Connecting,
    /// Transport connected, handshake not started
    Connected,
    /// `initialize` sent, waiting for the result
    Initializing,
    /// Handshake complete
    Ready,
    /// Unrecoverable failure; the session must be closed
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// State of one session.
///
/// Transitions are never rejected; each one is logged at trace level.
/// [`SessionState::reset`] restores the exact initial value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    status: SessionStatus,
    initialized: bool,
    server_capabilities: Option<Value>,
    server_info: Option<Implementation>,
    protocol_version: Option<String>,
    instructions: Option<String>,
    initialized_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl SessionState {
    /// Fresh state: disconnected, not initialized
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(&mut self, to: SessionStatus) {
        trace!("Session state {} -> {}", self.status, to);
        self.status = to;
    }

    /// Transport connection started
    pub fn mark_connecting(&mut self) {
        self.transition(SessionStatus::Connecting);
    }

    /// Transport connected
    pub fn mark_connected(&mut self) {
        self.transition(SessionStatus::Connected);
    }

    /// `initialize` sent; any earlier handshake result is discarded
    pub fn mark_initializing(&mut self) {
        self.initialized = false;
        self.transition(SessionStatus::Initializing);
    }

    /// Handshake finished with `server_capabilities`
    pub fn mark_initialized(&mut self, server_capabilities: Value) {
        self.server_capabilities = Some(server_capabilities);
        self.initialized = true;
        self.initialized_at = Some(Utc::now());
        self.last_error = None;
        self.transition(SessionStatus::Ready);
    }

    /// Store the full handshake result and become ready
    pub fn record_handshake(&mut self, result: InitializeResult) {
        self.server_info = Some(result.server_info);
        self.protocol_version = Some(result.protocol_version);
        self.instructions = result.instructions;
        self.mark_initialized(result.capabilities);
    }

    /// Enter the error state, remembering `reason`
    pub fn mark_error(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
        self.transition(SessionStatus::Error);
    }

    /// Back to the initial state
    pub fn reset(&mut self) {
        trace!("Session state {} reset", self.status);
        *self = Self::default();
    }

    /// Ready and initialized; both are required
    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready && self.initialized
    }

    /// Current lifecycle position
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the handshake completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Capabilities the server advertised
    pub fn server_capabilities(&self) -> Option<&Value> {
        self.server_capabilities.as_ref()
    }

    /// Server identification
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Negotiated protocol version
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Server usage hints
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// When the handshake completed
    pub fn initialized_at(&self) -> Option<DateTime<Utc>> {
        self.initialized_at
    }

    /// Reason for the last transition into [`SessionStatus::Error`]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// See [`capabilities::has_capability`]; false before the handshake
    pub fn has_capability(&self, path: &str) -> bool {
        self.server_capabilities
            .as_ref()
            .is_some_and(|caps| capabilities::has_capability(caps, path))
    }

    /// Capability at `path`, or `default`
    pub fn get_capability(&self, path: &str, default: Value) -> Value {
        match &self.server_capabilities {
            Some(caps) => capabilities::get_capability(caps, path, default),
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_fresh_state() {
        let state = SessionState::new();
        assert_eq!(state.status(), SessionStatus::Disconnected);
        assert!(!state.is_initialized());
        assert!(!state.is_ready());
        assert!(state.server_capabilities().is_none());
        assert!(state.initialized_at().is_none());
    }

    #[test]
    fn test_mark_initialized_then_reset() {
        let mut state = SessionState::new();
        state.mark_initialized(json!({"tools": {"listChanged": true}}));

        assert_eq!(state.status(), SessionStatus::Ready);
        assert!(state.is_initialized());
        assert!(state.is_ready());
        assert!(state.initialized_at().is_some());

        state.reset();
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut state = SessionState::new();
        state.mark_connecting();
        assert_eq!(state.status(), SessionStatus::Connecting);
        state.mark_connected();
        assert_eq!(state.status(), SessionStatus::Connected);
        state.mark_initializing();
        assert_eq!(state.status(), SessionStatus::Initializing);
        assert!(!state.is_ready());

        state.record_handshake(InitializeResult {
            protocol_version: "2025-03-26".to_string(),
            capabilities: json!({"prompts": {}}),
            server_info: Implementation::new("demo", "1.0"),
            instructions: Some("hello".to_string()),
        });
        assert!(state.is_ready());
        assert_eq!(state.protocol_version(), Some("2025-03-26"));
        assert_eq!(state.server_info().map(|i| i.name.as_str()), Some("demo"));
        assert_eq!(state.instructions(), Some("hello"));
    }

    #[test]
    fn test_ready_requires_initialized_flag() {
        let mut state = SessionState::new();
        state.mark_initialized(json!({}));
        state.mark_initializing();
        assert!(!state.is_ready());
    }

    #[test]
    fn test_error_from_any_state() {
        let mut state = SessionState::new();
        state.mark_initialized(json!({}));
        state.mark_error("version mismatch");
        assert_eq!(state.status(), SessionStatus::Error);
        assert!(!state.is_ready());
        assert_eq!(state.last_error(), Some("version mismatch"));
    }

    #[test]
    fn test_capability_queries() {
        let mut state = SessionState::new();
        assert!(!state.has_capability("tools"));
        assert_eq!(state.get_capability("tools", json!(false)), json!(false));

        state.mark_initialized(json!({"tools": {"listChanged": true}}));
        assert!(state.has_capability("tools.listChanged"));
        assert!(!state.has_capability("tools.missing"));
        assert!(!state.has_capability("missing.path"));
        assert_eq!(
            state.get_capability("tools", Value::Null),
            json!({"listChanged": true})
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Initializing.to_string(), "initializing");
        assert_eq!(
            serde_json::to_value(SessionStatus::Ready).unwrap(),
            json!("ready")
        );
    }
}
