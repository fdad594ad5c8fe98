//! MCP session: one transport, one state machine, one correlator.
//!
//! A [`Session`] drives the handshake:
//!
//! ```text
//! connect ─→ initialize (request) ─→ InitializeResult ─→ initialized (notification) ─→ Ready
//! ```
//!
//! Every application operation checks that the transport is connected and
//! the handshake is complete before anything is sent. Requests on one session
//! are serialized: the next one is issued only after the previous one
//! resolved, failed or timed out.

pub mod correlator;
mod operations;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use mcplink_protocol::{
    ErrorKind, Implementation, InitializeRequest, InitializeResult, JsonRpcMessage,
    JsonRpcNotification, McpError, McpResult, MessageValidator, SUPPORTED_PROTOCOL_VERSIONS,
    SequentialIdGenerator, methods,
};
use mcplink_transport_traits::{Transport, TransportState, TransportType};
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use correlator::RequestCorrelator;
use state::{SessionState, SessionStatus};

/// A single MCP session over an exclusively owned transport
#[derive(Debug)]
pub struct Session {
    id: String,
    transport: Box<dyn Transport>,
    state: RwLock<SessionState>,
    correlator: RequestCorrelator,
    config: SessionConfig,
    /// Held for the whole of one request/response exchange
    request_lock: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a session; nothing is sent until [`connect`](Self::connect) or
    /// [`initialize`](Self::initialize)
    pub fn new(id: impl Into<String>, transport: Box<dyn Transport>, config: SessionConfig) -> Self {
        let strict = config
            .strict_framing
            .unwrap_or_else(|| transport.transport_type().is_line_delimited());
        let ids = config
            .id_generator
            .clone()
            .unwrap_or_else(|| Arc::new(SequentialIdGenerator::new()));
        let correlator = RequestCorrelator::new()
            .with_id_generator(ids)
            .with_validator(MessageValidator::new().with_strict_framing(strict))
            .with_poll_interval(config.poll_interval);

        Self {
            id: id.into(),
            transport,
            state: RwLock::new(SessionState::new()),
            correlator,
            config,
            request_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind of the underlying transport
    pub fn transport_type(&self) -> TransportType {
        self.transport.transport_type()
    }

    /// Configuration this session runs with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect the transport if it is not connected yet.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be established; the
    /// session is then in [`SessionStatus::Error`].
    pub async fn connect(&self) -> McpResult<()> {
        if self.transport.is_connected().await {
            if self.status() == SessionStatus::Disconnected {
                self.state.write().mark_connected();
            }
            return Ok(());
        }

        self.state.write().mark_connecting();
        match self.transport.connect().await {
            Ok(()) => {
                self.state.write().mark_connected();
                debug!(session_id = %self.id, transport = %self.transport_type(), "Transport connected");
                Ok(())
            }
            Err(e) => {
                let err = McpError::from(e).with_operation("connect");
                self.state.write().mark_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Perform the MCP handshake.
    ///
    /// Connects first when needed. On success the session is
    /// [`SessionStatus::Ready`].
    ///
    /// # Errors
    ///
    /// - `Protocol` if the session is already initialized
    /// - `Timeout` if the server does not answer within the initialization timeout
    /// - `ProtocolVersionMismatch` if the server picked a version this client
    ///   does not speak; the transport is disconnected
    /// - the server's error if it rejected `initialize`
    ///
    /// Any failure leaves the session in [`SessionStatus::Error`].
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let _turn = self.request_lock.lock().await;

        if self.is_ready() {
            return Err(McpError::protocol(format!(
                "Session '{}' is already initialized",
                self.id
            ))
            .with_operation(methods::INITIALIZE));
        }
        self.connect().await?;

        self.state.write().mark_initializing();
        match self.handshake().await {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Initialization failed");
                self.state.write().mark_error(err.to_string());
                Err(err)
            }
        }
    }

    async fn handshake(&self) -> McpResult<InitializeResult> {
        let request = InitializeRequest {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.config.client_capabilities.clone(),
            client_info: self.config.client_info.clone(),
        };
        let params = serde_json::to_value(&request).map_err(|e| {
            McpError::encoding(format!("Failed to encode initialize request: {e}"))
                .with_operation(methods::INITIALIZE)
        })?;

        let value = self
            .correlator
            .send_and_wait(
                self.transport.as_ref(),
                methods::INITIALIZE,
                Some(params),
                self.config.initialization_timeout,
                None,
            )
            .await?;
        let result: InitializeResult = serde_json::from_value(value).map_err(|e| {
            McpError::protocol(format!("Invalid initialize result: {e}"))
                .with_operation(methods::INITIALIZE)
        })?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&result.protocol_version.as_str()) {
            if let Err(e) = self.transport.disconnect().await {
                warn!(session_id = %self.id, error = %e, "Disconnect after version mismatch failed");
            }
            return Err(McpError::protocol_version_mismatch(
                &self.config.protocol_version,
                &result.protocol_version,
            )
            .with_operation(methods::INITIALIZE));
        }

        self.state.write().record_handshake(result.clone());
        self.correlator
            .notify(self.transport.as_ref(), methods::INITIALIZED, None)
            .await?;

        info!(
            session_id = %self.id,
            server = %result.server_info.name,
            server_version = %result.server_info.version,
            protocol_version = %result.protocol_version,
            "Session initialized"
        );
        Ok(result)
    }

    /// Fail fast unless the transport is connected and, when
    /// `require_initialized`, the handshake is complete.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error naming `operation` and the current state.
    pub async fn validate_session_state(
        &self,
        operation: &str,
        require_initialized: bool,
    ) -> McpResult<()> {
        if !self.transport.is_connected().await {
            return Err(McpError::protocol(format!(
                "Cannot perform '{operation}': session '{}' is not connected",
                self.id
            ))
            .with_operation(operation));
        }
        if require_initialized && !self.is_ready() {
            return Err(McpError::protocol(format!(
                "Cannot perform '{operation}': session '{}' is not initialized (state: {})",
                self.id,
                self.status()
            ))
            .with_operation(operation));
        }
        Ok(())
    }

    /// Send any request and return its raw result.
    ///
    /// `timeout` defaults to the session's request timeout.
    ///
    /// # Errors
    ///
    /// See [`RequestCorrelator::send_and_wait`]; also fails with `Protocol`
    /// before the handshake.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> McpResult<Value> {
        self.dispatch_request(method, params, timeout, None).await
    }

    /// Like [`request`](Self::request), ending early with `Cancelled` when
    /// `cancel` fires. The server is told with `notifications/cancelled`.
    ///
    /// # Errors
    ///
    /// See [`Session::request`].
    pub async fn request_with_cancel(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> McpResult<Value> {
        self.dispatch_request(method, params, timeout, Some(cancel)).await
    }

    async fn dispatch_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> McpResult<Value> {
        self.validate_session_state(method, true).await?;

        let _turn = self.request_lock.lock().await;
        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let result = self
            .correlator
            .send_and_wait(self.transport.as_ref(), method, params, timeout, cancel)
            .await;

        if let Err(err) = &result
            && err.kind == ErrorKind::Transport
            && !self.transport.is_connected().await
        {
            warn!(session_id = %self.id, method, error = %err, "Connection lost");
            self.state.write().mark_error(err.to_string());
        }
        result
    }

    /// Send a notification to the server.
    ///
    /// # Errors
    ///
    /// Fails when the transport is not connected or the send fails.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.validate_session_state(method, false).await?;
        self.correlator
            .notify(self.transport.as_ref(), method, params)
            .await
    }

    /// Deliver server notifications that arrive while a request is waiting.
    ///
    /// Replaces any earlier handler. Other unmatched messages are logged and
    /// dropped.
    pub fn on_notification<F>(&self, handler: F)
    where
        F: Fn(JsonRpcNotification) + Send + Sync + 'static,
    {
        let session_id = self.id.clone();
        let hook = move |message: JsonRpcMessage| match message {
            JsonRpcMessage::Notification(notification) => handler(notification),
            other => debug!(
                session_id = %session_id,
                id = ?other.id(),
                method = other.method().unwrap_or("<response>"),
                "Discarding unexpected message"
            ),
        };
        self.correlator
            .set_unexpected_message_hook(Some(Arc::new(hook)));
    }

    /// Disconnect, reset the state and forget pending requests.
    ///
    /// Closing a closed session does nothing.
    ///
    /// # Errors
    ///
    /// Returns the transport's disconnect error. The state is reset either way.
    pub async fn close(&self) -> McpResult<()> {
        let outcome = if matches!(self.transport.state().await, TransportState::Disconnected) {
            Ok(())
        } else {
            self.transport
                .disconnect()
                .await
                .map_err(|e| McpError::from(e).with_operation("close"))
        };

        self.state.write().reset();
        self.correlator.clear_pending();
        debug!(session_id = %self.id, "Session closed");
        outcome
    }

    /// Whether the transport is connected
    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Handshake complete and ready for operations
    pub fn is_ready(&self) -> bool {
        self.state.read().is_ready()
    }

    /// Snapshot of the session state
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Current lifecycle position
    pub fn status(&self) -> SessionStatus {
        self.state.read().status()
    }

    /// Capabilities the server advertised
    pub fn server_capabilities(&self) -> Option<Value> {
        self.state.read().server_capabilities().cloned()
    }

    /// Whether the server advertised the capability at a dotted `path`
    pub fn has_server_capability(&self, path: &str) -> bool {
        self.state.read().has_capability(path)
    }

    /// Server capability at a dotted `path`, or `default`
    pub fn get_server_capability(&self, path: &str, default: Value) -> Value {
        self.state.read().get_capability(path, default)
    }

    /// Server identification from the handshake
    pub fn server_info(&self) -> Option<Implementation> {
        self.state.read().server_info().cloned()
    }

    /// Requests currently awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }
}
