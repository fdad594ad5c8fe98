//! Client facade: transport registry, configuration and session manager
//!
//! [`McpClient`] turns a transport type name plus a [`TransportConfig`] into a
//! registered [`Session`]. Transports are pluggable through
//! [`TransportFactory`]; the stdio transport is registered by default when
//! the `stdio` feature is on.

use std::collections::HashMap;
use std::sync::Arc;

use mcplink_protocol::{McpError, McpResult};
use mcplink_transport_traits::{TransportConfig, TransportFactory};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::{ClientConfig, SessionConfig};
use crate::manager::{CloseReport, SessionManager};
use crate::session::Session;

/// Entry point for applications
pub struct McpClient {
    config: ClientConfig,
    factories: RwLock<HashMap<String, Arc<dyn TransportFactory>>>,
    sessions: SessionManager,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("client_info", &self.config.client_info)
            .field("transports", &self.supported_transports())
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl McpClient {
    /// Create a client from `config`
    pub fn new(config: ClientConfig) -> Self {
        let client = Self {
            config,
            factories: RwLock::new(HashMap::new()),
            sessions: SessionManager::new(),
        };

        #[cfg(feature = "stdio")]
        client.register_transport(Arc::new(mcplink_stdio::StdioTransportFactory::new()));

        client
    }

    /// Client with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ClientConfig::default())
    }

    /// Client configured from a file plus `MCPLINK_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the file is missing or invalid.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> McpResult<Self> {
        Ok(Self::new(ClientConfig::from_file(path)?))
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Add or replace the factory for its transport type
    pub fn register_transport(&self, factory: Arc<dyn TransportFactory>) {
        let name = factory.transport_type().as_str().to_string();
        self.factories.write().insert(name, factory);
    }

    /// Registered transport type names, sorted
    pub fn supported_transports(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Create and register a session over a new `transport` instance.
    ///
    /// The session gets a random id and is not connected yet; call
    /// [`Session::initialize`] next.
    ///
    /// # Errors
    ///
    /// - `Validation` naming the type and the supported set if `transport` is
    ///   not registered
    /// - `Configuration` if the factory rejects `config`
    pub async fn create_session(
        &self,
        transport: &str,
        config: TransportConfig,
    ) -> McpResult<Arc<Session>> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = self.build_session(&id, transport, config, self.config.session_config())?;
        self.sessions.add(session).await
    }

    /// Like [`create_session`](Self::create_session) with an explicit id and
    /// session configuration
    ///
    /// # Errors
    ///
    /// As for [`McpClient::create_session`], plus `Validation` for an id that
    /// is already registered.
    pub async fn create_session_with(
        &self,
        id: &str,
        transport: &str,
        config: TransportConfig,
        session_config: SessionConfig,
    ) -> McpResult<Arc<Session>> {
        let session = self.build_session(id, transport, config, session_config)?;
        self.sessions.add(session).await
    }

    fn build_session(
        &self,
        id: &str,
        transport: &str,
        config: TransportConfig,
        session_config: SessionConfig,
    ) -> McpResult<Session> {
        let factory = self.factories.read().get(transport).cloned();
        let Some(factory) = factory else {
            return Err(McpError::validation(format!(
                "Unsupported transport type '{transport}'; supported: [{}]",
                self.supported_transports().join(", ")
            ))
            .with_operation("create_session"));
        };
        if !factory.is_available() {
            return Err(McpError::configuration(format!(
                "Transport '{transport}' is not available on this platform"
            ))
            .with_operation("create_session"));
        }

        let transport = factory
            .create(config)
            .map_err(|e| McpError::from(e).with_operation("create_session"))?;
        Ok(Session::new(id, transport, session_config))
    }

    /// Connect and initialize the server named `name` in the configuration.
    ///
    /// The session is registered under `name` only once the handshake
    /// succeeded. When a concurrent call registered `name` first, the
    /// session built here is closed again.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown or already connected name, and any
    /// creation or [`Session::initialize`] error.
    pub async fn connect_server(&self, name: &str) -> McpResult<Arc<Session>> {
        let Some(server) = self.config.servers.get(name) else {
            let mut known: Vec<&str> = self.config.servers.keys().map(String::as_str).collect();
            known.sort_unstable();
            return Err(McpError::validation(format!(
                "Unknown server '{name}'; configured: [{}]",
                known.join(", ")
            ))
            .with_operation("connect_server"));
        };
        if self.sessions.has(name).await {
            return Err(McpError::validation(format!("Server '{name}' is already connected"))
                .with_operation("connect_server"));
        }

        let session = self.build_session(
            name,
            &server.transport,
            server.transport_config(),
            self.config.session_config(),
        )?;

        let session = Arc::new(session);
        let registered = match session.initialize().await {
            Ok(_) => self.sessions.insert(Arc::clone(&session)).await,
            Err(err) => Err(err),
        };
        if let Err(err) = registered {
            if let Err(close_err) = session.close().await {
                warn!(server = name, error = %close_err, "Cleanup after failed connect failed");
            }
            return Err(err);
        }

        info!(server = name, "Server connected");
        Ok(session)
    }

    /// Look up a session
    ///
    /// # Errors
    ///
    /// `Validation` if no session has this id.
    pub async fn session(&self, id: &str) -> McpResult<Arc<Session>> {
        self.sessions.get(id).await
    }

    /// Close and unregister one session
    ///
    /// # Errors
    ///
    /// `Validation` if the id is unknown, otherwise the close error.
    pub async fn close_session(&self, id: &str) -> McpResult<()> {
        self.sessions.close(id).await
    }

    /// Close every session
    pub async fn shutdown(&self) -> CloseReport {
        self.sessions.close_all().await
    }

    /// The session registry
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}
