//! Client configuration management
//!
//! [`ClientConfig`] is what lives in a config file; [`SessionConfig`] is the
//! runtime form a [`Session`](crate::Session) is built with.
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional file (`.toml`, `.yaml`/`.yml` or `.json`)
//! 3. environment variables prefixed with `MCPLINK_`, using `__` for nesting
//!    (`MCPLINK_SESSION__REQUEST_TIMEOUT_SECS=10`)
//!
//! ```toml
//! [client_info]
//! name = "my-app"
//! version = "1.0.0"
//!
//! [session]
//! request_timeout_secs = 30
//! initialization_timeout_secs = 60
//!
//! [servers.files]
//! transport = "stdio"
//! command = "mcp-server-files"
//! args = ["--root", "/srv"]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mcplink_protocol::{
    Implementation, McpError, PROTOCOL_VERSION, RequestIdGenerator, SUPPORTED_PROTOCOL_VERSIONS,
};
use mcplink_transport_traits::TransportConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::logging::LoggingConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MCPLINK";

/// Client configuration as read from files and the environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How this client introduces itself
    pub client_info: ClientInfo,
    /// Session timing and protocol settings
    pub session: SessionSettings,
    /// Logging setup
    pub logging: LoggingConfig,
    /// Named servers for [`McpClient::connect_server`](crate::McpClient::connect_server)
    pub servers: HashMap<String, ServerConfig>,
}

/// Client identification sent in the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Session settings in file form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Default request timeout
    pub request_timeout_secs: u64,
    /// Timeout for the `initialize` round trip
    pub initialization_timeout_secs: u64,
    /// Upper bound on a single transport receive while waiting
    pub poll_interval_ms: u64,
    /// Reject raw line breaks in inbound messages; unset means "when the
    /// transport is line-delimited"
    pub strict_framing: Option<bool>,
    /// Protocol version to request
    pub protocol_version: String,
    /// Refuse operations the server did not advertise
    pub enforce_capabilities: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            initialization_timeout_secs: 60,
            poll_interval_ms: 1000,
            strict_framing: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            enforce_capabilities: false,
        }
    }
}

/// A named server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Transport type name, e.g. `stdio`
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Program to spawn
    #[serde(default)]
    pub command: Option<String>,
    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the program
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the program
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Address for network transports
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_transport() -> String {
    "stdio".to_string()
}

impl ServerConfig {
    /// Server launched as a child process over stdio
    pub fn stdio<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transport: default_transport(),
            command: Some(command.into()),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            cwd: None,
            endpoint: None,
        }
    }

    /// Transport configuration for this entry
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            working_directory: self.cwd.clone(),
            endpoint: self.endpoint.clone(),
            ..TransportConfig::default()
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// A value parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for McpError {
    fn from(err: ConfigError) -> Self {
        McpError::configuration(err.to_string()).with_component("config")
    }
}

impl ClientConfig {
    /// Load from `path` (when given) layered over defaults, with environment
    /// overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist or has an unknown extension
    /// - A source cannot be parsed into this structure
    /// - A timeout or the poll interval is zero
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Load from a file, with environment overrides
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::load`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(Some(path.as_ref()))
    }

    /// Defaults plus environment overrides
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::load`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Like [`load`](Self::load), reading variables from `env` instead of the
    /// process environment when given.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::load`].
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }

            let format = match path.extension().and_then(|s| s.to_str()) {
                Some("toml") => FileFormat::Toml,
                Some("yaml") | Some("yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(ConfigError::UnsupportedFormat),
            };
            let name = path.to_str().ok_or(ConfigError::UnsupportedFormat)?;
            builder = builder.add_source(File::new(name, format));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values no session can run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = &self.session;
        if session.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if session.initialization_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.initialization_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if session.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&session.protocol_version.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "session.protocol_version '{}' is not one of {:?}",
                session.protocol_version, SUPPORTED_PROTOCOL_VERSIONS
            )));
        }

        let mut names: Vec<&String> = self.servers.keys().collect();
        names.sort();
        for name in names {
            let server = &self.servers[name];
            if server.transport == "stdio"
                && server.command.as_deref().is_none_or(|c| c.trim().is_empty())
            {
                return Err(ConfigError::Invalid(format!(
                    "servers.{name}: stdio transport needs a command"
                )));
            }
        }
        Ok(())
    }

    /// Runtime session configuration derived from these settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::builder()
            .client_info(Implementation::new(
                &self.client_info.name,
                &self.client_info.version,
            ))
            .protocol_version(&self.session.protocol_version)
            .request_timeout(Duration::from_secs(self.session.request_timeout_secs))
            .initialization_timeout(Duration::from_secs(
                self.session.initialization_timeout_secs,
            ))
            .poll_interval(Duration::from_millis(self.session.poll_interval_ms))
            .strict_framing(self.session.strict_framing)
            .enforce_capabilities(self.session.enforce_capabilities)
            .build()
    }
}

/// Runtime configuration of a single session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identification sent in `initialize`
    pub client_info: Implementation,
    /// Capabilities sent in `initialize`
    pub client_capabilities: Value,
    /// Protocol version requested in `initialize`
    pub protocol_version: String,
    /// Default timeout for requests
    pub request_timeout: Duration,
    /// Timeout for the `initialize` round trip
    pub initialization_timeout: Duration,
    /// Upper bound on a single transport receive
    pub poll_interval: Duration,
    /// Strict stdio framing; `None` picks it from the transport type
    pub strict_framing: Option<bool>,
    /// Require advertised server capabilities for typed operations
    pub enforce_capabilities: bool,
    /// Request id source; `None` gives each session its own counter
    pub id_generator: Option<Arc<dyn RequestIdGenerator>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_info: Implementation::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            client_capabilities: Value::Object(Map::new()),
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            initialization_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            strict_framing: None,
            enforce_capabilities: false,
            id_generator: None,
        }
    }
}

impl SessionConfig {
    /// Create a configuration builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Fluent builder for [`SessionConfig`]
///
/// ```rust
/// use std::time::Duration;
/// use mcplink_client::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .request_timeout(Duration::from_secs(10))
///     .enforce_capabilities(true)
///     .build();
/// assert_eq!(config.request_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the client identification
    pub fn client_info(mut self, info: Implementation) -> Self {
        self.config.client_info = info;
        self
    }

    /// Set the capabilities announced to the server
    pub fn client_capabilities(mut self, capabilities: Value) -> Self {
        self.config.client_capabilities = capabilities;
        self
    }

    /// Set the requested protocol version
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Set the default request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the handshake timeout
    pub fn initialization_timeout(mut self, timeout: Duration) -> Self {
        self.config.initialization_timeout = timeout;
        self
    }

    /// Set the per-receive poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Force strict framing on or off
    pub fn strict_framing(mut self, strict: Option<bool>) -> Self {
        self.config.strict_framing = strict;
        self
    }

    /// Require advertised capabilities for typed operations
    pub fn enforce_capabilities(mut self, enforce: bool) -> Self {
        self.config.enforce_capabilities = enforce;
        self
    }

    /// Use a specific request id generator
    pub fn id_generator(mut self, ids: Arc<dyn RequestIdGenerator>) -> Self {
        self.config.id_generator = Some(ids);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());

        let session = config.session_config();
        assert_eq!(session.request_timeout, Duration::from_secs(30));
        assert_eq!(session.initialization_timeout, Duration::from_secs(60));
        assert_eq!(session.poll_interval, Duration::from_secs(1));
        assert_eq!(session.protocol_version, PROTOCOL_VERSION);
        assert_eq!(session.client_info.name, "mcplink-client");
    }

    #[test]
    fn test_toml_file_with_servers() {
        let file = write_file(
            ".toml",
            r#"
            [client_info]
            name = "tester"
            version = "9.9.9"

            [session]
            request_timeout_secs = 5
            strict_framing = true

            [servers.files]
            command = "mcp-server-files"
            args = ["--root", "/srv"]
            env = { mode = "test" }
            "#,
        );

        let config = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.client_info.name, "tester");
        assert_eq!(config.session.request_timeout_secs, 5);
        assert_eq!(config.session.initialization_timeout_secs, 60);
        assert_eq!(config.session.strict_framing, Some(true));

        let server = &config.servers["files"];
        assert_eq!(server.transport, "stdio");
        let transport = server.transport_config();
        assert_eq!(transport.command.as_deref(), Some("mcp-server-files"));
        assert_eq!(transport.args, vec!["--root", "/srv"]);
        assert_eq!(transport.env.get("mode").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_json_file() {
        let file = write_file(
            ".json",
            r#"{"session": {"poll_interval_ms": 250, "enforce_capabilities": true}}"#,
        );
        let config = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.session.poll_interval_ms, 250);
        assert!(config.session_config().enforce_capabilities);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_file(".toml", "[session]\nrequest_timeout_secs = 5\n");
        let config = ClientConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("MCPLINK_SESSION__REQUEST_TIMEOUT_SECS", "12"),
                ("MCPLINK_LOGGING__LEVEL", "debug"),
            ]),
        )
        .unwrap();
        assert_eq!(config.session.request_timeout_secs, 12);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_file_errors() {
        let err = ClientConfig::load_with_env(Some(Path::new("/no/such/file.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));

        let file = write_file(".ini", "x=1");
        let err = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat));

        let file = write_file(".toml", "[session]\nrequest_timeout_secs = \"soon\"\n");
        let err = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation() {
        for (key, value) in [
            ("MCPLINK_SESSION__REQUEST_TIMEOUT_SECS", "0"),
            ("MCPLINK_SESSION__INITIALIZATION_TIMEOUT_SECS", "0"),
            ("MCPLINK_SESSION__POLL_INTERVAL_MS", "0"),
            ("MCPLINK_SESSION__PROTOCOL_VERSION", "1999-01-01"),
        ] {
            let err = ClientConfig::load_with_env(None, env(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{key}: {err}");
        }

        let mut config = ClientConfig::default();
        config.servers.insert(
            "broken".to_string(),
            ServerConfig {
                command: None,
                ..ServerConfig::stdio("x", Vec::<String>::new())
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("servers.broken"));

        let mcp: McpError = err.into();
        assert_eq!(mcp.kind, mcplink_protocol::ErrorKind::Configuration);
    }
}
