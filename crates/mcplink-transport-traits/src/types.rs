//! Core transport types.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;

/// Enumerates the kinds of transport a session can run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Newline-delimited JSON over a child process's stdin/stdout.
    Stdio,
    /// HTTP, including Server-Sent Events (SSE).
    Http,
    /// WebSocket for full-duplex communication.
    WebSocket,
    /// TCP sockets for network communication.
    Tcp,
    /// Unix domain sockets for local inter-process communication.
    Unix,
    /// In-process channel, mostly for tests.
    Memory,
}

impl TransportType {
    /// Lowercase name used in configuration and registries.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::WebSocket => "websocket",
            Self::Tcp => "tcp",
            Self::Unix => "unix",
            Self::Memory => "memory",
        }
    }

    /// Whether messages on this transport are delimited by newlines.
    pub const fn is_line_delimited(self) -> bool {
        matches!(self, Self::Stdio | Self::Tcp | Self::Unix)
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the current state of a transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// The transport is not connected.
    Disconnected,
    /// The transport is in the process of connecting.
    Connecting,
    /// The transport is connected and ready to send/receive messages.
    Connected,
    /// The transport is in the process of disconnecting.
    Disconnecting,
    /// The transport has encountered an unrecoverable error.
    Failed {
        /// A description of the failure reason.
        reason: String,
    },
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Configuration handed to a [`TransportFactory`](crate::TransportFactory).
///
/// Process-based transports read `command`, `args`, `env` and
/// `working_directory`; network transports read `endpoint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Program to spawn.
    pub command: Option<String>,

    /// Arguments for `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the spawned program.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the spawned program.
    pub working_directory: Option<PathBuf>,

    /// Remote address for network transports.
    pub endpoint: Option<String>,

    /// How long `connect` may take, including spawning the peer.
    pub connect_timeout: Duration,

    /// How long a graceful shutdown may take before the peer is killed.
    pub shutdown_timeout: Duration,

    /// Message size limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            working_directory: None,
            endpoint: None,
            connect_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            limits: LimitsConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Config for spawning `command` with `args`.
    pub fn command<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: Some(command.into()),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Config for connecting to `endpoint`.
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Add one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Replace the size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }
}
