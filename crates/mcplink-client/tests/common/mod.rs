//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcplink_client::{Transport, TransportError, TransportResult, TransportState, TransportType};
use parking_lot::Mutex;
use serde_json::{Value, json};

type Handler = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// In-memory MCP server: answers `initialize`, and any method registered
/// with [`MockServer::on`]. Unknown methods get no reply at all.
#[derive(Clone, Default)]
pub struct MockServer {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    connected: AtomicBool,
    fail_disconnect: AtomicBool,
    silent: AtomicBool,
    protocol_version: Mutex<Option<String>>,
    capabilities: Mutex<Option<Value>>,
    handlers: Mutex<Vec<(String, Handler)>>,
    inbox: Mutex<VecDeque<String>>,
    sent: Mutex<Vec<Value>>,
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("connected", &self.inner.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(self, capabilities: Value) -> Self {
        *self.inner.capabilities.lock() = Some(capabilities);
        self
    }

    pub fn with_protocol_version(self, version: &str) -> Self {
        *self.inner.protocol_version.lock() = Some(version.to_string());
        self
    }

    /// Reply to `method` with `handler(params)` as the result, or with the
    /// error object when the handler returns `{"error": ...}`
    pub fn on(
        self,
        method: &str,
        handler: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.inner
            .handlers
            .lock()
            .push((method.to_string(), Arc::new(handler)));
        self
    }

    /// Never reply to anything
    pub fn silent(self) -> Self {
        self.inner.silent.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_disconnect(self) -> Self {
        self.inner.fail_disconnect.store(true, Ordering::SeqCst);
        self
    }

    pub fn push_inbound(&self, message: Value) {
        self.inner.inbox.lock().push_back(message.to_string());
    }

    pub fn push_raw(&self, raw: &str) {
        self.inner.inbox.lock().push_back(raw.to_string());
    }

    pub fn sent(&self) -> Vec<Value> {
        self.inner.sent.lock().clone()
    }

    pub fn sent_ids(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|m| m["id"].as_str().map(String::from))
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }

    fn reply(&self, message: &Value) -> Option<Value> {
        if self.inner.silent.load(Ordering::SeqCst) {
            return None;
        }
        let id = message.get("id")?.clone();
        let method = message["method"].as_str()?;
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let result = if method == "initialize" {
            let version = self.inner.protocol_version.lock().clone().unwrap_or_else(|| {
                params["protocolVersion"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            });
            let capabilities = self
                .inner
                .capabilities
                .lock()
                .clone()
                .unwrap_or_else(|| json!({}));
            json!({
                "protocolVersion": version,
                "capabilities": capabilities,
                "serverInfo": {"name": "mock", "version": "0.1.0"}
            })
        } else {
            let handler = self
                .inner
                .handlers
                .lock()
                .iter()
                .find(|(name, _)| name == method)
                .map(|(_, handler)| Arc::clone(handler))?;
            handler(&params)?
        };

        Some(match result.get("error") {
            Some(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
            None => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        })
    }
}

#[async_trait]
impl Transport for MockServer {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    async fn state(&self) -> TransportState {
        if self.is_connected() {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    async fn connect(&self) -> TransportResult<()> {
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        if self.inner.fail_disconnect.load(Ordering::SeqCst) {
            return Err(TransportError::Internal("child refused to exit".to_string()));
        }
        Ok(())
    }

    async fn send(&self, message: String) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let value: Value = serde_json::from_str(&message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        if let Some(reply) = self.reply(&value) {
            self.inner.inbox.lock().push_back(reply.to_string());
        }
        self.inner.sent.lock().push(value);
        Ok(())
    }

    async fn receive(&self, timeout: Option<Duration>) -> TransportResult<Option<String>> {
        if let Some(message) = self.inner.inbox.lock().pop_front() {
            return Ok(Some(message));
        }
        if self.is_connected() {
            tokio::time::sleep(timeout.unwrap_or(Duration::from_secs(1))).await;
        }
        Ok(None)
    }
}
