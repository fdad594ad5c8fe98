//! In-memory transport for unit tests

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcplink_transport_traits::{
    Transport, TransportError, TransportResult, TransportState, TransportType,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

type Responder = Box<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

/// Transport whose inbound traffic is queued by the test or produced by a
/// responder closure reacting to each sent message.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    connected: AtomicBool,
    inbox: Mutex<VecDeque<TransportResult<String>>>,
    sent: Mutex<Vec<String>>,
    responder: Mutex<Option<Responder>>,
    receive_timeouts: Mutex<Vec<Option<Duration>>>,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("connected", &self.inner.connected.load(Ordering::SeqCst))
            .field("queued", &self.inner.inbox.lock().len())
            .field("sent", &self.inner.sent.lock().len())
            .finish()
    }
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connected() -> Self {
        let transport = Self::new();
        transport.inner.connected.store(true, Ordering::SeqCst);
        transport
    }

    /// Reply to every sent message with whatever `responder` returns
    pub(crate) fn with_responder(
        self,
        responder: impl Fn(&Value) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        *self.inner.responder.lock() = Some(Box::new(responder));
        self
    }

    /// Answer `initialize` with a well-formed result and echo `tools/call`
    /// arguments back as text
    pub(crate) fn mcp_server() -> Self {
        Self::new().with_responder(|message| {
            let Some(id) = message.get("id").cloned() else {
                return Vec::new();
            };
            let result = match message["method"].as_str() {
                Some("initialize") => initialize_result(json!({"tools": {}, "prompts": {}})),
                Some("tools/call") => {
                    let text = message["params"]["arguments"]["msg"].clone();
                    json!({"content": [{"type": "text", "text": text}]})
                }
                _ => json!({}),
            };
            vec![json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()]
        })
    }

    pub(crate) fn push_inbound(&self, raw: impl Into<String>) {
        self.inner.inbox.lock().push_back(Ok(raw.into()));
    }

    /// Make one `receive` fail with `err`
    pub(crate) fn push_receive_error(&self, err: TransportError) {
        self.inner.inbox.lock().push_back(Err(err));
    }

    pub(crate) fn sent(&self) -> Vec<Value> {
        self.inner
            .sent
            .lock()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    pub(crate) fn sent_methods(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|m| m["method"].as_str().map(String::from))
            .collect()
    }

    pub(crate) fn receive_timeouts(&self) -> Vec<Option<Duration>> {
        self.inner.receive_timeouts.lock().clone()
    }

    pub(crate) fn drop_connection(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
    }
}

pub(crate) fn initialize_result(capabilities: Value) -> Value {
    json!({
        "protocolVersion": "2025-06-18",
        "capabilities": capabilities,
        "serverInfo": {"name": "scripted", "version": "1.0.0"}
    })
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    async fn state(&self) -> TransportState {
        if self.inner.connected.load(Ordering::SeqCst) {
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
        Ok(())
    }

    async fn send(&self, message: String) -> TransportResult<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let replies = match self.inner.responder.lock().as_ref() {
            Some(responder) => responder(&serde_json::from_str(&message).unwrap()),
            None => Vec::new(),
        };
        self.inner.sent.lock().push(message);
        self.inner.inbox.lock().extend(replies.into_iter().map(Ok));
        Ok(())
    }

    async fn receive(&self, timeout: Option<Duration>) -> TransportResult<Option<String>> {
        self.inner.receive_timeouts.lock().push(timeout);
        let next = self.inner.inbox.lock().pop_front();
        if let Some(message) = next {
            return message.map(Some);
        }
        if self.inner.connected.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout.unwrap_or(Duration::from_secs(1))).await;
        }
        Ok(None)
    }
}
