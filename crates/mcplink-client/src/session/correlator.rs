//! Request/response correlation over a [`Transport`].
//!
//! The correlator assigns each outgoing request an id, records it in the
//! pending table and then polls the transport until the matching response
//! arrives, the deadline passes or the caller cancels. Every `receive` is
//! bounded by the time left and by the poll interval, so the loop re-checks
//! the deadline at least once per interval no matter how the transport
//! behaves.
//!
//! Messages that do not answer the current request (server notifications,
//! stale responses, server-initiated requests) are handed to an optional
//! [`UnexpectedMessageHook`] in arrival order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mcplink_protocol::{
    CancelledNotification, JsonCodec, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    McpError, McpResult, MessageValidator, RequestId, RequestIdGenerator, SequentialIdGenerator,
    methods,
};
use mcplink_transport_traits::{Transport, TransportError, TransportResult};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default upper bound for a single `receive` call
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Receiver for messages that arrive while waiting but answer nothing
pub type UnexpectedMessageHook = Arc<dyn Fn(JsonRpcMessage) + Send + Sync>;

/// Timeout for the next `receive`: the time left, rounded up to a whole
/// millisecond so a sub-millisecond remainder still issues a real wait, and
/// capped at `poll_interval`.
pub fn receive_timeout(remaining: Duration, poll_interval: Duration) -> Duration {
    let millis = remaining.as_nanos().div_ceil(1_000_000).max(1);
    let rounded = Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX));
    rounded.min(poll_interval.max(Duration::from_millis(1)))
}

/// Removes a pending entry however the wait ends, including a dropped future
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<RequestId, Instant>>,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

enum WaitEvent {
    Received(TransportResult<Option<String>>),
    Cancelled,
}

/// Correlates requests with responses for one session
pub struct RequestCorrelator {
    ids: Arc<dyn RequestIdGenerator>,
    pending: Mutex<HashMap<RequestId, Instant>>,
    codec: JsonCodec,
    validator: MessageValidator,
    poll_interval: Duration,
    hook: RwLock<Option<UnexpectedMessageHook>>,
}

impl fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("ids", &self.ids)
            .field("pending", &self.pending.lock().len())
            .field("strict_framing", &self.validator.is_strict())
            .field("poll_interval", &self.poll_interval)
            .field("hook", &self.hook.read().is_some())
            .finish()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCorrelator {
    /// Correlator with sequential ids, lenient framing and a 1s poll interval
    pub fn new() -> Self {
        Self {
            ids: Arc::new(SequentialIdGenerator::new()),
            pending: Mutex::new(HashMap::new()),
            codec: JsonCodec::new(),
            validator: MessageValidator::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            hook: RwLock::new(None),
        }
    }

    /// Use a different id source
    pub fn with_id_generator(mut self, ids: Arc<dyn RequestIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Use a different inbound validator
    pub fn with_validator(mut self, validator: MessageValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Bound each `receive` call by `interval`
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Install or clear the unexpected-message hook
    pub fn set_unexpected_message_hook(&self, hook: Option<UnexpectedMessageHook>) {
        *self.hook.write() = hook;
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether `id` is awaiting a response
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.lock().contains_key(id)
    }

    /// Forget every pending request
    pub fn clear_pending(&self) {
        self.pending.lock().clear();
    }

    /// Send `method` and wait for its response.
    ///
    /// # Errors
    ///
    /// - `Timeout` when no matching response arrives within `timeout`
    /// - the peer's error, via [`McpError::remote`], for an error response
    /// - `Cancelled` when `cancel` fires first
    /// - `Transport` when sending or receiving fails, or the connection drops
    /// - `Protocol` when the peer sends something that fails validation
    pub async fn send_and_wait(
        &self,
        transport: &dyn Transport,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> McpResult<Value> {
        let id = self.ids.next_id();
        let request = JsonRpcRequest::new(method, params, id.clone());
        let payload = self
            .codec
            .encode_to_string(&request)
            .map_err(|e| McpError::from(e).with_operation(method))?;

        let issued = Instant::now();
        let _guard = self.register(id.clone(), issued);

        debug!(request_id = %id, method, "Sending request");
        trace!("-> {}", payload);
        transport
            .send(payload)
            .await
            .map_err(|e| request_error(McpError::from(e), method, &id))?;

        loop {
            let elapsed = issued.elapsed();
            if elapsed >= timeout {
                warn!(request_id = %id, method, ?elapsed, "Request timed out");
                return Err(McpError::timeout(&id, elapsed).with_operation(method));
            }
            let wait = receive_timeout(timeout - elapsed, self.poll_interval);

            let event = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => WaitEvent::Cancelled,
                    received = transport.receive(Some(wait)) => WaitEvent::Received(received),
                },
                None => WaitEvent::Received(transport.receive(Some(wait)).await),
            };

            let received = match event {
                WaitEvent::Cancelled => {
                    debug!(request_id = %id, method, "Request cancelled by caller");
                    self.announce_cancellation(transport, &id).await;
                    return Err(McpError::cancelled(format!("Request '{id}' was cancelled"))
                        .with_operation(method)
                        .with_request_id(id.to_string()));
                }
                WaitEvent::Received(received) => {
                    received.map_err(|e| request_error(inbound_error(e), method, &id))?
                }
            };

            let Some(raw) = received else {
                if !transport.is_connected().await {
                    return Err(request_error(
                        McpError::transport("Connection closed while waiting for response"),
                        method,
                        &id,
                    ));
                }
                continue;
            };
            trace!("<- {}", raw);

            let message = self
                .decode(&raw)
                .map_err(|e| request_error(e, method, &id))?;
            if let Some(outcome) = self.dispatch(message, &id) {
                debug!(request_id = %id, method, elapsed = ?issued.elapsed(), "Response received");
                return outcome.map_err(|e| request_error(e, method, &id));
            }
        }
    }

    /// Send a notification; nothing is awaited
    ///
    /// # Errors
    ///
    /// Returns an encoding or transport error if the message cannot be sent.
    pub async fn notify(
        &self,
        transport: &dyn Transport,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        let payload = self
            .codec
            .encode_to_string(&notification)
            .map_err(|e| McpError::from(e).with_operation(method))?;

        debug!(method, "Sending notification");
        trace!("-> {}", payload);
        transport
            .send(payload)
            .await
            .map_err(|e| McpError::from(e).with_operation(method))
    }

    fn register(&self, id: RequestId, issued: Instant) -> PendingGuard<'_> {
        self.pending.lock().insert(id.clone(), issued);
        PendingGuard {
            pending: &self.pending,
            id,
        }
    }

    fn decode(&self, raw: &str) -> McpResult<JsonRpcMessage> {
        let value = self.validator.validate(raw).map_err(malformed)?;
        serde_json::from_value(value).map_err(malformed)
    }

    /// Resolve the message against `id`; everything else goes to the hook
    fn dispatch(&self, message: JsonRpcMessage, id: &RequestId) -> Option<McpResult<Value>> {
        let items: Vec<JsonRpcMessage> = match message {
            JsonRpcMessage::Batch(batch) => batch.into_iter().collect(),
            single => vec![single],
        };

        let mut outcome = None;
        for item in items {
            match item {
                JsonRpcMessage::Response(response)
                    if outcome.is_none() && response.request_id().is_some_and(|r| r.matches(id)) =>
                {
                    outcome = Some(match response.error() {
                        Some(error) => Err(McpError::remote(error.clone())),
                        None => Ok(response.result().cloned().unwrap_or(Value::Null)),
                    });
                }
                other => self.route_unexpected(other),
            }
        }
        outcome
    }

    fn route_unexpected(&self, message: JsonRpcMessage) {
        let hook = self.hook.read().clone();
        match hook {
            Some(hook) => hook(message),
            None => debug!(
                method = message.method().unwrap_or("<response>"),
                id = ?message.id(),
                "Discarding unexpected message"
            ),
        }
    }

    async fn announce_cancellation(&self, transport: &dyn Transport, id: &RequestId) {
        let params = CancelledNotification {
            request_id: id.clone(),
            reason: Some("Request cancelled by client".to_string()),
        };
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => {
                debug!(request_id = %id, error = %e, "Could not encode cancellation");
                return;
            }
        };
        if let Err(e) = self.notify(transport, methods::CANCELLED, Some(params)).await {
            debug!(request_id = %id, error = %e, "Could not announce cancellation");
        }
    }
}

fn request_error(err: McpError, method: &str, id: &RequestId) -> McpError {
    err.with_operation(method).with_request_id(id.to_string())
}

fn malformed(err: impl fmt::Display) -> McpError {
    warn!(error = %err, "Malformed message from server");
    McpError::protocol(format!("Malformed message from server: {err}"))
}

/// A line the transport could not read fails the wait like one that does
/// not parse
fn inbound_error(err: TransportError) -> McpError {
    match err {
        TransportError::Malformed(e) => malformed(e),
        other => McpError::from(other),
    }
}
