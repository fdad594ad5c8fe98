//! Typed MCP operations on [`Session`]

mod prompts;
mod resources;
mod tools;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use mcplink_protocol::{McpError, McpResult, methods};

use super::Session;

impl Session {
    /// Check the server is alive
    ///
    /// # Errors
    ///
    /// Fails before the handshake, on timeout, or with the server's error.
    pub async fn ping(&self) -> McpResult<()> {
        self.request(methods::PING, None, None).await.map(|_| ())
    }

    /// Issue `method` after the state and capability checks, decoding the
    /// result into `T`
    pub(crate) async fn typed_request<T: DeserializeOwned>(
        &self,
        method: &str,
        capability: &str,
        params: Option<Value>,
    ) -> McpResult<T> {
        self.validate_session_state(method, true).await?;
        if self.config.enforce_capabilities && !self.has_server_capability(capability) {
            return Err(McpError::capability_not_supported(capability).with_operation(method));
        }

        let value = self.request(method, params, None).await?;
        serde_json::from_value(value).map_err(|e| {
            McpError::protocol(format!("Invalid {method} result: {e}")).with_operation(method)
        })
    }
}

pub(crate) fn cursor_params(cursor: Option<&str>) -> Option<Value> {
    cursor.map(|cursor| json!({ "cursor": cursor }))
}

/// Tool and prompt arguments travel as a JSON object
pub(crate) fn object_arguments(
    arguments: Option<Value>,
    operation: &str,
) -> McpResult<Option<Map<String, Value>>> {
    match arguments {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => {
            let found = match other {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => "an object",
            };
            Err(McpError::validation(format!("Arguments must be a JSON object, got {found}"))
                .with_operation(operation))
        }
    }
}

pub(crate) fn require_non_empty(value: &str, what: &str, operation: &str) -> McpResult<()> {
    if value.trim().is_empty() {
        return Err(McpError::validation(format!("{what} must not be empty")).with_operation(operation));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::test_support::{ScriptedTransport, initialize_result};
    use mcplink_protocol::ErrorKind;
    use pretty_assertions::assert_eq;

    pub(super) async fn ready_session(capabilities: Value, enforce: bool) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new().with_responder(move |message| {
            let Some(id) = message.get("id").cloned() else {
                return Vec::new();
            };
            let result = match message["method"].as_str() {
                Some("initialize") => initialize_result(capabilities.clone()),
                _ => json!({"method": message["method"], "params": message["params"]}),
            };
            vec![json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()]
        });
        let session = Session::new(
            "ops",
            Box::new(transport.clone()),
            SessionConfig::builder().enforce_capabilities(enforce).build(),
        );
        session.initialize().await.unwrap();
        (session, transport)
    }

    #[tokio::test]
    async fn test_ping() {
        let (session, transport) = ready_session(json!({}), false).await;
        session.ping().await.unwrap();
        assert_eq!(transport.sent_methods().last().map(String::as_str), Some("ping"));
    }

    #[tokio::test]
    async fn test_capability_enforcement() {
        let (session, transport) = ready_session(json!({"tools": {}}), true).await;

        assert!(session.list_tools(None).await.is_ok());

        let err = session.list_prompts(None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapabilityNotSupported);
        assert!(!transport.sent_methods().contains(&"prompts/list".to_string()));
    }

    #[tokio::test]
    async fn test_capabilities_not_enforced_by_default() {
        let (session, _transport) = ready_session(json!({}), false).await;
        assert!(session.list_prompts(None).await.is_ok());
    }

    #[test]
    fn test_cursor_params() {
        assert_eq!(cursor_params(None), None);
        assert_eq!(cursor_params(Some("abc")), Some(json!({"cursor": "abc"})));
    }
}
