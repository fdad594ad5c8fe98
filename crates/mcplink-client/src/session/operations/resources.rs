//! Resource operations

use mcplink_protocol::{McpResult, methods};
use serde_json::{Value, json};

use super::{cursor_params, require_non_empty};
use crate::session::Session;

impl Session {
    /// List the server's resources; pass the previous `nextCursor` to page.
    ///
    /// # Errors
    ///
    /// Fails before the handshake, when `resources` is required but not
    /// advertised, on timeout, or with the server's error.
    pub async fn list_resources(&self, cursor: Option<&str>) -> McpResult<Value> {
        self.typed_request(methods::RESOURCES_LIST, "resources", cursor_params(cursor))
            .await
    }

    /// Read the resource at `uri`; returns the raw `{"contents": [...]}` result.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty URI, resource not found (-32004) from the
    /// server, and everything [`Session::request`] can return.
    pub async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        require_non_empty(uri, "Resource URI", methods::RESOURCES_READ)?;
        self.typed_request(methods::RESOURCES_READ, "resources", Some(json!({"uri": uri})))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::ready_session;
    use mcplink_protocol::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_resource() {
        let (session, _transport) = ready_session(json!({"resources": {}}), true).await;

        let result = session.read_resource("file:///etc/motd").await.unwrap();
        assert_eq!(result["method"], json!("resources/read"));
        assert_eq!(result["params"], json!({"uri": "file:///etc/motd"}));

        let err = session.read_resource("").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_list_resources_without_cursor_sends_no_params() {
        let (session, transport) = ready_session(json!({"resources": {}}), false).await;

        session.list_resources(None).await.unwrap();
        let last = transport.sent().pop().unwrap();
        assert_eq!(last, json!({"jsonrpc": "2.0", "id": "2", "method": "resources/list"}));
    }
}
