//! Tool operations

use mcplink_protocol::{CallToolResult, McpResult, methods};
use serde_json::{Value, json};

use super::{cursor_params, object_arguments, require_non_empty};
use crate::session::Session;

impl Session {
    /// List the server's tools; pass the previous `nextCursor` to page.
    ///
    /// Returns the raw `tools/list` result (`{"tools": [...], "nextCursor"?}`).
    ///
    /// # Errors
    ///
    /// Fails before the handshake, when `tools` is required but not
    /// advertised, on timeout, or with the server's error.
    pub async fn list_tools(&self, cursor: Option<&str>) -> McpResult<Value> {
        self.typed_request(methods::TOOLS_LIST, "tools", cursor_params(cursor))
            .await
    }

    /// Names of the tools on the first page of [`list_tools`](Self::list_tools)
    ///
    /// # Errors
    ///
    /// See [`Session::list_tools`].
    pub async fn list_tool_names(&self) -> McpResult<Vec<String>> {
        let listing = self.list_tools(None).await?;
        Ok(listing["tools"]
            .as_array()
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|tool| tool["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Call tool `name` with `arguments` (an object; `None` sends `{}`).
    ///
    /// A tool that ran and failed still returns `Ok`, with
    /// [`CallToolResult::is_error`] set.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty name or arguments that are not an object
    /// - the server's error, e.g. tool not found (-32001)
    /// - see also [`Session::request`]
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<CallToolResult> {
        require_non_empty(name, "Tool name", methods::TOOLS_CALL)?;
        let arguments = object_arguments(arguments, methods::TOOLS_CALL)?.unwrap_or_default();
        self.typed_request(
            methods::TOOLS_CALL,
            "tools",
            Some(json!({"name": name, "arguments": arguments})),
        )
        .await
    }
}
