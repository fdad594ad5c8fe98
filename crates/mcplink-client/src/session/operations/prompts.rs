//! Prompt operations

use mcplink_protocol::{McpResult, methods};
use serde_json::{Value, json};

use super::{cursor_params, object_arguments, require_non_empty};
use crate::session::Session;

impl Session {
    /// List the server's prompts; pass the previous `nextCursor` to page.
    ///
    /// # Errors
    ///
    /// Fails before the handshake, when `prompts` is required but not
    /// advertised, on timeout, or with the server's error.
    pub async fn list_prompts(&self, cursor: Option<&str>) -> McpResult<Value> {
        self.typed_request(methods::PROMPTS_LIST, "prompts", cursor_params(cursor))
            .await
    }

    /// Render prompt `name` with string `arguments`.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty name or arguments that are not an object,
    /// prompt not found (-32003) from the
    /// server, and everything [`Session::request`] can return.
    pub async fn get_prompt(&self, name: &str, arguments: Option<Value>) -> McpResult<Value> {
        require_non_empty(name, "Prompt name", methods::PROMPTS_GET)?;
        let mut params = json!({ "name": name });
        if let Some(arguments) = object_arguments(arguments, methods::PROMPTS_GET)? {
            params["arguments"] = Value::Object(arguments);
        }
        self.typed_request(methods::PROMPTS_GET, "prompts", Some(params))
            .await
    }
}
