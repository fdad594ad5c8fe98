//! Dotted-path lookup over negotiated capability maps.
//!
//! Capabilities arrive as loosely typed JSON (`{"tools": {"listChanged": true}}`)
//! and are queried with paths such as `"tools.listChanged"`. Lookups never
//! fail: a missing segment, or a segment that is not an object, simply
//! yields nothing.

use serde_json::Value;

/// Resolve `path` segment by segment
pub fn lookup<'a>(capabilities: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(capabilities, |node, segment| node.as_object()?.get(segment))
}

/// Whether `path` resolves to something other than `null` or `false`.
///
/// An empty object counts as present: `{"tools": {}}` advertises tools.
pub fn has_capability(capabilities: &Value, path: &str) -> bool {
    lookup(capabilities, path)
        .is_some_and(|value| !matches!(value, Value::Null | Value::Bool(false)))
}

/// Value at `path`, or `default` when absent
pub fn get_capability(capabilities: &Value, path: &str, default: Value) -> Value {
    lookup(capabilities, path).cloned().unwrap_or(default)
}
