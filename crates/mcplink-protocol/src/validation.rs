//! # Message Validation
//!
//! Layered validation of raw wire messages before they reach protocol logic:
//! encoding, framing, syntax, then JSON-RPC structure. Each layer reports its
//! own [`MessageError`] variant so a failure can be attributed precisely.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::{CodecError, JsonCodec};
use crate::error::McpError;
use crate::jsonrpc::{JSONRPC_VERSION, RequestId};

/// Default upper bound on the number of messages in one batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Validation failure, one variant family per layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The bytes are not well-formed UTF-8
    #[error("Message is not valid UTF-8 (invalid byte at offset {offset})")]
    InvalidUtf8 {
        /// Offset of the first invalid byte
        offset: usize,
    },

    /// A literal line break inside a newline-delimited message
    #[error(
        "Message contains an embedded {} at offset {offset}; stdio framing allows one message per line",
        line_break_name(.byte)
    )]
    EmbeddedNewline {
        /// Offset of the line break
        offset: usize,
        /// The offending byte (`\n` or `\r`)
        byte: u8,
    },

    /// The text is not valid JSON
    #[error("Parse error: {0}")]
    Json(String),

    /// The document nests deeper than the codec allows
    #[error("Parse error: nesting depth exceeds the maximum of {max}")]
    TooDeep {
        /// Configured limit
        max: usize,
    },

    /// `[]`
    #[error("Batch must contain at least one message")]
    EmptyBatch,

    /// More messages in a batch than allowed
    #[error("Batch of {size} messages exceeds the maximum of {max}")]
    BatchTooLarge {
        /// Messages in the batch
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// One element of a batch is invalid
    #[error("Invalid batch element at index {index}: {source}")]
    BatchElement {
        /// Zero-based position of the element
        index: usize,
        /// Why the element was rejected
        #[source]
        source: Box<MessageError>,
    },

    /// A message that is not a JSON object
    #[error("Message must be a JSON object")]
    NotAnObject,

    /// `jsonrpc` missing or not `"2.0"`
    #[error("Invalid JSON-RPC version: expected \"2.0\", got {0}")]
    InvalidVersion(String),

    /// Neither `method` nor a response payload
    #[error("Message must carry 'method', or 'id' with exactly one of 'result' or 'error'")]
    UnknownShape,

    /// Response with both payloads
    #[error("Response must not carry both 'result' and 'error'")]
    ResultAndError,

    /// Request fields mixed with response fields
    #[error("Message must not carry 'method' together with 'result' or 'error'")]
    MixedRequestResponse,

    /// `method` is not a string
    #[error("'method' must be a string")]
    InvalidMethod,

    /// `id` has an unsupported type
    #[error("'id' must be a string or an integer")]
    InvalidId,

    /// `params` is neither an object nor an array
    #[error("'params' must be an object or an array")]
    InvalidParams,

    /// Malformed `error` member
    #[error("'error' must be an object with an integer 'code' and a string 'message'")]
    InvalidErrorObject,
}

fn line_break_name(byte: &u8) -> &'static str {
    if *byte == b'\r' {
        "carriage return"
    } else {
        "line feed"
    }
}

/// The validation layer a [`MessageError`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationLayer {
    /// UTF-8 well-formedness
    Encoding,
    /// Newline-delimited framing
    Framing,
    /// JSON syntax and depth
    Syntax,
    /// JSON-RPC structure
    Structure,
}

impl MessageError {
    /// Layer that rejected the message
    pub fn layer(&self) -> ValidationLayer {
        match self {
            Self::InvalidUtf8 { .. } => ValidationLayer::Encoding,
            Self::EmbeddedNewline { .. } => ValidationLayer::Framing,
            Self::Json(_) | Self::TooDeep { .. } => ValidationLayer::Syntax,
            _ => ValidationLayer::Structure,
        }
    }

    /// JSON-RPC code a server would answer this failure with
    pub fn jsonrpc_code(&self) -> i32 {
        match self.layer() {
            ValidationLayer::Encoding | ValidationLayer::Syntax => -32700,
            ValidationLayer::Framing | ValidationLayer::Structure => -32600,
        }
    }
}

impl From<CodecError> for MessageError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::DepthExceeded { max } => Self::TooDeep { max },
            CodecError::Encode(e) | CodecError::Decode(e) => Self::Json(e.to_string()),
        }
    }
}

impl From<MessageError> for McpError {
    fn from(err: MessageError) -> Self {
        match err.layer() {
            ValidationLayer::Encoding | ValidationLayer::Syntax => {
                McpError::decoding(err.to_string())
            }
            ValidationLayer::Framing | ValidationLayer::Structure => {
                McpError::protocol(err.to_string())
            }
        }
        .with_component("validation")
    }
}

/// Kind of a well-formed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Has `method` and `id`
    Request,
    /// Has `method`, no `id`
    Notification,
    /// Has `id` and exactly one of `result`/`error`
    Response,
    /// Non-empty array of messages
    Batch,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "request",
            Self::Notification => "notification",
            Self::Response => "response",
            Self::Batch => "batch",
        })
    }
}

/// Result of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Message kind
    pub kind: MessageKind,
    /// Method, for requests and notifications
    pub method: Option<String>,
    /// Id, for requests and responses (absent for null-id error responses)
    pub id: Option<RequestId>,
    /// Element count, for batches
    pub count: Option<usize>,
}

/// Configurable message validator
#[derive(Debug, Clone)]
pub struct MessageValidator {
    strict_framing: bool,
    codec: JsonCodec,
    max_batch_size: usize,
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self {
            strict_framing: false,
            codec: JsonCodec::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl MessageValidator {
    /// Create a validator with lenient framing
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject literal line breaks, as newline-delimited transports require
    pub fn with_strict_framing(mut self, strict: bool) -> Self {
        self.strict_framing = strict;
        self
    }

    /// Use `codec` for the syntax layer
    pub fn with_codec(mut self, codec: JsonCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Limit the number of messages per batch
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    /// Whether strict framing is on
    pub fn is_strict(&self) -> bool {
        self.strict_framing
    }

    /// Run all layers and return the decoded document
    pub fn validate(&self, raw: impl AsRef<[u8]>) -> Result<Value, MessageError> {
        let raw = raw.as_ref();

        std::str::from_utf8(raw).map_err(|e| MessageError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;

        if self.strict_framing
            && let Some(offset) = raw.iter().position(|b| matches!(b, b'\n' | b'\r'))
        {
            return Err(MessageError::EmbeddedNewline {
                offset,
                byte: raw[offset],
            });
        }

        let value: Value = self.codec.decode(raw)?;
        self.check_structure(&value)?;
        Ok(value)
    }

    /// Structural rules for a decoded document; arrays are batches
    pub fn check_structure(&self, value: &Value) -> Result<MessageKind, MessageError> {
        let Value::Array(items) = value else {
            return check_single(value);
        };
        if items.is_empty() {
            return Err(MessageError::EmptyBatch);
        }
        if items.len() > self.max_batch_size {
            return Err(MessageError::BatchTooLarge {
                size: items.len(),
                max: self.max_batch_size,
            });
        }
        for (index, item) in items.iter().enumerate() {
            check_single(item).map_err(|source| MessageError::BatchElement {
                index,
                source: Box::new(source),
            })?;
        }
        Ok(MessageKind::Batch)
    }

    /// Validate `raw` and describe it
    pub fn classify(&self, raw: impl AsRef<[u8]>) -> Result<MessageInfo, MessageError> {
        let value = self.validate(raw)?;
        Ok(describe(&value))
    }
}

/// Validate a raw message. `strict` enables stdio framing rules.
pub fn validate_message(raw: impl AsRef<[u8]>, strict: bool) -> Result<Value, MessageError> {
    MessageValidator::new()
        .with_strict_framing(strict)
        .validate(raw)
}

/// Validate an already decoded document against JSON-RPC structure rules
pub fn validate_structure(value: &Value) -> Result<(), MessageError> {
    MessageValidator::new().check_structure(value).map(|_| ())
}

/// Describe a raw message without strict framing
pub fn classify(raw: impl AsRef<[u8]>) -> Result<MessageInfo, MessageError> {
    MessageValidator::new().classify(raw)
}

fn describe(value: &Value) -> MessageInfo {
    if let Value::Array(items) = value {
        return MessageInfo {
            kind: MessageKind::Batch,
            method: None,
            id: None,
            count: Some(items.len()),
        };
    }

    let method = value.get("method").and_then(Value::as_str).map(String::from);
    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
    let kind = match (&method, value.get("id")) {
        (Some(_), Some(_)) => MessageKind::Request,
        (Some(_), None) => MessageKind::Notification,
        (None, _) => MessageKind::Response,
    };
    MessageInfo {
        kind,
        method,
        id,
        count: None,
    }
}

fn check_single(value: &Value) -> Result<MessageKind, MessageError> {
    let obj = value.as_object().ok_or(MessageError::NotAnObject)?;

    match obj.get("jsonrpc") {
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        Some(other) => return Err(MessageError::InvalidVersion(other.to_string())),
        None => return Err(MessageError::InvalidVersion("nothing".to_string())),
    }

    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    if let Some(method) = obj.get("method") {
        if !method.is_string() {
            return Err(MessageError::InvalidMethod);
        }
        if has_result || has_error {
            return Err(MessageError::MixedRequestResponse);
        }
        if let Some(params) = obj.get("params")
            && !(params.is_object() || params.is_array())
        {
            return Err(MessageError::InvalidParams);
        }
        return match obj.get("id") {
            None => Ok(MessageKind::Notification),
            Some(id) if is_valid_id(id) => Ok(MessageKind::Request),
            Some(_) => Err(MessageError::InvalidId),
        };
    }

    let id = obj.get("id").ok_or(MessageError::UnknownShape)?;
    match (has_result, has_error) {
        (true, true) => Err(MessageError::ResultAndError),
        (false, false) => Err(MessageError::UnknownShape),
        (true, false) if is_valid_id(id) => Ok(MessageKind::Response),
        (false, true) if is_valid_id(id) || id.is_null() => {
            check_error_object(obj)?;
            Ok(MessageKind::Response)
        }
        _ => Err(MessageError::InvalidId),
    }
}

fn is_valid_id(id: &Value) -> bool {
    id.is_string() || id.is_i64()
}

fn check_error_object(obj: &Map<String, Value>) -> Result<(), MessageError> {
    let error = obj
        .get("error")
        .and_then(Value::as_object)
        .ok_or(MessageError::InvalidErrorObject)?;
    let code_ok = error
        .get("code")
        .and_then(Value::as_i64)
        .is_some_and(|code| i32::try_from(code).is_ok());
    let message_ok = error.get("message").is_some_and(Value::is_string);
    if code_ok && message_ok {
        Ok(())
    } else {
        Err(MessageError::InvalidErrorObject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const PING: &str = r#"{"jsonrpc":"2.0","method":"ping"}"#;

    #[test]
    fn test_strict_mode_rejects_trailing_newline() {
        let raw = format!("{PING}\n");
        let err = validate_message(&raw, true).unwrap_err();
        assert_eq!(
            err,
            MessageError::EmbeddedNewline {
                offset: PING.len(),
                byte: b'\n'
            }
        );
        assert_eq!(err.layer(), ValidationLayer::Framing);

        assert!(validate_message(&raw, false).is_ok());
    }

    #[test]
    fn test_strict_mode_rejects_carriage_return_between_tokens() {
        let raw = "{\"jsonrpc\":\"2.0\",\r\"method\":\"ping\"}";
        let err = validate_message(raw, true).unwrap_err();
        assert!(matches!(err, MessageError::EmbeddedNewline { byte: b'\r', .. }));
        assert!(err.to_string().contains("carriage return"));
    }

    #[test]
    fn test_strict_mode_accepts_escaped_line_breaks_in_strings() {
        let raw = json!({"jsonrpc": "2.0", "method": "log", "params": {"text": "a\r\nb"}})
            .to_string();
        assert!(validate_message(&raw, true).is_ok());
    }

    #[test]
    fn test_invalid_utf8_is_reported_first() {
        let mut raw = PING.as_bytes().to_vec();
        raw.insert(5, 0xff);
        raw.push(b'\n');
        let err = validate_message(&raw, true).unwrap_err();
        assert_eq!(err, MessageError::InvalidUtf8 { offset: 5 });
        assert_eq!(err.layer(), ValidationLayer::Encoding);
    }

    #[test]
    fn test_syntax_errors() {
        let err = validate_message("{\"jsonrpc\":", false).unwrap_err();
        assert!(matches!(err, MessageError::Json(_)));
        assert_eq!(err.jsonrpc_code(), -32700);
        assert_eq!(McpError::from(err).kind, ErrorKind::Decoding);
    }

    #[test]
    fn test_batch_rules() {
        assert_eq!(
            validate_structure(&json!([])),
            Err(MessageError::EmptyBatch)
        );

        let valid = json!([
            {"jsonrpc": "2.0", "id": "1", "method": "tools/list"},
            {"jsonrpc": "2.0", "method": "notifications/initialized"}
        ]);
        assert_eq!(validate_structure(&valid), Ok(()));

        let invalid = json!([
            {"jsonrpc": "2.0", "id": "1", "method": "tools/list"},
            {"jsonrpc": "2.0", "id": "2", "result": {}},
            {"jsonrpc": "1.0", "method": "x"}
        ]);
        let err = validate_structure(&invalid).unwrap_err();
        let MessageError::BatchElement { index, source } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(*index, 2);
        assert!(matches!(**source, MessageError::InvalidVersion(_)));
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn test_nested_batch_is_rejected() {
        let err = validate_structure(&json!([[{"jsonrpc": "2.0", "method": "x"}]])).unwrap_err();
        assert!(matches!(err, MessageError::BatchElement { index: 0, .. }));
    }

    #[test]
    fn test_batch_size_limit() {
        let batch = Value::Array(vec![json!({"jsonrpc": "2.0", "method": "x"}); 3]);
        let validator = MessageValidator::new().with_max_batch_size(2);
        assert_eq!(
            validator.check_structure(&batch),
            Err(MessageError::BatchTooLarge { size: 3, max: 2 })
        );
    }

    #[test]
    fn test_single_message_rules() {
        let cases = [
            (json!("ping"), MessageError::NotAnObject),
            (
                json!({"id": 1, "method": "x"}),
                MessageError::InvalidVersion("nothing".to_string()),
            ),
            (
                json!({"jsonrpc": 2.0, "method": "x"}),
                MessageError::InvalidVersion("2.0".to_string()),
            ),
            (json!({"jsonrpc": "2.0"}), MessageError::UnknownShape),
            (json!({"jsonrpc": "2.0", "id": 1}), MessageError::UnknownShape),
            (
                json!({"jsonrpc": "2.0", "id": 1, "result": 1, "error": {"code": 1, "message": "m"}}),
                MessageError::ResultAndError,
            ),
            (
                json!({"jsonrpc": "2.0", "id": 1, "method": "x", "result": 1}),
                MessageError::MixedRequestResponse,
            ),
            (
                json!({"jsonrpc": "2.0", "id": 1, "method": 5}),
                MessageError::InvalidMethod,
            ),
            (
                json!({"jsonrpc": "2.0", "id": 1.5, "method": "x"}),
                MessageError::InvalidId,
            ),
            (
                json!({"jsonrpc": "2.0", "id": null, "result": {}}),
                MessageError::InvalidId,
            ),
            (
                json!({"jsonrpc": "2.0", "method": "x", "params": "nope"}),
                MessageError::InvalidParams,
            ),
            (
                json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "no code"}}),
                MessageError::InvalidErrorObject,
            ),
        ];

        for (value, expected) in cases {
            assert_eq!(validate_structure(&value), Err(expected), "value: {value}");
        }
    }

    #[test]
    fn test_null_id_allowed_for_error_responses() {
        let value = json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}});
        assert_eq!(validate_structure(&value), Ok(()));
    }

    #[test]
    fn test_structure_errors_map_to_protocol_kind() {
        let err: McpError = MessageError::ResultAndError.into();
        assert_eq!(err.kind, ErrorKind::Protocol);
        assert_eq!(MessageError::ResultAndError.jsonrpc_code(), -32600);
    }

    #[test]
    fn test_classify() {
        let req = classify(r#"{"jsonrpc":"2.0","id":"5","method":"tools/call"}"#).unwrap();
        assert_eq!(req.kind, MessageKind::Request);
        assert_eq!(req.method.as_deref(), Some("tools/call"));
        assert_eq!(req.id, Some(RequestId::from("5")));

        let notif = classify(PING).unwrap();
        assert_eq!(notif.kind, MessageKind::Notification);
        assert_eq!(notif.id, None);

        let resp = classify(r#"{"jsonrpc":"2.0","id":9,"result":{}}"#).unwrap();
        assert_eq!(resp.kind, MessageKind::Response);
        assert_eq!(resp.id, Some(RequestId::Number(9)));
        assert_eq!(resp.method, None);

        let batch = classify(format!("[{PING},{PING}]")).unwrap();
        assert_eq!(batch.kind, MessageKind::Batch);
        assert_eq!(batch.count, Some(2));
        assert_eq!(batch.kind.to_string(), "batch");
    }

    #[test]
    fn test_classify_rejects_malformed_input() {
        assert!(classify("not json").is_err());
        assert!(classify("[]").is_err());
    }
}
