//! JSON wire codec.
//!
//! Encoding is plain `serde_json`: compact output, UTF-8 emitted as-is and
//! `/` left unescaped. Decoding is strict and bounded in nesting depth; the
//! depth is checked on the raw bytes before parsing so a hostile payload
//! fails fast with [`CodecError::DepthExceeded`] instead of a generic
//! recursion error.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::McpError;

/// Default maximum nesting depth of decoded documents
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Deepest nesting `serde_json` itself will parse
const PARSER_DEPTH_LIMIT: usize = 127;

/// Wire codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes are not a valid JSON document of the expected shape
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// The document nests deeper than allowed
    #[error("Failed to decode message: nesting depth exceeds the maximum of {max}")]
    DepthExceeded {
        /// Configured limit
        max: usize,
    },
}

impl From<CodecError> for McpError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Encode(_) => McpError::encoding(err.to_string()),
            CodecError::Decode(_) | CodecError::DepthExceeded { .. } => {
                McpError::decoding(err.to_string())
            }
        }
    }
}

/// JSON codec with a bounded decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodec {
    max_depth: usize,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth; clamped to what the parser supports
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(1, PARSER_DEPTH_LIMIT);
        self
    }

    /// Configured maximum nesting depth
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Serialize `value` to compact JSON bytes
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    /// Serialize `value` to a compact JSON string
    pub fn encode_to_string<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::Encode)
    }

    /// Parse `bytes` into `T`
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        if exceeds_depth(bytes, self.max_depth) {
            return Err(CodecError::DepthExceeded {
                max: self.max_depth,
            });
        }
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

/// Scan for bracket nesting deeper than `max`, skipping string contents.
fn exceeds_depth(bytes: &[u8], max: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in bytes {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > max {
                    return true;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    false
}
