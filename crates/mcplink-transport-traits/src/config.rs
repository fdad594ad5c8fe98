//! Transport limits.

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Size limits applied to every message in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    /// `None` = unlimited
    pub max_message_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: Some(mcplink_protocol::MAX_MESSAGE_SIZE),
        }
    }
}

impl LimitsConfig {
    /// No size limit at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_message_size: None,
        }
    }

    /// Limit messages to `max` bytes.
    #[must_use]
    pub const fn with_max_message_size(max: usize) -> Self {
        Self {
            max_message_size: Some(max),
        }
    }
}

/// Check a message of `size` bytes against `limits`.
pub fn validate_message_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max) = limits.max_message_size
        && size > max
    {
        return Err(TransportError::MessageTooLarge { size, max });
    }
    Ok(())
}
