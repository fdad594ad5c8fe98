//! Request id generation.
//!
//! Ids are handed out by an injected [`RequestIdGenerator`] rather than a
//! process-global function, so a session's id sequence is deterministic and
//! can be replaced in tests.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::jsonrpc::RequestId;

/// Source of request identifiers for one session
pub trait RequestIdGenerator: Send + Sync + Debug {
    /// Produce the next id; must not repeat for the generator's lifetime
    fn next_id(&self) -> RequestId;
}

/// Monotonic counter starting at 1, rendered as strings (`"1"`, `"2"`, ...)
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator whose first id is `"1"`
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator whose first id is `first`
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::String(self.next.fetch_add(1, Ordering::Relaxed).to_string())
    }
}

/// Random v4 UUIDs, for peers that expect opaque ids
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl RequestIdGenerator for UuidIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::String(uuid::Uuid::new_v4().to_string())
    }
}
