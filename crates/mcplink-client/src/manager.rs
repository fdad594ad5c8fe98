//! Registry of live sessions
//!
//! The [`SessionManager`] maps session ids to shared [`Session`]s. It may be
//! used from many tasks at once; the map is guarded by an async `RwLock` and
//! no lock is held while a session does I/O.
//!
//! Teardown is best-effort: [`SessionManager::close_all`] closes every
//! session even when some fail, and reports the failures in a
//! [`CloseReport`].

use std::collections::HashMap;
use std::sync::Arc;

use mcplink_protocol::{McpError, McpResult};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::session::Session;

/// Session counts for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Registered sessions
    pub total: usize,
    /// Sessions that completed the handshake and are ready
    pub active: usize,
}

/// Outcome of a bulk close
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Sessions closed cleanly, in close order
    pub closed: Vec<String>,
    /// Sessions whose close failed, with the error
    pub failures: Vec<(String, McpError)>,
}

impl CloseReport {
    /// Whether every session closed cleanly
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Sessions processed, successful or not
    pub fn total(&self) -> usize {
        self.closed.len() + self.failures.len()
    }
}

/// Keyed registry of sessions with bulk teardown
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under its own id and return the shared handle.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the id is already registered.
    pub async fn add(&self, session: Session) -> McpResult<Arc<Session>> {
        self.insert(Arc::new(session)).await
    }

    /// Register an already shared session; on error the caller still owns
    /// it and is responsible for closing it.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the id is already registered.
    pub async fn insert(&self, session: Arc<Session>) -> McpResult<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let id = session.id().to_string();
        if sessions.contains_key(&id) {
            return Err(McpError::validation(format!("Session '{id}' already exists"))
                .with_operation("add_session"));
        }

        sessions.insert(id.clone(), Arc::clone(&session));
        debug!(session_id = %id, total = sessions.len(), "Session registered");
        Ok(session)
    }

    /// Look up a session.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if no session has this id.
    pub async fn get(&self, id: &str) -> McpResult<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| {
                McpError::validation(format!("Session '{id}' not found")).with_operation("get_session")
            })
    }

    /// Whether a session with this id is registered
    pub async fn has(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Unregister a session without closing it
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "Session unregistered");
        }
        removed
    }

    /// Registered ids, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Total and ready session counts
    pub async fn stats(&self) -> SessionStats {
        let sessions = self.sessions.read().await;
        SessionStats {
            total: sessions.len(),
            active: sessions.values().filter(|s| s.is_ready()).count(),
        }
    }

    /// Unregister and close one session
    ///
    /// # Errors
    ///
    /// `Validation` if the id is unknown, otherwise the session's close error.
    /// The session is unregistered either way.
    pub async fn close(&self, id: &str) -> McpResult<()> {
        let session = self.remove(id).await.ok_or_else(|| {
            McpError::validation(format!("Session '{id}' not found")).with_operation("close_session")
        })?;
        session.close().await
    }

    /// Close every session and empty the registry.
    ///
    /// The registry is drained before any session is closed, so concurrent
    /// additions land in a fresh map. Sessions close in id order; a failure
    /// does not stop the rest.
    pub async fn close_all(&self) -> CloseReport {
        let mut drained: Vec<(String, Arc<Session>)> =
            self.sessions.write().await.drain().collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = CloseReport::default();
        for (id, session) in drained {
            match session.close().await {
                Ok(()) => report.closed.push(id),
                Err(err) => {
                    warn!(session_id = %id, error = %err, "Failed to close session");
                    report.failures.push((id, err));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            "Closed all sessions"
        );
        report
    }
}
