//! Session identity and lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Count live sessions so shutdown can wait for them
//! - Keep the active-sessions gauge current

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

/// Global atomic counter for session IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a forwarded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Tracks live sessions for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active_count: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session. Returns a guard that decrements on drop.
    pub fn track(&self) -> SessionGuard {
        let now = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_sessions(now);
        SessionGuard {
            active_count: Arc::clone(&self.active_count),
            id: SessionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every session has ended or `limit` elapses.
    /// Returns `true` if all sessions ended in time.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while self.active_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }
}

/// Guard that tracks a session's lifetime.
#[derive(Debug)]
pub struct SessionGuard {
    active_count: Arc<AtomicU64>,
    id: SessionId,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let now = self.active_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_sessions(now);
        tracing::trace!(session = %self.id, "Session closed");
    }
}
