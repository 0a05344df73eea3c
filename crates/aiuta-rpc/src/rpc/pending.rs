//! Outbound requests waiting for their response.
//!
//! Each entry is removed exactly once: by its response, by its caller giving
//! up (timeout or future dropped), or by [`PendingRequests::reject_all`] when
//! the connection is destroyed.  Whoever removes the entry owns the
//! completion, so a duplicate or late response finds nothing and is dropped.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::error::RpcError;

/// Completion side of one outstanding call.
#[derive(Debug)]
pub struct PendingEntry {
    /// The action that was called; used for error messages and logs.
    pub action: String,
    /// When the caller stops waiting.
    pub deadline: Instant,
    tx: oneshot::Sender<Result<Value, RpcError>>,
}

impl PendingEntry {
    /// Completes the call.  Returns `false` if the caller already went away.
    pub fn complete(self, result: Result<Value, RpcError>) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Map of message id to [`PendingEntry`].
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new outstanding call and returns the receiver its caller awaits.
    pub fn register(
        &self,
        id: impl Into<String>,
        action: impl Into<String>,
        deadline: Instant,
    ) -> oneshot::Receiver<Result<Value, RpcError>> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            action: action.into(),
            deadline,
            tx,
        };
        self.lock().insert(id.into(), entry);
        rx
    }

    /// Removes and returns the entry for `id`, if it is still outstanding.
    pub fn take(&self, id: &str) -> Option<PendingEntry> {
        self.lock().remove(id)
    }

    /// Removes the entry for `id` without completing it.
    pub fn remove(&self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// Rejects every outstanding call with [`RpcError::ConnectionClosed`].
    /// Returns the number of calls rejected.
    pub fn reject_all(&self) -> usize {
        let drained: Vec<PendingEntry> = self.lock().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            entry.complete(Err(RpcError::ConnectionClosed));
        }
        count
    }

    /// Fails every entry whose deadline is at or before `now` with
    /// [`RpcError::Timeout`].  Returns the number of entries expired.
    pub fn expire(&self, now: Instant) -> usize {
        let expired: Vec<PendingEntry> = {
            let mut entries = self.lock();
            let ids: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        let count = expired.len();
        for entry in expired {
            let after = now.saturating_duration_since(entry.deadline);
            let action = entry.action.clone();
            entry.complete(Err(RpcError::Timeout { action, after }));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
