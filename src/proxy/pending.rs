//! Pending-requests table (spec §3, backing invariants I3/I4).
//!
//! Tracks proxy-issued RPCs (handshake replay, `tools/list` probe) awaiting
//! a response from the child. Grounded on the teacher's `DashMap`-based
//! concurrent maps (`transport/stdio.rs`'s `processes`/`connection_states`)
//! — a lock-free map is the teacher's standard shape for "many readers,
//! occasional concurrent inserts/removes" state, which this table is too.

use crate::types::ProxyRequestId;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// The child's response to a proxy-issued request, distinguishing a
/// `result` payload from an `error` one. A timeout is never represented
/// here: the issuing call's own `tokio::time::timeout` racing this
/// channel's receiver is what detects that, by construction, without
/// needing a value to flow through the channel at all.
#[derive(Debug, Clone)]
pub enum PendingOutcome {
    Responded(std::result::Result<Value, Value>),
}

/// Thread-safe table mapping proxy-issued request ids to one-shot sinks.
///
/// Every entry inserted here is eventually removed — either by a matching
/// response arriving on the server→client path, or by the issuing call's
/// own timeout firing first (spec invariant I3). Consuming a response via
/// [`PendingRequests::resolve`] is what makes the server→client router
/// suppress it instead of forwarding it upstream (invariant I4).
#[derive(Default)]
pub struct PendingRequests {
    next_id: AtomicU64,
    inner: DashMap<ProxyRequestId, oneshot::Sender<PendingOutcome>>,
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { next_id: AtomicU64::new(1), inner: DashMap::new() })
    }

    /// Reserve the next proxy request id and register a sink for its
    /// response. Returns the id (to embed in the outgoing request) and a
    /// receiver that resolves when `resolve` is called with a matching id,
    /// or is dropped (the caller's own timeout elapsed and it gave up).
    pub fn register(&self) -> (ProxyRequestId, oneshot::Receiver<PendingOutcome>) {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = crate::types::format_proxy_id(n);
        let (tx, rx) = oneshot::channel();
        self.inner.insert(id.clone(), tx);
        (id, rx)
    }

    /// Returns `true` if `id` was a pending proxy request: the matching
    /// sink is resolved with `outcome` and the entry is removed. The
    /// caller (the server→client router) uses the return value to decide
    /// whether to suppress the line instead of forwarding it.
    pub fn resolve(&self, id: &str, outcome: std::result::Result<Value, Value>) -> bool {
        if let Some((_, tx)) = self.inner.remove(id) {
            let _ = tx.send(PendingOutcome::Responded(outcome));
            true
        } else {
            false
        }
    }

    /// Drop a pending entry without resolving it (used when the issuing
    /// call's own `tokio::time::timeout` already fired — there is nothing
    /// left to notify, but the entry must still be removed so a very late
    /// response is, per I4, consumed rather than forwarded).
    pub fn expire(&self, id: &str) {
        self.inner.remove(id);
    }

    /// Whether `id` is still outstanding.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
