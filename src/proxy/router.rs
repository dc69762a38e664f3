//! Message Router (spec §4.4, component C4).
//!
//! Pure routing decisions over a single parsed message, kept separate from
//! the I/O loops that call them (in `proxy::shell`) so the routing logic —
//! the part spec §8's properties P1–P4 actually constrain — is unit
//! testable without a real child process.

use crate::proxy::pending::PendingRequests;
use crate::types::{self, Message};
use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// What the client→server path should do with a message it just decoded.
#[derive(Debug, PartialEq, Eq)]
pub enum ClientRoute {
    /// Write it straight to the child's stdin.
    Forward,
    /// `restarting` was set: append it to the buffer instead (spec I1).
    Buffer,
}

/// What the server→client path should do with a message it just decoded.
#[derive(Debug, PartialEq, Eq)]
pub enum ServerRoute {
    /// No pending proxy request matched: pass the line through to outer
    /// stdout verbatim.
    Forward,
    /// A pending proxy request matched and was resolved: the line must
    /// NOT be re-emitted to the outer client (spec invariant I4).
    Suppressed,
}

/// Decide the client→server route for `message`, updating
/// `initialize_snapshot` first if `message` is an `initialize` request
/// (spec invariant I5: the snapshot is updated before the message is
/// forwarded or buffered — capturing it doesn't depend on which route is
/// taken).
pub fn route_client_message(
    message: &Message,
    restarting: &AtomicBool,
    initialize_snapshot: &ArcSwapOption<Value>,
) -> ClientRoute {
    if types::method_of(message) == Some(types::METHOD_INITIALIZE) {
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        initialize_snapshot.store(Some(Arc::new(params)));
        debug!("captured new initialize snapshot from outer client");
    }

    if restarting.load(Ordering::SeqCst) {
        ClientRoute::Buffer
    } else {
        ClientRoute::Forward
    }
}

/// Decide the server→client route for `message`: if its `id` matches an
/// outstanding proxy-issued request, resolve it and suppress (I4);
/// otherwise forward.
pub fn route_server_message(message: &Message, pending: &PendingRequests) -> ServerRoute {
    let Some(id) = types::id_of(message) else {
        return ServerRoute::Forward;
    };

    // A response carries `result` or `error`; a request/notification from
    // the child (unusual but not forbidden by JSON-RPC) never matches a
    // proxy-issued id because that id space is never reused as a method
    // call id by a well-behaved server.
    let looks_like_response = message.get("result").is_some() || message.get("error").is_some();
    if !looks_like_response {
        return ServerRoute::Forward;
    }

    let outcome = match message.get("error") {
        Some(error) => Err(error.clone()),
        None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
    };

    if pending.resolve(&id, outcome) {
        ServerRoute::Suppressed
    } else {
        ServerRoute::Forward
    }
}

/// Ordered buffer of client→server messages accumulated while
/// `restarting=true` (spec §3, §4.5). Drained exactly once, in insertion
/// order, at the SPAWNING→REPLAYING transition.
pub struct ClientBuffer {
    queue: Mutex<std::collections::VecDeque<Message>>,
}

impl ClientBuffer {
    pub fn new() -> Self {
        Self { queue: Mutex::new(std::collections::VecDeque::new()) }
    }

    pub async fn push(&self, message: Message) {
        self.queue.lock().await.push_back(message);
    }

    /// Drain everything currently queued, in order. Called repeatedly
    /// until empty across the SPAWNING→REPLAYING→PROBING window, since
    /// messages can keep arriving (and get re-buffered by the router)
    /// right up until `restarting` clears.
    pub async fn drain(&self) -> Vec<Message> {
        let mut q = self.queue.lock().await;
        q.drain(..).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

impl Default for ClientBuffer {
    fn default() -> Self {
        Self::new()
    }
}
