//! Proxy: the pieces wired together by [`shell::ProxyShell`].
//!
//! - [`pending`] — proxy-issued request bookkeeping (I3/I4)
//! - [`router`] — per-message routing decisions (C4)
//! - [`restart`] — the restart state machine (C5)
//! - [`handshake`] — handshake replay + tools probe (C6)
//! - [`shell`] — wires the above around a running child (C7)

pub mod handshake;
pub mod pending;
pub mod restart;
pub mod router;
pub mod shell;

pub use pending::PendingRequests;
pub use shell::ProxyShell;

use crate::error::ForwardError;
use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::io::Stdout;
use tokio::process::ChildStdin;
use tokio::sync::{Mutex, Notify};

/// State shared between the outer-stdin reader, the per-child stdout
/// reader, and the restart controller. One instance lives for the whole
/// process; its contents outlive any single child generation.
pub struct ProxyState {
    pub pending: Arc<PendingRequests>,
    /// Most recently captured `initialize` params from the outer client
    /// (spec invariant I5).
    pub initialize_snapshot: ArcSwapOption<Value>,
    /// `true` while a restart is in flight: gates the client→server path
    /// into [`router::ClientBuffer`] instead of the child (invariant I1).
    pub restarting: AtomicBool,
    pub buffer: router::ClientBuffer,
    /// The current child's stdin, swapped out by the restart controller.
    /// `None` only during the brief window between killing the old child
    /// and wiring up the new one.
    pub child_stdin: Mutex<Option<ChildStdin>>,
    /// Single writer lock over outer stdout (invariant I6 companion: one
    /// writer, even though several tasks can produce output for it).
    pub outer_stdout: Mutex<Stdout>,
    /// Notified when a write to outer stdout fails: per spec §7, that's
    /// treated as the outer client having disconnected, and the shell's
    /// run loop shuts the whole proxy down rather than limping on with a
    /// dead output side.
    pub shutdown: Notify,
}

impl ProxyState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: PendingRequests::new(),
            initialize_snapshot: ArcSwapOption::from(None),
            restarting: AtomicBool::new(false),
            buffer: router::ClientBuffer::new(),
            child_stdin: Mutex::new(None),
            outer_stdout: Mutex::new(tokio::io::stdout()),
            shutdown: Notify::new(),
        })
    }

    /// Write one mcpmon-constructed message to outer stdout (the handshake
    /// replay's synthesized `list_changed` notification — there's no
    /// original line to preserve for those).
    pub async fn write_to_outer(&self, message: &Value) -> Result<(), ForwardError> {
        let mut stdout = self.outer_stdout.lock().await;
        crate::transport::framer::write_message(&mut *stdout, message).await.map_err(ForwardError::ToOuter)
    }

    /// Forward a raw line from the child verbatim to outer stdout (spec
    /// §4.4 step 2): byte-for-byte, no re-serialization, so key order and
    /// whitespace the child chose survive the hop.
    pub async fn write_raw_to_outer(&self, line: &str) -> Result<(), ForwardError> {
        let mut stdout = self.outer_stdout.lock().await;
        crate::transport::framer::write_raw_line(&mut *stdout, line).await.map_err(ForwardError::ToOuter)
    }

    /// Write one message to the current child's stdin, taking the shared
    /// writer lock. Returns `Ok(false)` if there is currently no child
    /// wired up (the brief kill→spawn gap) so the caller can decide
    /// whether to buffer instead.
    pub async fn write_to_child(&self, message: &Value) -> Result<bool, ForwardError> {
        let mut guard = self.child_stdin.lock().await;
        match guard.as_mut() {
            Some(stdin) => {
                crate::transport::framer::write_message(stdin, message).await.map_err(ForwardError::ToChild)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }
}
