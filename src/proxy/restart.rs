//! Restart Controller (spec §4.5, component C5).
//!
//! A single actor driving the IDLE → KILLING → SPAWNING → REPLAYING →
//! PROBING → RUNNING state machine (spec §5). There is exactly one of
//! these running at a time per proxy (invariant I2: at most one live
//! child), enforced structurally here by `perform_restart` taking
//! ownership of the old child and returning ownership of the new one —
//! there is no window where a caller could hold two.

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::proxy::router::{route_server_message, ServerRoute};
use crate::proxy::{handshake, ProxyState};
use crate::transport::framer::LineReader;
use crate::transport::{stdio, ChildProcess};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// A live child plus the background tasks draining its stdout/stderr, so
/// the caller can detect an unexpected exit (spec §4.5, RUNNING →
/// SPAWNING) without owning the pipes itself.
pub struct LiveChild {
    pub process: ChildProcess,
    stdout_task: tokio::task::JoinHandle<()>,
    stderr_task: tokio::task::JoinHandle<()>,
}

impl LiveChild {
    /// Has the stdout reader observed EOF (the child exited and closed its
    /// pipes)? Used by the outer supervision loop as a cheap poll between
    /// restarts; `ChildProcess::try_wait` is the authoritative check.
    pub fn stdout_closed(&self) -> bool {
        self.stdout_task.is_finished()
    }
}

impl Drop for LiveChild {
    fn drop(&mut self) {
        self.stdout_task.abort();
        self.stderr_task.abort();
    }
}

/// Spawn `config.command` and wire its three pipes up: stdin installed
/// into `state.child_stdin`, stdout routed per spec §4.4, stderr drained
/// verbatim. Used both for the very first child and, by
/// [`perform_restart`], for every replacement after it.
pub async fn spawn_and_wire(config: &ProxyConfig, state: &Arc<ProxyState>) -> Result<LiveChild> {
    let mut process = ChildProcess::spawn(&config.command, &config.command_args, &config.env)?;
    let (stdin, stdout, stderr) = process.take_io();

    *state.child_stdin.lock().await = Some(stdin);

    let reader_state = Arc::clone(state);
    let stdout_task = tokio::spawn(async move {
        let mut reader = LineReader::new(stdout);
        loop {
            match reader.next_message().await {
                Ok(Some((message, raw))) => {
                    if route_server_message(&message, &reader_state.pending) == ServerRoute::Forward {
                        // Forward the raw line, not a re-serialized `message`:
                        // `serde_json::Value` without `preserve_order` would
                        // alphabetize the child's keys and drop its whitespace.
                        if let Err(e) = reader_state.write_raw_to_outer(&raw).await {
                            warn!("{e}; treating outer client as disconnected");
                            reader_state.shutdown.notify_one();
                            break;
                        }
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("error reading child stdout: {e}");
                    break;
                },
            }
        }
    });

    let stderr_task = tokio::spawn(stdio::forward_stderr(stderr));

    Ok(LiveChild { process, stdout_task, stderr_task })
}

/// Kill `old`, spawn a fresh child, replay the handshake, and drain
/// whatever buffered up during the gap — the full KILLING through RUNNING
/// leg of the state machine. Leaves `state.restarting` cleared on return.
pub async fn perform_restart(config: &ProxyConfig, state: &Arc<ProxyState>, mut old: LiveChild) -> Result<LiveChild> {
    state.restarting.store(true, Ordering::SeqCst);
    *state.child_stdin.lock().await = None;

    info!("restart: killing current child");
    if let Err(e) = old.process.kill_gracefully(config.graceful_timeout).await {
        warn!("error killing child during restart: {e}");
    }
    drop(old);

    tokio::time::sleep(config.kill_delay).await;

    info!("restart: spawning replacement child");
    let new_child = spawn_and_wire(config, state).await?;

    tokio::time::sleep(config.ready_delay).await;

    info!("restart: replaying handshake");
    if let Some(notification) = handshake::replay(config, state).await {
        if let Err(e) = state.write_to_outer(&notification).await {
            warn!("failed to emit list_changed notification: {e}");
        }
    }

    drain_buffer_until_dry(state).await;
    state.restarting.store(false, Ordering::SeqCst);
    // Catch anything that landed in the instant between the last empty
    // drain above and clearing the flag (spec §4.5's note on the
    // SPAWNING→REPLAYING boundary needing a re-check before PROBING→RUNNING).
    drain_buffer_until_dry(state).await;

    Ok(new_child)
}

async fn drain_buffer_until_dry(state: &Arc<ProxyState>) {
    loop {
        let batch = state.buffer.drain().await;
        if batch.is_empty() {
            return;
        }
        for message in batch {
            if let Err(e) = state.write_to_child(&message).await {
                warn!("failed to replay buffered message: {e}");
            }
        }
    }
}
