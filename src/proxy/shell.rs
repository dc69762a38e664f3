//! Proxy Shell (spec §4.7, component C7).
//!
//! Owns the outer client's stdio, the current child, and the change
//! watcher, and drives the whole proxy end to end. Grounded on the
//! teacher's `ProxyServer::run` (`src/proxy/server.rs`) for the overall
//! shape of "wire up background tasks, then `select!` on the events that
//! can end the process" — generalized here from an HTTP accept loop to a
//! single stdin reader plus a restart trigger.

use crate::config::{ChangeWatcher, ProxyConfig};
use crate::daemon::signals::setup_signal_handlers;
use crate::error::Result;
use crate::proxy::restart;
use crate::proxy::router::{route_client_message, ClientRoute};
use crate::proxy::ProxyState;
use crate::transport::framer::LineReader;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The assembled proxy, ready to run until the outer client disconnects
/// or the process receives a shutdown signal.
pub struct ProxyShell {
    config: ProxyConfig,
    state: Arc<ProxyState>,
}

/// How often the supervision loop polls the current child for an
/// unexpected exit (spec §4.5, RUNNING → SPAWNING). Independent of any
/// configured delay — this is purely a liveness-poll cadence.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

impl ProxyShell {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config, state: ProxyState::new() }
    }

    /// Run the proxy to completion. Returns once the outer client's stdin
    /// hits EOF or a shutdown signal arrives; the current child is killed
    /// gracefully before returning either way.
    pub async fn run(self) -> Result<()> {
        let Self { config, state } = self;

        let mut current = restart::spawn_and_wire(&config, &state).await?;
        info!("mcpmon: proxying `{}`", config.command);

        let mut watch_rx = None;
        let mut _watcher = None;
        if let Some(path) = &config.entry_file {
            if let Some((watcher, rx)) = ChangeWatcher::start(path, config.restart_delay) {
                info!("watching {} for changes", path.display());
                _watcher = Some(watcher);
                watch_rx = Some(rx);
            }
        }

        let (_shutdown_tx, mut shutdown_rx) = setup_signal_handlers();

        // The single stdin reader (invariant I6): the outer client's
        // stdin is consumed by exactly this one task for the whole run.
        let stdin_state = Arc::clone(&state);
        let mut stdin_task = tokio::spawn(async move {
            let mut reader = LineReader::new(tokio::io::stdin());
            loop {
                match reader.next_message().await {
                    Ok(Some((message, _raw))) => {
                        let route =
                            route_client_message(&message, &stdin_state.restarting, &stdin_state.initialize_snapshot);
                        match route {
                            ClientRoute::Buffer => stdin_state.buffer.push(message).await,
                            ClientRoute::Forward => match stdin_state.write_to_child(&message).await {
                                Ok(true) => {},
                                Ok(false) => stdin_state.buffer.push(message).await,
                                Err(e) => {
                                    // A broken child-stdin pipe is implicit
                                    // child death, not outer-client death
                                    // (spec §7): buffer the message and let
                                    // the exit poll below notice the dead
                                    // child and respawn, instead of ending
                                    // the one outer-stdin reader (I6).
                                    warn!("{e}; buffering until the next restart");
                                    stdin_state.buffer.push(message).await;
                                },
                            },
                        }
                    },
                    Ok(None) => {
                        info!("outer stdin closed; shutting down");
                        break;
                    },
                    Err(e) => {
                        warn!("error reading outer stdin: {e}");
                        break;
                    },
                }
            }
        });

        let mut exit_poll = tokio::time::interval(EXIT_POLL_INTERVAL);
        exit_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stdin_task => {
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
                _ = state.shutdown.notified() => {
                    info!("outer stdout write failed; shutting down");
                    break;
                }
                Some(event) = recv_optional(&mut watch_rx) => {
                    info!("change detected at {:?}; restarting", event.path);
                    current = restart::perform_restart(&config, &state, current).await?;
                }
                _ = exit_poll.tick() => {
                    if !state.restarting.load(Ordering::SeqCst) {
                        if let Ok(Some(status)) = current.process.try_wait() {
                            warn!("child exited unexpectedly ({status:?}); restarting");
                            current = restart::perform_restart(&config, &state, current).await?;
                        }
                    }
                }
            }
        }

        stdin_task.abort();
        if let Err(e) = current.process.kill_gracefully(config.graceful_timeout).await {
            warn!("error killing child during shutdown: {e}");
        }
        Ok(())
    }
}

/// Adapts an `Option<mpsc::UnboundedReceiver<T>>` for use in `select!`:
/// when there's no watcher running, this branch never becomes ready
/// instead of panicking on a `None` receiver.
async fn recv_optional<T>(rx: &mut Option<tokio::sync::mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_shell_does_not_spawn_until_run() {
        let cfg = ProxyConfig::new("cat".into(), vec![]).unwrap();
        let shell = ProxyShell::new(cfg);
        assert_eq!(Arc::strong_count(&shell.state), 1);
    }
}
