//! Handshake Replayer (spec §4.6, component C6).
//!
//! After a freshly spawned child is wired up, replay the outer client's
//! captured `initialize` so the new process ends up in the same session
//! state the old one was in, then probe `tools/list` and synthesize a
//! `notifications/tools/list_changed` so the outer client refreshes its
//! tool cache without ever seeing a reconnect.

use crate::config::ProxyConfig;
use crate::error::RpcTimeout;
use crate::proxy::pending::PendingOutcome;
use crate::proxy::ProxyState;
use crate::types::{self, Message};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Why a replayed handshake step didn't get a usable response. Distinct
/// from [`crate::error::McpmonError`]: none of these are fatal to the
/// proxy (spec §7's propagation policy recovers them locally), they only
/// decide whether `replay` keeps going or aborts the rest of the sequence.
#[derive(Debug, Error)]
enum ReplayStepError {
    #[error("no child to replay against")]
    NoChild,
    #[error(transparent)]
    Forward(#[from] crate::error::ForwardError),
    #[error(transparent)]
    Timeout(#[from] RpcTimeout),
    #[error("child returned an error response")]
    ChildError,
    #[error("sender dropped without a response")]
    SenderDropped,
}

/// Replay the handshake against the just-spawned child and return the
/// `list_changed` notification to emit on outer stdout, if any.
///
/// Returns `None` when there is no captured `initialize` to replay (the
/// outer client never sent one yet — true only before the very first
/// restart ever happens) or when the replayed `initialize` itself fails:
/// per spec §4.6, an `initialize` error aborts the rest of the handshake
/// rather than probing `tools/list` against a session the child never
/// actually established.
pub async fn replay(config: &ProxyConfig, state: &ProxyState) -> Option<Message> {
    let params = state.initialize_snapshot.load_full()?;

    if let Err(e) = send_initialize(config, state, &params).await {
        warn!("handshake replay: initialize failed, skipping tools/list probe: {e}");
        return None;
    }

    let tools = match probe_tools_list(config, state).await {
        Ok(tools) => tools,
        Err(e) => {
            warn!("handshake replay: tools/list probe failed, reporting empty tool list: {e}");
            Vec::new()
        },
    };

    Some(types::build_list_changed_notification(tools))
}

async fn send_initialize(config: &ProxyConfig, state: &ProxyState, params: &Value) -> Result<(), ReplayStepError> {
    let (id, rx) = state.pending.register();
    let request = types::build_initialize_request(&id, params);

    if !state.write_to_child(&request).await? {
        state.pending.expire(&id);
        return Err(ReplayStepError::NoChild);
    }

    match tokio::time::timeout(config.request_timeout, rx).await {
        Ok(Ok(PendingOutcome::Responded(Ok(_)))) => Ok(()),
        Ok(Ok(PendingOutcome::Responded(Err(_)))) => Err(ReplayStepError::ChildError),
        Err(_) => {
            state.pending.expire(&id);
            Err(RpcTimeout.into())
        },
        Ok(Err(_)) => Err(ReplayStepError::SenderDropped),
    }
}

async fn probe_tools_list(config: &ProxyConfig, state: &ProxyState) -> Result<Vec<Value>, ReplayStepError> {
    let (id, rx) = state.pending.register();
    let request = types::build_tools_list_request(&id);

    if !state.write_to_child(&request).await? {
        state.pending.expire(&id);
        return Err(ReplayStepError::NoChild);
    }

    match tokio::time::timeout(config.request_timeout, rx).await {
        Ok(Ok(PendingOutcome::Responded(Ok(result)))) => {
            Ok(result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default())
        },
        Ok(Ok(PendingOutcome::Responded(Err(_)))) => Err(ReplayStepError::ChildError),
        Err(_) => {
            state.pending.expire(&id);
            Err(RpcTimeout.into())
        },
        Ok(Err(_)) => Err(ReplayStepError::SenderDropped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::router::ServerRoute;
    use std::sync::Arc;

    fn test_config() -> ProxyConfig {
        let mut cfg = ProxyConfig::new("cat".into(), vec![]).unwrap();
        cfg.request_timeout = std::time::Duration::from_millis(200);
        cfg
    }

    #[tokio::test]
    async fn replay_returns_none_without_a_captured_initialize() {
        let state = ProxyState::new();
        let cfg = test_config();
        assert!(replay(&cfg, &state).await.is_none());
    }

    #[tokio::test]
    async fn replay_times_out_cleanly_with_no_child_wired_up() {
        let state = ProxyState::new();
        state.initialize_snapshot.store(Some(Arc::new(serde_json::json!({"clientInfo": {}}))));
        let cfg = test_config();
        // No child_stdin installed: write_to_child returns Ok(false) so the
        // replay bails out immediately rather than hanging on the timeout.
        assert!(replay(&cfg, &state).await.is_none());
    }

    #[tokio::test]
    async fn resolving_initialize_then_tools_list_yields_list_changed_with_tools() {
        use crate::proxy::router::{route_server_message, ServerRoute};
        use crate::transport::{framer::LineReader, ChildProcess};

        let state = ProxyState::new();
        state.initialize_snapshot.store(Some(Arc::new(serde_json::json!({"clientInfo": {}}))));

        // `cat` echoes every request straight back on stdout; doctor each
        // echoed request into a plausible response so the replay sees a
        // real round trip instead of a canned fixture.
        let mut child = ChildProcess::spawn("cat", &[], &Default::default()).unwrap();
        let (stdin, stdout, _stderr) = child.take_io();
        *state.child_stdin.lock().await = Some(stdin);

        let state_for_reader = std::sync::Arc::clone(&state);
        tokio::spawn(async move {
            let mut reader = LineReader::new(stdout);
            while let Ok(Some((echoed, _raw))) = reader.next_message().await {
                let response = if echoed["method"] == "tools/list" {
                    serde_json::json!({"jsonrpc": "2.0", "id": echoed["id"], "result": {"tools": [{"name": "x"}]}})
                } else {
                    serde_json::json!({"jsonrpc": "2.0", "id": echoed["id"], "result": {}})
                };
                if route_server_message(&response, &state_for_reader.pending) == ServerRoute::Suppressed {
                    continue;
                }
            }
        });

        let cfg = test_config();
        let notification = replay(&cfg, &state).await.expect("expected a list_changed notification");
        assert_eq!(notification["method"], "notifications/tools/list_changed");
        assert_eq!(notification["params"]["tools"], serde_json::json!([{"name": "x"}]));
    }
}
