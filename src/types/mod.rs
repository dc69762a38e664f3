//! Common types shared across the proxy.
//!
//! Messages are carried as opaque [`serde_json::Value`] rather than a typed
//! request/response struct: mcpmon does not validate MCP semantics (spec
//! Non-goal), so any field it doesn't know about round-trips untouched.
//! Only three shapes are distinguished by name, per the spec's data model.

use serde_json::Value;

/// The one request method mcpmon inspects on the client→server path.
pub const METHOD_INITIALIZE: &str = "initialize";

/// The probe method the handshake replayer issues after a restart.
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// The notification mcpmon synthesizes onto outer stdout after a restart.
pub const METHOD_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// A single decoded JSON-RPC 2.0 line.
pub type Message = Value;

/// The id space reserved for requests mcpmon itself issues to the child
/// (handshake replay, `tools/list` probe). Kept disjoint from whatever ids
/// the outer client uses by construction: these ids never leak upstream,
/// they're consumed in the server→client path before passthrough (see
/// `router::pending`).
pub type ProxyRequestId = String;

/// Format the next proxy-issued request id. Proxy ids are strings of the
/// form `mcpmon-<n>`, the "cleanest" option the spec calls out in its
/// design notes over relying on a numeric offset and statistical
/// disjointness.
pub fn format_proxy_id(n: u64) -> ProxyRequestId {
    format!("mcpmon-{n}")
}

/// Read `.method` off a decoded message, if present.
pub fn method_of(message: &Message) -> Option<&str> {
    message.get("method").and_then(Value::as_str)
}

/// Read `.id` off a decoded message as a comparable string, if present.
/// JSON-RPC ids may be a string or a number; both are normalized to a
/// string for comparison against the pending-requests table's keys.
pub fn id_of(message: &Message) -> Option<String> {
    match message.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build the `initialize` request mcpmon replays to a freshly spawned
/// child, reusing the outer client's captured params verbatim.
pub fn build_initialize_request(id: &ProxyRequestId, params: &Value) -> Message {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": METHOD_INITIALIZE,
        "params": params,
    })
}

/// Build the `tools/list` probe request issued after a replayed handshake.
pub fn build_tools_list_request(id: &ProxyRequestId) -> Message {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": METHOD_TOOLS_LIST,
        "params": {},
    })
}

/// Build the synthesized `notifications/tools/list_changed` notification.
/// Including `params.tools` inline is a de-facto extension over the
/// standard MCP notification, preserved here for wire compatibility with
/// the reference implementation (spec §4.6).
pub fn build_list_changed_notification(tools: Vec<Value>) -> Message {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": METHOD_TOOLS_LIST_CHANGED,
        "params": { "tools": tools },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_of_reads_method_field() {
        let m = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        assert_eq!(method_of(&m), Some("initialize"));
    }

    #[test]
    fn method_of_absent_on_responses() {
        let m = json!({"jsonrpc": "2.0", "id": 1, "result": {}});
        assert_eq!(method_of(&m), None);
    }

    #[test]
    fn id_of_normalizes_numeric_and_string_ids() {
        assert_eq!(id_of(&json!({"id": 7})), Some("7".to_string()));
        assert_eq!(id_of(&json!({"id": "mcpmon-3"})), Some("mcpmon-3".to_string()));
        assert_eq!(id_of(&json!({"method": "x"})), None);
    }

    #[test]
    fn format_proxy_id_is_disjoint_looking() {
        assert_eq!(format_proxy_id(1), "mcpmon-1");
        assert_eq!(format_proxy_id(42), "mcpmon-42");
    }

    proptest::proptest! {
        /// Whatever `n` comes out of the counter, the formatted id always
        /// normalizes back through `id_of` to itself once embedded in a
        /// message, and never collides with a bare numeric id (JSON-RPC's
        /// other legal id shape) for any `n`.
        #[test]
        fn proxy_id_round_trips_through_id_of(n in 0u64..=u64::MAX) {
            let id = format_proxy_id(n);
            let msg = json!({"jsonrpc": "2.0", "id": id.clone(), "result": {}});
            prop_assert_eq!(id_of(&msg), Some(id.clone()));
            prop_assert_ne!(id, n.to_string());
        }
    }
}
