//! Setup Helper (spec §4.9, component C9).
//!
//! Rewrites an MCP client config (`{"mcpServers": {name: {command, args,
//! env?, cwd?}}}`) so each stdio-eligible entry's `command`/`args` is
//! wrapped in an `mcpmon` invocation, after backing the original file up.
//! Not part of the core proxy loop; a separate, thin collaborator the
//! `setup` CLI subcommand calls.

use crate::error::{McpmonError, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Substrings that, if found in a server entry's command or args, mark it
/// as almost certainly not a stdio MCP server (an HTTP/SSE server
/// launched the same way a stdio one would be) — rewriting it would break
/// it rather than add hot-reload.
const NON_STDIO_INDICATORS: &[&str] = &["--port", "--http", "--sse", "server.listen", "express", "fastify"];

/// Outcome of rewriting one server entry.
#[derive(Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    Wrapped,
    SkippedAlreadyWrapped,
    SkippedNotStdio,
}

/// Read `config_path`, back it up alongside itself with an ISO-8601
/// timestamp suffix, rewrite every eligible `mcpServers` entry to run
/// through `mcpmon`, and write the result back. Returns the per-entry
/// outcomes, keyed by server name.
pub fn apply(config_path: &Path) -> Result<Vec<(String, EntryOutcome)>> {
    let raw = std::fs::read_to_string(config_path)?;
    let mut doc: Value = serde_json::from_str(&raw)
        .map_err(|e| McpmonError::Other(format!("{} is not valid JSON: {e}", config_path.display())))?;

    let backup_path = backup_path_for(config_path);
    std::fs::write(&backup_path, &raw)?;
    info!("backed up {} to {}", config_path.display(), backup_path.display());

    let mut outcomes = Vec::new();
    let Some(servers) = doc.get_mut("mcpServers").and_then(Value::as_object_mut) else {
        return Err(McpmonError::Other(format!("{} has no \"mcpServers\" object", config_path.display())));
    };

    for (name, entry) in servers.iter_mut() {
        let outcome = rewrite_entry(entry);
        outcomes.push((name.clone(), outcome));
    }

    std::fs::write(config_path, serde_json::to_string_pretty(&doc)?)?;
    Ok(outcomes)
}

fn backup_path_for(config_path: &Path) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let mut name = config_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    name.push_str(&format!(".{timestamp}.bak"));
    config_path.with_file_name(name)
}

fn rewrite_entry(entry: &mut Value) -> EntryOutcome {
    let Some(command) = entry.get("command").and_then(Value::as_str).map(str::to_string) else {
        return EntryOutcome::SkippedNotStdio;
    };

    if command == "mcpmon" {
        return EntryOutcome::SkippedAlreadyWrapped;
    }

    let args: Vec<String> =
        entry.get("args").and_then(Value::as_array).map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect()).unwrap_or_default();

    let haystack = format!("{command} {}", args.join(" "));
    if NON_STDIO_INDICATORS.iter().any(|needle| haystack.contains(needle)) {
        return EntryOutcome::SkippedNotStdio;
    }

    let mut new_args = vec![command];
    new_args.extend(args);

    let obj = entry.as_object_mut().expect("mcpServers entries are JSON objects");
    obj.insert("command".to_string(), Value::String("mcpmon".to_string()));
    obj.insert("args".to_string(), Value::Array(new_args.into_iter().map(Value::String).collect()));

    EntryOutcome::Wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write_config(dir: &Path, contents: &Value) -> PathBuf {
        let path = dir.join("mcp.json");
        fs::write(&path, serde_json::to_string_pretty(contents).unwrap()).unwrap();
        path
    }

    #[test]
    fn wraps_a_plain_stdio_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &json!({"mcpServers": {"fs": {"command": "node", "args": ["server.js"]}}}),
        );

        let outcomes = apply(&path).unwrap();
        assert_eq!(outcomes, vec![("fs".to_string(), EntryOutcome::Wrapped)]);

        let rewritten: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten["mcpServers"]["fs"]["command"], "mcpmon");
        assert_eq!(rewritten["mcpServers"]["fs"]["args"], json!(["node", "server.js"]));
    }

    #[test]
    fn skips_an_http_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &json!({"mcpServers": {"web": {"command": "node", "args": ["server.js", "--port", "3000"]}}}),
        );

        let outcomes = apply(&path).unwrap();
        assert_eq!(outcomes, vec![("web".to_string(), EntryOutcome::SkippedNotStdio)]);
    }

    #[test]
    fn skips_an_already_wrapped_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &json!({"mcpServers": {"fs": {"command": "mcpmon", "args": ["node", "server.js"]}}}),
        );

        let outcomes = apply(&path).unwrap();
        assert_eq!(outcomes, vec![("fs".to_string(), EntryOutcome::SkippedAlreadyWrapped)]);
    }

    #[test]
    fn writes_a_timestamped_backup_of_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = json!({"mcpServers": {"fs": {"command": "node", "args": ["server.js"]}}});
        let path = write_config(&dir, &original);

        apply(&path).unwrap();

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
            .collect();
        assert_eq!(backups.len(), 1);
        let backed_up: Value = serde_json::from_str(&fs::read_to_string(backups[0].path()).unwrap()).unwrap();
        assert_eq!(backed_up, original);
    }
}
