//! `mcpmon setup` rewrites a third-party MCP client config in place.

use assert_cmd::Command;
use assert_json_diff::assert_json_eq;
use predicates::str::contains;
use serde_json::{json, Value};
use std::fs;

#[test]
fn wraps_stdio_servers_and_backs_up_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("claude_desktop_config.json");
    fs::write(
        &config_path,
        serde_json::to_string_pretty(&json!({
            "mcpServers": {
                "filesystem": {"command": "node", "args": ["index.js", "/tmp"]}
            }
        }))
        .unwrap(),
    )
    .unwrap();

    Command::cargo_bin("mcpmon")
        .unwrap()
        .arg("setup")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("filesystem"));

    let rewritten: Value = serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_json_eq!(
        rewritten["mcpServers"]["filesystem"],
        json!({"command": "mcpmon", "args": ["node", "index.js", "/tmp"]})
    );

    let backups: Vec<_> =
        fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).filter(|e| e.path().extension().map(|e| e == "bak").unwrap_or(false)).collect();
    assert_eq!(backups.len(), 1, "expected exactly one .bak file next to the rewritten config");
}

#[test]
fn rejects_a_config_without_mcp_servers() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("empty.json");
    fs::write(&config_path, "{}").unwrap();

    Command::cargo_bin("mcpmon").unwrap().arg("setup").arg(&config_path).assert().failure();
}
