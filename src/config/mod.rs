//! Configuration for the proxy supervisor.
//!
//! `ProxyConfig` is immutable after construction (spec §3): it is built once
//! from CLI args plus the `MCPMON_*` environment overrides and handed to
//! [`crate::proxy::ProxyShell`]. There is no on-disk config file to load or
//! hot-reload here — unlike the teacher's aggregator, which watches and
//! hot-swaps a YAML document, mcpmon's only "configuration" is the
//! command line it was invoked with.

use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub mod cli;
pub mod watcher;

pub use watcher::ChangeWatcher;

/// Immutable configuration for a single proxy run (spec §3).
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Program to spawn.
    pub command: String,
    /// Ordered argument list passed to `command`.
    pub command_args: Vec<String>,
    /// Path to watch for hot-reload, or `None` to disable it.
    pub entry_file: Option<PathBuf>,
    /// Debounce window for change events.
    pub restart_delay: Duration,
    /// Pause between kill and respawn.
    pub kill_delay: Duration,
    /// Pause after spawn before the handshake replay begins.
    pub ready_delay: Duration,
    /// Time to wait for graceful exit before forcing.
    pub graceful_timeout: Duration,
    /// Timeout for proxy-issued RPCs (handshake replay, `tools/list` probe).
    pub request_timeout: Duration,
    /// Environment variables merged into the child's environment.
    pub env: HashMap<String, String>,
}

fn default_restart_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_kill_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_ready_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_graceful_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(5000)
}

impl ProxyConfig {
    /// Build a config for `command` with no hot-reload and the spec's
    /// default timings. Callers typically adjust `entry_file` and
    /// `restart_delay` afterwards via the CLI / env layer in [`cli`].
    pub fn new(command: String, command_args: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(ConfigError::MissingCommand.into());
        }

        Ok(Self {
            command,
            command_args,
            entry_file: None,
            restart_delay: default_restart_delay(),
            kill_delay: default_kill_delay(),
            ready_delay: default_ready_delay(),
            graceful_timeout: default_graceful_timeout(),
            request_timeout: default_request_timeout(),
            env: HashMap::new(),
        })
    }

    /// Validate the config, checking only what's cheap and meaningful to
    /// check at boot: an explicitly-provided watch path must exist (spec
    /// §7 `ConfigError`). A watch path that was merely autodetected and
    /// turns out to be missing instead disables hot-reload with a warning
    /// (spec §4.3) rather than failing boot.
    pub fn validate_explicit_watch_path(&self) -> Result<()> {
        if let Some(path) = &self.entry_file {
            if !path.exists() {
                return Err(ConfigError::WatchPathMissing(path.display().to_string()).into());
            }
        }
        Ok(())
    }
}
