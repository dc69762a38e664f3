//! Command-line surface (spec §6, component C8).
//!
//! This is the "external collaborator" the spec describes: flag parsing,
//! help/version, entry-file autodetection, and environment-variable
//! pass-through. It produces a [`ProxyConfig`] and nothing more — none of
//! this logic is part of the proxy core.

use super::ProxyConfig;
use crate::error::{ConfigError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Extensions that make an argument eligible to be autodetected as the
/// file to watch, in the absence of `MCPMON_WATCH` (spec §6).
const WATCHABLE_EXTENSIONS: &[&str] = &["js", "mjs", "ts", "py", "rb", "php"];

#[derive(Parser, Debug)]
#[command(name = "mcpmon")]
#[command(about = "Transparent hot-reload supervisor for MCP stdio servers", long_about = None)]
#[command(version)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command to spawn, followed by its arguments.
    ///
    /// Example: `mcpmon node server.js --port 1234`
    #[arg(required = true, num_args = 1..)]
    pub command: Vec<String>,
}

/// A `setup` invocation rewrites a third-party MCP client config instead
/// of running the proxy. Kept as a separate parser so `mcpmon <command>`
/// doesn't need to special-case a subcommand name that could collide with
/// a real child command.
#[derive(Parser, Debug)]
#[command(name = "mcpmon-setup")]
pub struct SetupCli {
    /// Path to the MCP client config JSON to rewrite in place.
    pub config_path: PathBuf,
}

/// Environment overrides read at startup (spec §6).
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub watch: Option<Vec<PathBuf>>,
    /// Raw `MCPMON_DELAY` value, validated in [`build_config`] rather than
    /// here: an unparseable value is a boot-time `ConfigError`, not a
    /// silently-ignored override.
    pub delay_ms: Option<String>,
    pub verbose: bool,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let watch = std::env::var("MCPMON_WATCH").ok().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        });

        let delay_ms = std::env::var("MCPMON_DELAY").ok();

        let verbose = std::env::var("MCPMON_VERBOSE")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        Self { watch, delay_ms, verbose }
    }
}

pub fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

impl Cli {
    /// If invoked as `mcpmon setup <config-path>`, parse and return the
    /// setup invocation instead of the proxy one. Checked before
    /// `Cli::parse()`, since `trailing_var_arg` would otherwise swallow
    /// `setup` as the very first word of the command to spawn.
    pub fn try_parse_setup() -> Option<SetupCli> {
        let mut args = std::env::args();
        let _bin = args.next();
        if args.next().as_deref() != Some("setup") {
            return None;
        }
        let rest = std::iter::once("mcpmon-setup".to_string()).chain(args);
        SetupCli::try_parse_from(rest).ok()
    }
}

/// First argument after `command` not starting with `-` whose extension is
/// in the watchable set (spec §6's autodetection rule).
fn autodetect_entry_file(command_args: &[String]) -> Option<PathBuf> {
    command_args.iter().find_map(|arg| {
        if arg.starts_with('-') {
            return None;
        }
        let ext = std::path::Path::new(arg).extension()?.to_str()?;
        WATCHABLE_EXTENSIONS.contains(&ext).then(|| PathBuf::from(arg))
    })
}

/// Build a [`ProxyConfig`] from parsed CLI args and environment overrides.
pub fn build_config(cli: Cli, env: EnvOverrides) -> Result<ProxyConfig> {
    let mut iter = cli.command.into_iter();
    let command = iter.next().ok_or(ConfigError::MissingCommand)?;
    let command_args: Vec<String> = iter.collect();

    let mut config = ProxyConfig::new(command, command_args.clone())?;

    // MCPMON_WATCH overrides autodetection; the core supports only one
    // watched path, so the first one wins (spec §6). An explicitly given
    // path that doesn't exist is a boot-time ConfigError; an autodetected
    // one just disables hot-reload (handled in the change watcher itself).
    config.entry_file = match env.watch {
        Some(paths) => {
            let explicit = paths.into_iter().next();
            if let Some(path) = &explicit {
                if !path.exists() {
                    return Err(ConfigError::WatchPathMissing(path.display().to_string()).into());
                }
            }
            explicit
        },
        None => autodetect_entry_file(&command_args),
    };

    if let Some(raw) = env.delay_ms {
        let ms = raw.parse::<u64>().map_err(|_| ConfigError::InvalidDuration {
            name: "MCPMON_DELAY",
            value: raw.clone(),
        })?;
        config.restart_delay = Duration::from_millis(ms);
    }

    Ok(config)
}
