//! mcpmon — transparent hot-reload supervisor for MCP stdio servers.
//!
//! Wraps a stdio MCP server command, watches its entry file, and restarts
//! the server on change without the outer MCP client ever seeing a
//! reconnect.

use clap::Parser;
use mcpmon::config::cli::{build_config, Cli, EnvOverrides, SetupCli};
use mcpmon::{setup, ProxyShell, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    if let Some(setup_cli) = Cli::try_parse_setup() {
        return run_setup(setup_cli);
    }

    let cli = Cli::parse();
    let env = EnvOverrides::from_env();
    let config = build_config(cli, env)?;

    info!("mcpmon v{} wrapping `{}`", env!("CARGO_PKG_VERSION"), config.command);

    let shell = ProxyShell::new(config);
    shell.run().await
}

fn run_setup(setup_cli: SetupCli) -> Result<()> {
    let outcomes = setup::apply(&setup_cli.config_path)?;
    for (name, outcome) in outcomes {
        println!("{name}: {outcome:?}");
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let verbose = mcpmon::config::cli::is_truthy(&std::env::var("MCPMON_VERBOSE").unwrap_or_default());
    let default_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(std::io::stderr)).init();
}
