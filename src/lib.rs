//! mcpmon: a transparent hot-reload supervisor for MCP stdio servers.
//!
//! Sits between an MCP client and a stdio-based MCP server, restarting the
//! server when its entry file changes and replaying just enough of the
//! handshake that the client never notices it was talking to a new
//! process.

pub mod config;
pub mod daemon;
pub mod error;
pub mod proxy;
pub mod setup;
pub mod transport;
pub mod types;

pub use config::ProxyConfig;
pub use error::{McpmonError, Result};
pub use proxy::ProxyShell;
