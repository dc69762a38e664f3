//! Error types for mcpmon.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, McpmonError>;

/// Top-level error type returned from the public API and `main`.
#[derive(Error, Debug)]
pub enum McpmonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Rpc(#[from] RpcTimeout),

    #[error("{0}")]
    Other(String),
}

/// Fatal at boot: invalid configuration or an unusable watch path that was
/// explicitly provided.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no command given: usage is `mcpmon <command> [args...]`")]
    MissingCommand,

    #[error("watch path does not exist: {0}")]
    WatchPathMissing(String),

    #[error("invalid duration value for {name}: {value}")]
    InvalidDuration { name: &'static str, value: String },
}

/// The child process failed to start.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("failed to spawn `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("spawned child is missing its {0} pipe")]
    MissingPipe(&'static str),
}

/// The file-system watcher backend failed.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Notify {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// A proxy-issued RPC (handshake replay, `tools/list` probe) was not
/// answered within `request_timeout`.
#[derive(Error, Debug, Clone)]
#[error("request timed out waiting for a response from the child")]
pub struct RpcTimeout;

/// A write to either the child's stdin or the outer client's stdout failed.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to write to child stdin: {0}")]
    ToChild(#[source] io::Error),

    #[error("failed to write to outer stdout: {0}")]
    ToOuter(#[source] io::Error),
}
