//! Process Supervisor (spec §4.2, component C2).
//!
//! Spawns and kills the child MCP server, exposing its three byte streams
//! exactly once each. Grounded on the teacher's `StdioProcess`
//! (`src/transport/stdio.rs`): `Stdio::piped()` for all three streams,
//! `kill_on_drop(true)`, and a background stderr-drain task — but unlike
//! the teacher, which keeps one long-lived `StdioProcess` per backend and
//! re-initializes lazily, mcpmon tears down and replaces the whole
//! `ChildProcess` on every restart (spec invariant I2: at most one child
//! live at a time).
//!
//! Docker caveat (spec §4.2, §9): if `command` is `docker` invoked with
//! `-i`, the spawned process is the `docker run` CLI, not the container it
//! launches. Killing the CLI terminates mcpmon's obligation under this
//! spec, but may not stop the container itself; container cleanup is out
//! of scope.

use crate::error::{Result, SpawnError};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

/// A live child process and its three pipes, each consumable exactly once.
pub struct ChildProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ChildProcess {
    /// Spawn `command args...` with `env` merged into the inherited
    /// environment, stdio fully piped (never inherited, spec §6).
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        // `which` gives a clearer ConfigError-shaped signal than letting the
        // raw `ENOENT` from `spawn()` bubble up as an opaque io::Error.
        if which::which(command).is_err() && !std::path::Path::new(command).exists() {
            return Err(SpawnError::CommandNotFound(command.to_string()).into());
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| SpawnError::Io { command: command.to_string(), source })?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;

        info!("spawned child `{command}` (pid {:?})", child.id());

        Ok(Self { child, stdin: Some(stdin), stdout: Some(stdout), stderr: Some(stderr) })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take the three pipes, each exactly once. Panics if called twice —
    /// callers wire a freshly spawned child's pipes up to reader/writer
    /// tasks immediately and never need them again.
    pub fn take_io(&mut self) -> (ChildStdin, ChildStdout, ChildStderr) {
        (
            self.stdin.take().expect("stdin already taken"),
            self.stdout.take().expect("stdout already taken"),
            self.stderr.take().expect("stderr already taken"),
        )
    }

    /// Run the kill protocol from spec §4.2: SIGTERM, wait up to
    /// `graceful_timeout`, SIGKILL on timeout, then verify the pid is
    /// actually gone and force-kill again if the OS still reports it alive.
    pub async fn kill_gracefully(&mut self, graceful_timeout: std::time::Duration) -> Result<()> {
        let pid = self.child.id();

        #[cfg(unix)]
        if let Some(pid) = pid {
            send_signal(pid, nix::sys::signal::Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        let waited = tokio::time::timeout(graceful_timeout, self.child.wait()).await;

        match waited {
            Ok(Ok(status)) => {
                debug!("child exited gracefully: {status:?}");
            },
            Ok(Err(e)) => {
                warn!("error waiting for child exit: {e}");
            },
            Err(_) => {
                warn!("graceful_timeout elapsed, sending SIGKILL");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            },
        }

        // Verify: some runtimes resolve the exit future before the kernel
        // has actually reaped the zombie. If the OS still reports the pid
        // alive, force-kill once more.
        #[cfg(unix)]
        if let Some(pid) = pid {
            if pid_is_alive(pid) {
                warn!("pid {pid} still alive after wait(); forcing SIGKILL again");
                send_signal(pid, nix::sys::signal::Signal::SIGKILL);
                let _ = self.child.wait().await;
            }
        }

        Ok(())
    }

    /// Non-blocking liveness probe used by the outer supervision loop to
    /// detect an unexpected exit (spec §4.5, RUNNING → SPAWNING).
    pub fn try_wait(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        self.child.try_wait()
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::unistd::Pid;
    if let Err(e) = nix::sys::signal::kill(Pid::from_raw(pid as i32), signal) {
        debug!("signal {signal:?} to pid {pid} failed (process likely already gone): {e}");
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    use nix::unistd::Pid;
    // Sending signal 0 performs no action but still reports ESRCH if the
    // process is gone — the standard `kill -0` liveness check, reused here
    // exactly as the teacher's `DaemonManager::is_running` uses it.
    nix::sys::signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Drain a child's stderr to the proxy's own stderr, forwarded verbatim
/// (spec §4.4). Runs for the lifetime of the child; returns when stderr
/// hits EOF.
pub async fn forward_stderr(stderr: ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => eprintln!("{line}"),
            Ok(None) => break,
            Err(e) => {
                debug!("error reading child stderr: {e}");
                break;
            },
        }
    }
}
