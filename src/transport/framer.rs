//! Line Framer (spec §4.1, component C1).
//!
//! Splits an incoming byte stream into newline-delimited JSON-RPC messages
//! and serializes outgoing ones the same way. Grounded on the teacher's
//! `StdioProcess::send_json`/`receive_json` (`src/transport/stdio.rs`),
//! generalized per spec: an unparseable line is logged and dropped rather
//! than silently skipped, since on an MCP child's own stdout (unlike an
//! NPX bootstrap script) a non-JSON-RPC line is unexpected.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

/// Reads newline-delimited JSON-RPC messages off any `AsyncBufRead`.
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: tokio::io::AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: BufReader::new(inner), line: String::new() }
    }

    /// Read and parse the next well-formed JSON-RPC line, skipping (and
    /// logging) anything that fails to parse. Returns `Ok(None)` on EOF.
    ///
    /// Returns both the parsed [`Value`] and the raw line it came from
    /// (without the trailing newline): passthrough paths must forward the
    /// original bytes verbatim rather than re-serialize the parsed value,
    /// since `serde_json::Value` without the `preserve_order` feature
    /// reorders object keys alphabetically and drops the sender's own
    /// whitespace (spec §4.4 step 2, §3 "does not modify message payloads").
    pub async fn next_message(&mut self) -> std::io::Result<Option<(Value, String)>> {
        loop {
            self.line.clear();
            let n = self.inner.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => return Ok(Some((value, trimmed.to_string()))),
                Err(e) => {
                    warn!("dropping unparseable line ({e}): {}", truncate(trimmed, 120));
                    continue;
                },
            }
        }
    }
}

/// Writes a single JSON-RPC message as `JSON.stringify(msg) + "\n"` in one
/// write (spec §4.1). Used for messages mcpmon itself constructs
/// (handshake replay, the synthesized `list_changed` notification) — there
/// is no original line to preserve for those.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Writes a raw line (as returned by [`LineReader::next_message`]) plus a
/// trailing newline, verbatim, in one write. Used on every passthrough
/// path so the bytes a child or outer client sent reach the other side
/// byte-for-byte, key order and whitespace included.
pub async fn write_raw_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max])
    }
}
