//! Process-level signal handling.
//!
//! mcpmon runs in the foreground, attached to the outer client's stdio
//! (spec §1) — there is no daemonize/PID-file lifecycle here, unlike the
//! teacher this module is adapted from. Only the shutdown-signal plumbing
//! survives.

pub mod signals;
