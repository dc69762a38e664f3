//! Process and framing layer: stdio only (spec §1 — "stdio transport only;
//! network transports are out of scope").

pub mod framer;
pub mod stdio;

pub use stdio::ChildProcess;
