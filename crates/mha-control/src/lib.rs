//! mha-control library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` share
//! the same module tree as downstream users.
//!
//! # What does mha-control do? (for beginners)
//!
//! The MHA (open Master Hearing Aid) is a real-time audio processing server.
//! While it runs, every plug-in setting lives in a tree of named variables
//! such as `mha.transducers.mhachain.gain.gains`.  The server exposes that
//! tree over a plain-text TCP protocol: the client sends one command per
//! line, and the server answers each command with zero or more lines of text
//! followed by a prompt line, `(MHA:success)` or `(MHA:failure)`.
//!
//! This crate provides:
//!
//! 1. [`Session`]: one TCP connection to an MHA server, with connect,
//!    reconnect and a batched exchange that always yields one response per
//!    command, even when the network fails half-way through.
//! 2. [`ParserClient`]: typed helpers (`get_val`, `set_val`, `get_val_raw`,
//!    `entries`, `find_id`, ...) on top of any [`Parser`].
//! 3. [`ControlConfig`]: the TOML configuration file with host, port,
//!    timeout and prompt overrides.
//! 4. [`OutputCollector`]: drains the console output of a locally started
//!    MHA process on a background thread.

/// Application layer: use cases built on the parser abstraction.
pub mod application;

/// Infrastructure layer: TCP session, configuration file and process output.
pub mod infrastructure;

pub use application::parser_client::{ClientError, Parser, ParserClient};
pub use infrastructure::network::{Session, SessionError};
pub use infrastructure::process_output::{CaptureMode, OutputCollector};
pub use infrastructure::storage::config::ControlConfig;
pub use mha_core::{Complex, MhaValue, ParserResponse, Prompts, Query, Request, ResponseStatus};
