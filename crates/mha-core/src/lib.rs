//! # mha-core
//!
//! Shared library for controlling an MHA (Master Hearing Aid) server over its
//! text line protocol.  It defines how responses are framed and how request
//! lines are built.
//!
//! This crate has zero dependencies on OS APIs or network sockets; the TCP
//! session lives in `mha-control`.
//!
//! # How the protocol works (for beginners)
//!
//! The MHA listens on a TCP port (33337 by default).  A client writes one
//! command per line.  For every command the server writes back any number of
//! text lines followed by a *prompt* line, either `(MHA:success)` or
//! `(MHA:failure)`.  Several commands may be written at once; the answers
//! come back in the same order.
//!
//! - **`protocol::response`** – [`ResponseAccumulator`] looks at one inbound
//!   line at a time and decides whether it is content or the closing prompt.
//!   The finished value is a [`ParserResponse`].
//!
//! - **`protocol::command`** – [`Request`] builds request lines such as
//!   `mha.gain?val` or `mha.gain=3` and refuses text that would break the
//!   one-command-per-line framing.
//!
//! - **`protocol::value`** – [`MhaValue`] converts between the text the
//!   server prints for a variable (`[1 2;3 4]`, `(0+1i)`, `yes`) and typed
//!   Rust values, guided by the variable's `?type`.

pub mod protocol;

pub use protocol::command::{CommandError, Query, Request};
pub use protocol::response::{ParserResponse, Prompts, ResponseAccumulator, ResponseStatus};
pub use protocol::value::{Complex, MhaValue};
