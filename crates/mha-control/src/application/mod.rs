//! Application layer use cases for controlling an MHA.
//!
//! # What use cases are there?
//!
//! - **`parser_client`** – Builds parser commands from typed requests, sends
//!   them through a [`Parser`](parser_client::Parser) and turns failure
//!   prompts into errors.  The TCP session is injected at construction time,
//!   so the use case can be tested against a scripted parser without a
//!   running server.

pub mod parser_client;
