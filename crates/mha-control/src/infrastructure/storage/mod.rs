//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory, writes it back on request and falls back
//! to the protocol defaults when no file exists yet.

pub mod config;
