//! Network infrastructure: the TCP session to an MHA server.
//!
//! Architecture:
//! - [`Session`] owns at most one TCP connection (a write half and a buffered
//!   line reader cloned from the same socket).
//! - [`Session::exchange`] writes a batch of commands in one go and then reads
//!   one framed response per command, in order.
//! - Faults during an exchange never escape as errors; they are turned into
//!   failure responses so the caller always gets one answer per command.
//!
//! # Blocking I/O (for beginners)
//!
//! The session uses `std::net::TcpStream` with socket-level timeouts instead
//! of an async runtime.  The protocol is strictly request → response with a
//! single command batch in flight, so the calling thread has nothing else to
//! do while it waits.  A read that waits longer than the configured timeout
//! fails with `WouldBlock` (Unix) or `TimedOut` (Windows); both are reported
//! as [`SessionError::Timeout`].

mod session;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

pub use session::Session;

/// Port the MHA listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 33337;

/// Per-operation timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(7000);

/// Longest inbound line accepted by default (1 MiB), terminator included.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

/// Errors that can occur in the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `connect()` was called before any endpoint was set.
    #[error("no endpoint configured")]
    NoEndpoint,

    /// An exchange was attempted without a live connection.
    #[error("not connected to an MHA server")]
    NotConnected,

    /// The host name could not be translated into a socket address.
    #[error("could not resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connection could not be established within the timeout.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A read or write waited longer than the configured timeout.
    #[error("{operation} timed out after {millis} ms")]
    Timeout {
        operation: &'static str,
        millis: u128,
    },

    /// Any other I/O error on an established connection.
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The server closed the connection before sending all prompts.
    #[error("connection closed by MHA server")]
    Closed,
}

/// A resolved server address together with the host name it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    addr: SocketAddr,
}

impl Endpoint {
    /// Resolves `host` with the platform resolver and keeps the first address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Resolve`] if the lookup fails or yields no
    /// address.
    pub fn resolve(host: &str, port: u16) -> Result<Self, SessionError> {
        let resolve_error = |source| SessionError::Resolve {
            host: host.to_string(),
            port,
            source,
        };
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(resolve_error)?
            .next()
            .ok_or_else(|| {
                resolve_error(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses found",
                ))
            })?;
        Ok(Self {
            host: host.to_string(),
            port,
            addr,
        })
    }

    /// Host name or IP literal as given by the caller.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The socket address the host resolved to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Returns `true` for OS timeout / would-block errors.
pub(crate) fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
