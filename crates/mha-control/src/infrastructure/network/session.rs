//! The persistent TCP session and its batched exchange.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use mha_core::{ParserResponse, Prompts, ResponseAccumulator};
use tracing::{debug, info, warn};

use super::{is_timeout_error, Endpoint, SessionError, DEFAULT_MAX_LINE_BYTES, DEFAULT_TIMEOUT};
use crate::application::parser_client::Parser;
use crate::infrastructure::storage::config::ControlConfig;

/// The live socket: a write handle and a line reader over a clone of it.
///
/// Both halves are created and dropped together, so a session is never half
/// connected.
#[derive(Debug)]
struct Connection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    line: Vec<u8>,
}

impl Connection {
    fn open(addr: SocketAddr, timeout: Option<Duration>, nodelay: bool) -> io::Result<Self> {
        let stream = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(nodelay)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            writer: stream,
            reader,
            line: Vec::with_capacity(256),
        })
    }

    /// Sends the whole batch with a single write followed by a flush.
    fn send(&mut self, batch: &[u8]) -> io::Result<()> {
        self.writer.write_all(batch)?;
        self.writer.flush()
    }

    /// Reads the next line without its `\n` / `\r\n` terminator.
    ///
    /// Returns `None` at end of stream.  Invalid UTF-8 is replaced rather
    /// than rejected.  A line of more than `limit` bytes (terminator
    /// included) fails with `InvalidData`.
    fn read_line(&mut self, limit: usize) -> io::Result<Option<String>> {
        self.line.clear();
        let read = (&mut self.reader)
            .take(limit as u64)
            .read_until(b'\n', &mut self.line)?;
        if read == 0 {
            return Ok(None);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        } else if read >= limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line longer than {limit} bytes"),
            ));
        }
        Ok(Some(String::from_utf8_lossy(&self.line).into_owned()))
    }

    fn close(self) -> io::Result<()> {
        self.writer.shutdown(Shutdown::Both)
    }
}

/// A client session with one MHA server.
///
/// The session is created empty.  [`Session::set_endpoint`] resolves and
/// connects in one step; [`Session::exchange`] then sends command batches.
///
/// Every I/O method takes `&mut self`, so only one exchange can be in flight
/// per session.  Share a session between threads by wrapping it in a `Mutex`.
///
/// Equality and hashing look only at the endpoint (host and port) and the
/// timeout, never at the live socket.
#[derive(Debug)]
pub struct Session {
    endpoint: Option<Endpoint>,
    timeout: Duration,
    tcp_nodelay: bool,
    max_line_bytes: usize,
    prompts: Prompts,
    connection: Option<Connection>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session without endpoint using the default prompts, a 7 s
    /// timeout and Nagle's algorithm disabled.
    pub fn new() -> Self {
        Self::with_prompts(Prompts::default())
    }

    /// Creates an unconnected session that frames responses with `prompts`.
    pub fn with_prompts(prompts: Prompts) -> Self {
        Self {
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            tcp_nodelay: true,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            prompts,
            connection: None,
        }
    }

    /// Creates an unconnected session with timeout, TCP options, line limit
    /// and prompts taken from `config`.
    pub fn from_config(config: &ControlConfig) -> Self {
        let mut session = Self::with_prompts(config.prompts.clone());
        session.set_timeout(Duration::from_millis(config.connection.timeout_ms));
        session.set_tcp_nodelay(config.connection.tcp_nodelay);
        session.set_max_line_bytes(config.connection.max_line_bytes);
        session
    }

    /// Creates a session from `config` and connects to the configured
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Resolve`] or [`SessionError::Connect`].
    pub fn open(config: &ControlConfig) -> Result<Self, SessionError> {
        let mut session = Self::from_config(config);
        session.try_set_endpoint(&config.connection.host, config.connection.port)?;
        Ok(session)
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    /// Sets the timeout applied to connecting and to every read and write.
    ///
    /// Takes effect on the next connect.  `Duration::ZERO` disables the
    /// timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// The configured per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Enables or disables `TCP_NODELAY`.  Takes effect on the next connect.
    pub fn set_tcp_nodelay(&mut self, nodelay: bool) {
        self.tcp_nodelay = nodelay;
    }

    /// Limits the length of a single inbound line, terminator included.
    ///
    /// A longer line aborts the exchange like any other read fault.  The
    /// limit is at least one byte.
    pub fn set_max_line_bytes(&mut self, max_line_bytes: usize) {
        self.max_line_bytes = max_line_bytes.max(1);
    }

    /// The inbound line length limit in bytes.
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Replaces the prompts used to frame subsequent responses.
    pub fn set_prompts(&mut self, prompts: Prompts) {
        self.prompts = prompts;
    }

    /// The prompts used to frame responses.
    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    fn io_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Resolves `host`, drops any existing connection and connects to the new
    /// endpoint.
    ///
    /// Returns `false` if the name cannot be resolved (the current connection
    /// is then left untouched) or if the connection attempt fails (the
    /// session is then disconnected and has no endpoint).
    pub fn set_endpoint(&mut self, host: &str, port: u16) -> bool {
        match self.try_set_endpoint(host, port) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not switch MHA endpoint to {host}:{port}: {e}");
                false
            }
        }
    }

    /// Same as [`Session::set_endpoint`], reporting the cause of a failure.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Resolve`] or [`SessionError::Connect`].
    pub fn try_set_endpoint(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        let endpoint = Endpoint::resolve(host, port)?;
        self.disconnect();
        self.endpoint = Some(endpoint);
        if let Err(e) = self.connect() {
            self.endpoint = None;
            return Err(e);
        }
        Ok(())
    }

    /// Opens a TCP connection to the current endpoint, replacing any existing
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoEndpoint`] if no endpoint was set, or
    /// [`SessionError::Connect`] if the connection could not be established.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        let addr = self
            .endpoint
            .as_ref()
            .map(Endpoint::addr)
            .ok_or(SessionError::NoEndpoint)?;
        self.disconnect();

        let connection = Connection::open(addr, self.io_timeout(), self.tcp_nodelay)
            .map_err(|source| SessionError::Connect { addr, source })?;
        self.connection = Some(connection);
        info!("connected to {self} ({addr})");
        Ok(())
    }

    /// Closes the connection, if any.  Errors while closing are ignored.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            match connection.close() {
                Ok(()) => debug!("disconnected from {self}"),
                Err(e) => debug!("ignoring error while closing connection to {self}: {e}"),
            }
        }
    }

    /// `true` while a socket is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The current endpoint, if one is set.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Host name of the current endpoint.
    pub fn hostname(&self) -> Option<&str> {
        self.endpoint.as_ref().map(Endpoint::host)
    }

    /// Port of the current endpoint.
    pub fn port(&self) -> Option<u16> {
        self.endpoint.as_ref().map(Endpoint::port)
    }

    // ── Exchange ──────────────────────────────────────────────────────────────

    /// Sends `commands` as one batch and returns one response per command, in
    /// submission order.
    ///
    /// Never fails.  If writing, reading, or the connection itself fails
    /// before all prompts have arrived, the responses completed so far are
    /// kept and every remaining one is a failure response whose single line
    /// describes the fault.  After such a fault the session is disconnected.
    pub fn exchange<S: AsRef<str>>(&mut self, commands: &[S]) -> Vec<ParserResponse> {
        let mut responses = Vec::with_capacity(commands.len());

        if let Err(fault) = self.run_exchange(commands, &mut responses) {
            warn!(
                "exchange with {self} failed after {} of {} responses: {fault}",
                responses.len(),
                commands.len()
            );
            let description = fault.to_string();
            responses.resize_with(commands.len(), || ParserResponse::failure(description.clone()));
            self.disconnect();
        }

        responses
    }

    fn run_exchange<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        responses: &mut Vec<ParserResponse>,
    ) -> Result<(), SessionError> {
        if commands.is_empty() {
            return Ok(());
        }
        let millis = self.timeout.as_millis();
        let limit = self.max_line_bytes;
        let connection = self.connection.as_mut().ok_or(SessionError::NotConnected)?;

        let batch = encode_batch(commands);
        debug!("sending {} command(s), {} bytes", commands.len(), batch.len());
        connection
            .send(batch.as_bytes())
            .map_err(|e| io_fault("write", e, millis))?;

        while responses.len() < commands.len() {
            let mut accumulator = ResponseAccumulator::new(&self.prompts);
            loop {
                let line = connection
                    .read_line(limit)
                    .map_err(|e| io_fault("read", e, millis))?
                    .ok_or(SessionError::Closed)?;
                if !accumulator.append_line(&line) {
                    break;
                }
            }
            responses.push(accumulator.finish());
        }

        Ok(())
    }
}

/// Joins commands into the wire batch, each terminated by `\n`.
fn encode_batch<S: AsRef<str>>(commands: &[S]) -> String {
    let capacity = commands.iter().map(|c| c.as_ref().len() + 1).sum();
    let mut batch = String::with_capacity(capacity);
    for command in commands {
        batch.push_str(command.as_ref());
        batch.push('\n');
    }
    batch
}

fn io_fault(operation: &'static str, source: io::Error, millis: u128) -> SessionError {
    if is_timeout_error(&source) {
        SessionError::Timeout { operation, millis }
    } else {
        SessionError::Io { operation, source }
    }
}

impl Parser for Session {
    fn parse_batch(&mut self, commands: &[String]) -> Vec<ParserResponse> {
        self.exchange(commands)
    }
}

impl fmt::Display for Session {
    /// `mha://host:port/`, or `mha://null/` without endpoint.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            None => f.write_str("mha://null/"),
            Some(endpoint) if endpoint.host().contains(':') => {
                write!(f, "mha://[{}]:{}/", endpoint.host(), endpoint.port())
            }
            Some(endpoint) => write!(f, "mha://{}:{}/", endpoint.host(), endpoint.port()),
        }
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.hostname() == other.hostname()
            && self.port() == other.port()
            && self.timeout == other.timeout
    }
}

impl Eq for Session {}

impl Hash for Session {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hostname().hash(state);
        self.port().hash(state);
        self.timeout.hash(state);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
