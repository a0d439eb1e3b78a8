//! Integration tests for the TCP session against an in-process fake MHA.
//!
//! # Purpose
//!
//! These tests drive [`Session`] and [`ParserClient`] through their public
//! API over real loopback sockets.  They verify:
//!
//! - The happy path: a batch of commands is answered in order, one response
//!   per command.
//! - Partial failure: when the server stops mid-batch, the completed
//!   responses are kept and the rest are synthesized failures.
//! - Timeouts: a server that never sends the prompt produces a failure
//!   response that names the timeout.
//! - Reconnects: switching the endpoint closes the previous socket first,
//!   and a name that cannot be resolved leaves the current connection alone.
//!
//! # The fake server
//!
//! ```text
//! Session                              FakeMha thread
//! ───────                              ──────────────
//! exchange(["a?val", "b=1"])
//!   write "a?val\nb=1\n"   ──────────▶ read line "a?val" → answer(..)
//!                          ◀────────── "<lines>\n(MHA:success)\n"
//!                                      read line "b=1"   → answer(..)
//!                          ◀────────── "(MHA:success)\n"
//! ```
//!
//! Each fake accepts exactly one connection, answers every line with the
//! closure it was given and reports the received commands when the client
//! hangs up.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mha_control::infrastructure::storage::config::ControlConfig;
use mha_control::{ClientError, Parser, ParserClient, Session};
use tracing_subscriber::EnvFilter;

/// Routes session logs to the test output; `RUST_LOG=debug` shows the
/// connection lifecycle of a failing test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ── Fake server ───────────────────────────────────────────────────────────────

/// What the fake sends back for one command line.
enum Reply {
    /// Content lines followed by the success prompt.
    Success(Vec<String>),
    /// Content lines followed by the failure prompt.
    Failure(Vec<String>),
    /// Close the connection without answering.
    Hangup,
    /// Keep the connection open but never answer.
    Silence,
}

struct FakeMha {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl FakeMha {
    /// Starts a fake that answers each received line with `answer(line)`.
    fn start<F>(answer: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            serve(stream, answer)
        });
        Self { port, handle }
    }

    /// Waits until the client has disconnected and returns the commands the
    /// fake received.
    fn commands(self) -> Vec<String> {
        self.handle.join().expect("fake server panicked")
    }
}

fn serve<F>(stream: TcpStream, answer: F) -> Vec<String>
where
    F: Fn(&str) -> Reply,
{
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut received = Vec::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return received,
            Ok(_) => {}
        }
        let command = line.trim_end().to_string();
        let reply = answer(&command);
        received.push(command);

        let (lines, prompt) = match reply {
            Reply::Success(lines) => (lines, "(MHA:success)"),
            Reply::Failure(lines) => (lines, "(MHA:failure)"),
            Reply::Hangup => return received,
            Reply::Silence => continue,
        };
        let mut text = String::new();
        for content in lines {
            text.push_str(&content);
            text.push('\n');
        }
        text.push_str(prompt);
        text.push('\n');
        if writer.write_all(text.as_bytes()).is_err() {
            return received;
        }
    }
}

fn connected_session(port: u16) -> Session {
    init_tracing();
    let mut session = Session::new();
    assert!(session.set_endpoint("127.0.0.1", port), "connect to fake MHA");
    session
}

// ── Exchange ──────────────────────────────────────────────────────────────────

#[test]
fn test_batch_is_answered_in_submission_order() {
    // Arrange
    let fake = FakeMha::start(|command| match command {
        "mha?" => Reply::Success(vec!["foo".into(), "bar".into()]),
        "mha.nope?val" => Reply::Failure(vec!["Error: no such variable".into()]),
        _ => Reply::Success(Vec::new()),
    });
    let mut session = connected_session(fake.port);

    // Act
    let responses = session.exchange(&["mha?", "mha.nope?val", "mha.gain=1"]);
    session.disconnect();

    // Assert
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].lines(), ["foo", "bar"]);
    assert!(responses[0].is_success());
    assert_eq!(responses[1].lines(), ["Error: no such variable"]);
    assert!(responses[1].is_complete());
    assert!(!responses[1].is_success());
    assert!(responses[2].lines().is_empty());
    assert!(responses[2].is_success());
    assert_eq!(fake.commands(), vec!["mha?", "mha.nope?val", "mha.gain=1"]);
}

#[test]
fn test_stream_failure_after_first_response_synthesizes_remaining_failures() {
    // Arrange: answer the first command, then drop the connection.
    let fake = FakeMha::start(|command| match command {
        "a?val" => Reply::Success(vec!["[1 2 3]".into()]),
        _ => Reply::Hangup,
    });
    let mut session = connected_session(fake.port);

    // Act
    let responses = session.exchange(&["a?val", "b?val", "c?val"]);

    // Assert
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].to_string(), "[1 2 3]");
    assert!(responses[0].is_success());
    for synthesized in &responses[1..] {
        assert!(synthesized.is_complete());
        assert!(!synthesized.is_success());
        assert_eq!(synthesized.lines().len(), 1);
        assert!(!synthesized.lines()[0].is_empty());
    }
    assert_eq!(responses[1], responses[2]);
    assert!(!session.is_connected());
    fake.commands();
}

#[test]
fn test_missing_prompt_times_out_into_failure_response() {
    // Arrange: the fake swallows the command and never answers.  It stays
    // connected until the test tells it to stop.
    init_tracing();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let fake = FakeMha::start(move |_| {
        let _ = stop_rx.recv_timeout(Duration::from_secs(5));
        Reply::Silence
    });
    let mut session = Session::new();
    session.set_timeout(Duration::from_millis(200));
    assert!(session.set_endpoint("127.0.0.1", fake.port));

    // Act
    let responses = session.exchange(&["mha?val"]);
    stop_tx.send(()).unwrap();

    // Assert
    assert_eq!(responses.len(), 1);
    assert!(!responses[0].is_success());
    assert!(
        responses[0].to_string().contains("timed out"),
        "unexpected description: {}",
        responses[0]
    );
    assert!(!session.is_connected());
    fake.commands();
}

#[test]
fn test_exchange_after_fault_reports_not_connected_until_reconnect() {
    // Arrange
    let fake = FakeMha::start(|_| Reply::Hangup);
    let mut session = connected_session(fake.port);
    session.exchange(&["x?"]);
    fake.commands();

    // Act
    let responses = session.exchange(&["y?"]);

    // Assert
    assert_eq!(responses[0].lines(), ["not connected to an MHA server"]);
    assert!(!responses[0].is_success());
    assert_eq!(session.hostname(), Some("127.0.0.1"), "endpoint survives a fault");
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[test]
fn test_set_endpoint_closes_previous_connection_before_switching() {
    // Arrange
    let first = FakeMha::start(|_| Reply::Success(vec!["first".into()]));
    let second = FakeMha::start(|_| Reply::Success(vec!["second".into()]));
    let mut session = connected_session(first.port);

    // Act
    assert!(session.set_endpoint("127.0.0.1", second.port));

    // Assert: the first fake saw end-of-stream, so its thread has returned.
    assert!(first.commands().is_empty());
    assert_eq!(session.port(), Some(second.port));
    assert_eq!(session.parse("mha?").lines(), ["second"]);
    session.disconnect();
    assert_eq!(second.commands(), vec!["mha?"]);
}

#[test]
fn test_unresolvable_host_keeps_current_connection() {
    // Arrange
    let fake = FakeMha::start(|_| Reply::Success(vec!["still here".into()]));
    let mut session = connected_session(fake.port);

    // Act
    let switched = session.set_endpoint("host.invalid", 33337);

    // Assert
    assert!(!switched);
    assert!(session.is_connected());
    assert_eq!(session.hostname(), Some("127.0.0.1"));
    assert_eq!(session.parse("mha?").lines(), ["still here"]);
    session.disconnect();
    fake.commands();
}

#[test]
fn test_session_open_connects_to_configured_endpoint() {
    // Arrange
    let fake = FakeMha::start(|_| Reply::Success(vec!["ok".into()]));
    let mut config = ControlConfig::default();
    config.connection.host = "127.0.0.1".to_string();
    config.connection.port = fake.port;
    config.connection.timeout_ms = 1000;

    // Act
    let mut session = Session::open(&config).expect("open");

    // Assert
    assert!(session.is_connected());
    assert_eq!(session.timeout(), Duration::from_millis(1000));
    assert_eq!(session.to_string(), format!("mha://127.0.0.1:{}/", fake.port));
    assert_eq!(session.parse("mha?").to_string(), "ok");
    drop(session);
    fake.commands();
}

// ── ParserClient over TCP ─────────────────────────────────────────────────────

#[test]
fn test_parser_client_reads_and_writes_variables_over_tcp() {
    // Arrange
    let fake = FakeMha::start(|command| match command {
        "mha.gain.gains?val" => Reply::Success(vec!["[0 0]".into()]),
        "mha.gain.gains=[3 3]" => Reply::Success(Vec::new()),
        "?listid" => Reply::Success(vec![
            "mha.chain.gain = gain".into(),
            "mha.chain.lvl = acmon".into(),
        ]),
        "mha.gain.gains=[x]" => Reply::Failure(vec!["Error: invalid value".into()]),
        _ => Reply::Failure(Vec::new()),
    });
    let mut client = ParserClient::new(connected_session(fake.port));

    // Act
    let before = client.get_val_raw("mha.gain.gains").unwrap();
    client.set_val_raw("mha.gain.gains", "[3 3]").unwrap();
    let gain_paths = client.find_id("gain").unwrap();
    let rejected = client.set_val_raw("mha.gain.gains", "[x]");

    // Assert
    assert_eq!(before, "[0 0]");
    assert_eq!(gain_paths, vec!["mha.chain.gain"]);
    match rejected {
        Err(ClientError::Rejected { message, .. }) => {
            assert_eq!(message, "Error: invalid value");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    client.parser_mut().disconnect();
    assert_eq!(
        fake.commands(),
        vec![
            "mha.gain.gains?val",
            "mha.gain.gains=[3 3]",
            "?listid",
            "mha.gain.gains=[x]",
        ]
    );
}
