//! Response framing for the MHA text control protocol.
//!
//! The server answers every command line with zero or more content lines
//! followed by exactly one *prompt* line that says whether the command
//! succeeded:
//!
//! ```text
//! client → server:  mha.transducers.mhachain?entries
//! server → client:  [overlapadd altconfig]
//!                   (MHA:success)
//! ```
//!
//! There is no length prefix.  The only way to know where a response ends is
//! to look at each line as it arrives and compare it with the two prompts.
//! [`ResponseAccumulator`] does exactly that and nothing else, so the network
//! layer can stay a dumb line pump.
//!
//! # State machine
//!
//! ```text
//!            content line (push)
//!              ┌──────┐
//!              ▼      │
//!           [Open] ───┘
//!              │
//!              │ line == success prompt  → Success
//!              │ line == failure prompt  → Failure
//!              ▼
//!         [Complete]  ── any line → ignored
//! ```
//!
//! Matching is exact string equality.  A line such as `(MHA:success) extra`
//! is ordinary content.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Prompt the MHA prints after a command succeeded.
pub const DEFAULT_SUCCESS_PROMPT: &str = "(MHA:success)";

/// Prompt the MHA prints after a command failed.
pub const DEFAULT_FAILURE_PROMPT: &str = "(MHA:failure)";

/// The pair of terminator lines used by one protocol instance.
///
/// Prompts belong to the connection, not to an individual response, so a
/// single `Prompts` value is shared by every accumulator created for that
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prompts {
    /// Line that completes a response with `success = true`.
    #[serde(default = "default_success")]
    pub success: String,
    /// Line that completes a response with `success = false`.
    #[serde(default = "default_failure")]
    pub failure: String,
}

fn default_success() -> String {
    DEFAULT_SUCCESS_PROMPT.to_string()
}

fn default_failure() -> String {
    DEFAULT_FAILURE_PROMPT.to_string()
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            success: default_success(),
            failure: default_failure(),
        }
    }
}

impl Prompts {
    /// Creates a prompt pair from custom terminator lines (without newline).
    pub fn new(success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            success: success.into(),
            failure: failure.into(),
        }
    }

    /// Returns the status a line terminates a response with, if it is a prompt.
    ///
    /// The success prompt is checked first, so if both prompts are configured
    /// to the same text the line counts as success.
    pub fn classify(&self, line: &str) -> Option<ResponseStatus> {
        if line == self.success {
            Some(ResponseStatus::Success)
        } else if line == self.failure {
            Some(ResponseStatus::Failure)
        } else {
            None
        }
    }
}

/// Completion state of a [`ParserResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseStatus {
    /// No prompt seen yet; more lines are expected.
    #[default]
    Open,
    /// Terminated by the success prompt.
    Success,
    /// Terminated by the failure prompt.
    Failure,
}

/// The server's answer to a single command.
///
/// Holds the content lines in arrival order, without line terminators and
/// without the closing prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParserResponse {
    lines: Vec<String>,
    status: ResponseStatus,
}

impl ParserResponse {
    /// Creates an empty, open response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a completed failure response carrying `description` as its
    /// only content line.
    ///
    /// Used by the network layer when a command never received a real answer
    /// because the connection failed or timed out.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            lines: vec![description.into()],
            status: ResponseStatus::Failure,
        }
    }

    /// Content lines received so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consumes the response and returns its content lines.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Current completion state.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// `true` once a prompt line has been seen.
    pub fn is_complete(&self) -> bool {
        self.status != ResponseStatus::Open
    }

    /// `true` only if the response was closed by the success prompt.
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

impl fmt::Display for ParserResponse {
    /// Joins the content lines with `\n`.  The last line carries no line
    /// terminator; trailing `\n` / `\r` characters are stripped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.lines.join("\n");
        f.write_str(joined.trim_end_matches(&['\n', '\r'][..]))
    }
}

/// Incrementally assembles one [`ParserResponse`] from inbound lines.
#[derive(Debug, Clone)]
pub struct ResponseAccumulator<'p> {
    prompts: &'p Prompts,
    response: ParserResponse,
}

impl<'p> ResponseAccumulator<'p> {
    /// Creates an open accumulator that terminates on `prompts`.
    pub fn new(prompts: &'p Prompts) -> Self {
        Self {
            prompts,
            response: ParserResponse::new(),
        }
    }

    /// Feeds the next line (without its line terminator).
    ///
    /// Returns `true` while the response is still open, i.e. while the caller
    /// should keep reading.  Once a prompt has been seen every further call
    /// returns `false` and leaves the response untouched.
    pub fn append_line(&mut self, line: &str) -> bool {
        if self.response.is_complete() {
            trace!("ignoring line after prompt: {line:?}");
            return false;
        }
        match self.prompts.classify(line) {
            Some(status) => {
                trace!("response complete: {status:?}");
                self.response.status = status;
                false
            }
            None => {
                self.response.lines.push(line.to_string());
                true
            }
        }
    }

    /// `true` once a prompt has been seen.
    pub fn is_complete(&self) -> bool {
        self.response.is_complete()
    }

    /// Read-only view of the response assembled so far.
    pub fn response(&self) -> &ParserResponse {
        &self.response
    }

    /// Returns the accumulator to its initial open, empty state.
    pub fn reset(&mut self) {
        self.response = ParserResponse::new();
    }

    /// Consumes the accumulator and returns the assembled response.
    pub fn finish(self) -> ParserResponse {
        self.response
    }
}

impl fmt::Display for ResponseAccumulator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.response, f)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
