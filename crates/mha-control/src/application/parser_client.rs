//! ParserClient: typed access to the MHA configuration tree.
//!
//! The use case sits at the application layer and talks to the server through
//! the [`Parser`] trait.  The TCP implementation is
//! [`Session`](crate::infrastructure::network::Session); tests substitute an
//! in-memory parser.
//!
//! Every helper apart from `get_val` sends exactly one request line and
//! converts a failure prompt into [`ClientError::Rejected`], so callers can
//! use `?` instead of checking `is_success()` on every response.

use mha_core::protocol::command::{parse_entries, parse_id_list, PluginId};
use mha_core::{CommandError, MhaValue, ParserResponse, Query, Request};
use thiserror::Error;
use tracing::debug;

/// Error type for typed parser requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be built or its reply could not be decoded.
    #[error("invalid request or reply: {0}")]
    Command(#[from] CommandError),

    /// The server answered with the failure prompt.
    #[error("MHA rejected `{command}`: {message}")]
    Rejected { command: String, message: String },
}

/// Anything that can answer MHA parser commands.
pub trait Parser {
    /// Sends `commands` as one batch and returns exactly one response per
    /// command, in order.
    fn parse_batch(&mut self, commands: &[String]) -> Vec<ParserResponse>;

    /// Sends a single command and returns its response.
    fn parse(&mut self, command: &str) -> ParserResponse {
        self.parse_batch(&[command.to_string()])
            .into_iter()
            .next()
            .unwrap_or_else(|| ParserResponse::failure("parser returned no response"))
    }
}

/// Typed front door to a [`Parser`].
#[derive(Debug)]
pub struct ParserClient<P> {
    parser: P,
}

impl<P: Parser> ParserClient<P> {
    /// Wraps `parser`.
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// Shared access to the underlying parser.
    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Mutable access to the underlying parser, e.g. to reconnect a session.
    pub fn parser_mut(&mut self) -> &mut P {
        &mut self.parser
    }

    /// Unwraps the client.
    pub fn into_inner(self) -> P {
        self.parser
    }

    /// Sends one request and returns the trimmed reply text.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] if the server answers with the
    /// failure prompt (including failures synthesized for I/O faults).
    pub fn request(&mut self, request: &Request) -> Result<String, ClientError> {
        let command = request.to_string();
        let response = self.parser.parse(&command);
        into_reply(command, &response)
    }

    /// Sends several requests in one batch and returns the raw responses.
    ///
    /// Failure prompts are not converted into errors here; inspect each
    /// response individually.
    pub fn batch(&mut self, requests: &[Request]) -> Vec<ParserResponse> {
        let commands: Vec<String> = requests.iter().map(Request::to_string).collect();
        debug!("sending batch of {} request(s)", commands.len());
        self.parser.parse_batch(&commands)
    }

    fn query(&mut self, path: &str, query: Query) -> Result<String, ClientError> {
        let request = Request::query(path, query)?;
        self.request(&request)
    }

    /// Full contents of the node at `path` (`?`).
    pub fn contents(&mut self, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Contents)
    }

    /// Documentation of the node at `path` (`?help`).
    pub fn help(&mut self, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Help)
    }

    /// Data type of the variable at `path` (`?type`), e.g. `vector<float>`.
    pub fn type_of(&mut self, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Type)
    }

    /// Whether the variable at `path` may be written (`?perm`).
    pub fn is_writable(&mut self, path: &str) -> Result<bool, ClientError> {
        Ok(self.query(path, Query::Perm)? == "writable")
    }

    /// Current value of the variable at `path` as the server prints it.
    pub fn get_val_raw(&mut self, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Val)
    }

    /// Assigns `value`, already in MHA syntax, to the variable at `path`.
    pub fn set_val_raw(&mut self, path: &str, value: &str) -> Result<String, ClientError> {
        let request = Request::set(path, value)?;
        self.request(&request)
    }

    /// Current value of the variable at `path`, decoded according to its
    /// `?type`.
    ///
    /// Sends two requests: `?type` and then `?val`.
    pub fn get_val(&mut self, path: &str) -> Result<MhaValue, ClientError> {
        let data_type = self.type_of(path)?;
        let text = self.get_val_raw(path)?;
        Ok(MhaValue::parse(&data_type, &text)?)
    }

    /// Assigns a typed value to the variable at `path`.
    pub fn set_val(&mut self, path: &str, value: &MhaValue) -> Result<String, ClientError> {
        self.set_val_raw(path, &value.to_string())
    }

    /// Accepted value range of the variable at `path` (`?range`).
    pub fn range(&mut self, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Range)
    }

    /// Variable substitutions applied to the node at `path` (`?subst`).
    pub fn substitutions(&mut self, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Subst)
    }

    /// Names of the child nodes of `path` (`?entries`).
    pub fn entries(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        Ok(parse_entries(&self.query(path, Query::Entries)?))
    }

    /// All plug-in paths with their IDs (`?listid`).
    pub fn list_ids(&mut self) -> Result<Vec<PluginId>, ClientError> {
        Ok(parse_id_list(&self.query("", Query::ListId)?)?)
    }

    /// Paths of all plug-ins whose ID equals `plugin_id`.
    pub fn find_id(&mut self, plugin_id: &str) -> Result<Vec<String>, ClientError> {
        Ok(self
            .list_ids()?
            .into_iter()
            .filter(|entry| entry.id == plugin_id)
            .map(|entry| entry.path)
            .collect())
    }

    /// Saves the node at `path` into `file` on the server side, with or
    /// without comments.
    pub fn save_node(
        &mut self,
        file: &str,
        path: &str,
        with_comments: bool,
    ) -> Result<String, ClientError> {
        self.query(
            path,
            Query::Save {
                file: file.to_string(),
                with_comments,
            },
        )
    }

    /// Saves all monitor variables below `path` into `file` on the server.
    pub fn save_monitor_vars(&mut self, file: &str, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::SaveMonitors(file.to_string()))
    }

    /// Reads the configuration `file` into the node at `path`.
    pub fn read_cfg(&mut self, file: &str, path: &str) -> Result<String, ClientError> {
        self.query(path, Query::Read(file.to_string()))
    }
}

fn into_reply(command: String, response: &ParserResponse) -> Result<String, ClientError> {
    let text = response.to_string();
    if response.is_success() {
        Ok(text.trim().to_string())
    } else {
        Err(ClientError::Rejected {
            command,
            message: text,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
