//! Builders for MHA parser request lines and decoders for structured replies.
//!
//! Every request is a single line of text addressed to a node of the MHA
//! configuration tree:
//!
//! ```text
//! mha.transducers.mhachain.gain.gains?val      read a variable
//! mha.transducers.mhachain.gain.gains=[0 0]    write a variable
//! mha.transducers?entries                      list child nodes
//! ?listid                                      list plug-in IDs
//! ```
//!
//! A request that contained a line break would be split into two commands by
//! the server and produce two prompts, so the builders refuse such input.

use std::fmt;

use thiserror::Error;

/// Errors raised while building a request or decoding a structured reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A path, value or file name contained `\n` or `\r`.
    #[error("request text must be a single line: {0:?}")]
    EmbeddedLineBreak(String),

    /// A `?listid` reply line was not of the form `path = id`.
    #[error("malformed plug-in id line: {0:?}")]
    MalformedIdList(String),

    /// A `?val` reply did not match the syntax of the variable's `?type`.
    #[error("value {text:?} is not a valid {data_type}")]
    MalformedValue { data_type: String, text: String },
}

/// The query operators understood by the MHA parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// `?` – full contents of a node.
    Contents,
    /// `?help` – documentation of a node.
    Help,
    /// `?type` – data type of a variable.
    Type,
    /// `?perm` – `writable` or `monitor`/`const`.
    Perm,
    /// `?val` – current value of a variable.
    Val,
    /// `?range` – accepted value range.
    Range,
    /// `?subst` – variable substitutions applied to a node.
    Subst,
    /// `?entries` – names of the child nodes.
    Entries,
    /// `?listid` – plug-in paths and their IDs.
    ListId,
    /// `?save:<file>` or `?saveshort:<file>` – write node contents to a file
    /// on the server side.
    Save {
        file: String,
        with_comments: bool,
    },
    /// `?savemons:<file>` – write all monitor variables below a node.
    SaveMonitors(String),
    /// `?read:<file>` – load a configuration file into a node.
    Read(String),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Contents => f.write_str("?"),
            Query::Help => f.write_str("?help"),
            Query::Type => f.write_str("?type"),
            Query::Perm => f.write_str("?perm"),
            Query::Val => f.write_str("?val"),
            Query::Range => f.write_str("?range"),
            Query::Subst => f.write_str("?subst"),
            Query::Entries => f.write_str("?entries"),
            Query::ListId => f.write_str("?listid"),
            Query::Save {
                file,
                with_comments: true,
            } => write!(f, "?save:{file}"),
            Query::Save {
                file,
                with_comments: false,
            } => write!(f, "?saveshort:{file}"),
            Query::SaveMonitors(file) => write!(f, "?savemons:{file}"),
            Query::Read(file) => write!(f, "?read:{file}"),
        }
    }
}

/// One request line for the MHA parser.
///
/// Construct through [`Request::query`] or [`Request::set`] so the
/// single-line invariant is checked once; `Display` then renders the exact
/// wire text without the trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    /// `<path><query>`
    Query { path: String, query: Query },
    /// `<path>=<value>`
    Set { path: String, value: String },
}

impl Request {
    /// Builds a query request.  Leading and trailing whitespace of `path` is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::EmbeddedLineBreak`] if the path or a file name
    /// inside `query` spans more than one line.
    pub fn query(path: &str, query: Query) -> Result<Self, CommandError> {
        let path = single_line(path.trim())?;
        match &query {
            Query::Save { file, .. } | Query::SaveMonitors(file) | Query::Read(file) => {
                single_line(file)?;
            }
            _ => {}
        }
        Ok(Request::Query {
            path: path.to_string(),
            query,
        })
    }

    /// Builds an assignment request.  Path and value are trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::EmbeddedLineBreak`] if either part spans more
    /// than one line.
    pub fn set(path: &str, value: &str) -> Result<Self, CommandError> {
        let path = single_line(path.trim())?;
        let value = single_line(value.trim())?;
        Ok(Request::Set {
            path: path.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Query { path, query } => write!(f, "{path}{query}"),
            Request::Set { path, value } => write!(f, "{path}={value}"),
        }
    }
}

fn single_line(text: &str) -> Result<&str, CommandError> {
    if text.contains(['\n', '\r']) {
        return Err(CommandError::EmbeddedLineBreak(text.to_string()));
    }
    Ok(text)
}

// ── Reply decoders ────────────────────────────────────────────────────────────

/// Splits an `?entries` reply such as `[gain overlapadd]` into node names.
pub fn parse_entries(reply: &str) -> Vec<String> {
    reply
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(' ')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// A plug-in path and the ID reported for it by `?listid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginId {
    /// Full configuration path of the plug-in.
    pub path: String,
    /// Plug-in ID (may be empty when none was assigned).
    pub id: String,
}

/// Decodes a `?listid` reply, one `path = id` pair per line, in reply order.
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns [`CommandError::MalformedIdList`] for a line without `=`.
pub fn parse_id_list(reply: &str) -> Result<Vec<PluginId>, CommandError> {
    reply
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (path, id) = line
                .split_once('=')
                .ok_or_else(|| CommandError::MalformedIdList(line.to_string()))?;
            Ok(PluginId {
                path: path.trim().to_string(),
                id: id.trim().to_string(),
            })
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requests_render_parser_operators() {
        let cases = [
            (Query::Contents, "mha.gain?"),
            (Query::Help, "mha.gain?help"),
            (Query::Type, "mha.gain?type"),
            (Query::Perm, "mha.gain?perm"),
            (Query::Val, "mha.gain?val"),
            (Query::Range, "mha.gain?range"),
            (Query::Subst, "mha.gain?subst"),
            (Query::Entries, "mha.gain?entries"),
        ];
        for (query, expected) in cases {
            let request = Request::query("mha.gain", query).expect("valid request");
            assert_eq!(request.to_string(), expected);
        }
    }

    #[test]
    fn test_file_queries_render_file_name_verbatim() {
        // Arrange
        let save = Query::Save {
            file: "cfg.cfg".to_string(),
            with_comments: true,
        };
        let save_short = Query::Save {
            file: "cfg.cfg".to_string(),
            with_comments: false,
        };

        // Act / Assert
        assert_eq!(Request::query("mha", save).unwrap().to_string(), "mha?save:cfg.cfg");
        assert_eq!(
            Request::query("mha", save_short).unwrap().to_string(),
            "mha?saveshort:cfg.cfg"
        );
        assert_eq!(
            Request::query("", Query::SaveMonitors("mons.txt".into())).unwrap().to_string(),
            "?savemons:mons.txt"
        );
        assert_eq!(
            Request::query("mha", Query::Read("a b.cfg".into())).unwrap().to_string(),
            "mha?read:a b.cfg"
        );
    }

    #[test]
    fn test_listid_without_path_renders_bare_operator() {
        let request = Request::query("", Query::ListId).unwrap();
        assert_eq!(request.to_string(), "?listid");
    }

    #[test]
    fn test_set_request_trims_path_and_value() {
        // Arrange / Act
        let request = Request::set("  mha.gain.gains ", " [1 2 3]\t").unwrap();

        // Assert
        assert_eq!(request.to_string(), "mha.gain.gains=[1 2 3]");
    }

    #[test]
    fn test_line_breaks_are_rejected() {
        assert_eq!(
            Request::set("mha.a", "1\n2"),
            Err(CommandError::EmbeddedLineBreak("1\n2".to_string()))
        );
        assert!(Request::query("mha\r.a", Query::Val).is_err());
        assert!(Request::query("mha", Query::Read("x\ny".into())).is_err());
    }

    #[test]
    fn test_trailing_newline_in_path_is_trimmed_not_rejected() {
        let request = Request::query("mha.gain\n", Query::Val).unwrap();
        assert_eq!(request.to_string(), "mha.gain?val");
    }

    // ── parse_entries ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_entries_splits_bracketed_list() {
        assert_eq!(
            parse_entries("[gain overlapadd altconfig]"),
            vec!["gain", "overlapadd", "altconfig"]
        );
    }

    #[test]
    fn test_parse_entries_of_empty_list_is_empty() {
        assert!(parse_entries("[]").is_empty());
        assert!(parse_entries("").is_empty());
    }

    // ── parse_id_list ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_id_list_keeps_reply_order() {
        // Arrange
        let reply = "mha.transducers.mhachain.left = gain\nmha.transducers.mhachain.right = gain\n";

        // Act
        let ids = parse_id_list(reply).expect("well-formed reply");

        // Assert
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].path, "mha.transducers.mhachain.left");
        assert_eq!(ids[0].id, "gain");
        assert_eq!(ids[1].path, "mha.transducers.mhachain.right");
    }

    #[test]
    fn test_parse_id_list_rejects_line_without_separator() {
        let result = parse_id_list("mha.a = x\ngarbage");
        assert_eq!(result, Err(CommandError::MalformedIdList("garbage".to_string())));
    }

    #[test]
    fn test_parse_id_list_accepts_empty_id_after_trim() {
        let ids = parse_id_list("mha.a = gain\nmha.b =").unwrap();
        assert_eq!(ids[1].path, "mha.b");
        assert_eq!(ids[1].id, "");
    }
}
