//! Protocol module containing response framing, request builders and typed
//! variable values.

pub mod command;
pub mod response;
pub mod value;

pub use command::{parse_entries, parse_id_list, CommandError, PluginId, Query, Request};
pub use response::{
    ParserResponse, Prompts, ResponseAccumulator, ResponseStatus, DEFAULT_FAILURE_PROMPT,
    DEFAULT_SUCCESS_PROMPT,
};
pub use value::{Complex, MhaValue};
