//! Error types for command parsing and connection handling.

use std::io;

use thiserror::Error;

use super::command::Verb;

/// A line that does not form a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ProtocolError {
    /// The line was blank after trimming.
    #[error("empty command")]
    Empty,
    /// The first token is not a known verb.
    #[error("unknown command '{verb}'")]
    UnknownVerb { verb: String },
    /// A verb received the wrong number of arguments.
    #[error("{verb} expects {expected} argument, got {found}")]
    Arity {
        verb: Verb,
        expected: usize,
        found: usize,
    },
}

/// Errors that end a single connection.
#[derive(Debug, Error)]
pub(crate) enum DispatchError {
    /// Reading from or writing to the client failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The client sent a line longer than the limit.
    #[error("command line exceeds {max_bytes} byte limit")]
    LineTooLong { max_bytes: usize },
}
