//! Response lines written back to clients.

use std::fmt;
use std::io::Write;

use super::command::Verb;
use super::errors::{DispatchError, ProtocolError};

/// One newline-terminated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Response {
    /// The command took effect.
    Ack(Verb),
    /// The command failed; `subject` names the verb when one was read.
    Nack {
        subject: Option<String>,
        reason: String,
    },
    /// Bare text, used for `VERSION`.
    Text(String),
}

impl Response {
    pub(crate) fn nack(verb: Verb, reason: impl fmt::Display) -> Self {
        Self::Nack {
            subject: Some(verb.to_string()),
            reason: reason.to_string(),
        }
    }

    /// Reply sent for a protocol error under the reject policy.
    pub(crate) fn rejected(error: &ProtocolError) -> Self {
        match error {
            ProtocolError::Empty => Self::Nack {
                subject: None,
                reason: error.to_string(),
            },
            ProtocolError::UnknownVerb { verb } => Self::Nack {
                subject: Some(verb.clone()),
                reason: "unknown command".to_owned(),
            },
            ProtocolError::Arity {
                verb,
                expected,
                found,
            } => Self::nack(*verb, format!("expected {expected} argument, got {found}")),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack(verb) => write!(f, "ACK: {verb}"),
            Self::Nack {
                subject: Some(subject),
                reason,
            } => write!(f, "NACK: {subject}: {reason}"),
            Self::Nack {
                subject: None,
                reason,
            } => write!(f, "NACK: {reason}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Writes responses as single lines and flushes each one.
pub(crate) struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self { writer }
    }

    pub(crate) fn write(&mut self, response: &Response) -> Result<(), DispatchError> {
        writeln!(self.writer, "{response}")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Response::Ack(Verb::HasNoPlayer), "ACK: HASNOPLAYER\n")]
    #[case(Response::nack(Verb::Filled, "sidecar down"), "NACK: FILLED: sidecar down\n")]
    #[case(Response::rejected(&ProtocolError::Empty), "NACK: empty command\n")]
    #[case(
        Response::rejected(&ProtocolError::UnknownVerb { verb: "JUMP".to_owned() }),
        "NACK: JUMP: unknown command\n"
    )]
    #[case(
        Response::rejected(&ProtocolError::Arity { verb: Verb::Retired, expected: 1, found: 0 }),
        "NACK: RETIRED: expected 1 argument, got 0\n"
    )]
    #[case(Response::Text("1.2.3".to_owned()), "1.2.3\n")]
    fn writes_single_lines(#[case] response: Response, #[case] expected: &str) {
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write(&response)
            .expect("write response");
        assert_eq!(String::from_utf8(output).expect("valid utf8"), expected);
    }
}
