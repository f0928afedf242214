//! Parsing of single-line text commands.

use strum::{Display, EnumString};

use lifecycle_client::Condition;

use super::errors::ProtocolError;

/// Argument value that maps to `true`; anything else is `false`.
const TRUTHY: &str = "TRUE";

/// Command verbs, matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub(crate) enum Verb {
    Filled,
    Retired,
    HasPlayer,
    HasNoPlayer,
    Unhealthy,
    Exit,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    SetCondition {
        verb: Verb,
        condition: Condition,
        value: bool,
    },
    Unhealthy,
    Exit,
    Version,
}

/// Parses one line into a command.
///
/// Tokens are separated by single spaces, so repeated spaces produce empty
/// arguments that count toward arity. Verbs without arguments ignore any
/// trailing tokens.
pub(crate) fn parse(line: &str) -> Result<Command, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let mut tokens = trimmed.split(' ');
    let head = tokens.next().unwrap_or_default();
    let arguments: Vec<&str> = tokens.collect();
    let verb: Verb = head.parse().map_err(|_| ProtocolError::UnknownVerb {
        verb: head.to_owned(),
    })?;

    match verb {
        Verb::Filled => set_condition(verb, Condition::Filled, &arguments),
        Verb::Retired => set_condition(verb, Condition::Retired, &arguments),
        Verb::HasPlayer => set_condition(verb, Condition::HasPlayer, &arguments),
        Verb::HasNoPlayer => set_condition(verb, Condition::HasNoPlayer, &arguments),
        Verb::Unhealthy => Ok(Command::Unhealthy),
        Verb::Exit => Ok(Command::Exit),
        Verb::Version => Ok(Command::Version),
    }
}

fn set_condition(
    verb: Verb,
    condition: Condition,
    arguments: &[&str],
) -> Result<Command, ProtocolError> {
    match arguments {
        [argument] => Ok(Command::SetCondition {
            verb,
            condition,
            value: *argument == TRUTHY,
        }),
        _ => Err(ProtocolError::Arity {
            verb,
            expected: 1,
            found: arguments.len(),
        }),
    }
}
