//! Named boolean conditions owned by the lifecycle sidecar.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A boolean attribute of the managed game server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Condition {
    /// The server has no capacity for further players.
    Filled,
    /// The server should receive no new allocations and drain.
    Retired,
    /// At least one player is connected.
    HasPlayer,
    /// No player is connected.
    HasNoPlayer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(Condition::HasNoPlayer.to_string(), "has_no_player");
        assert_eq!(
            serde_json::to_string(&Condition::Filled).ok().as_deref(),
            Some("\"filled\"")
        );
    }
}
