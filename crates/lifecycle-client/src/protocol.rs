//! JSONL message shapes exchanged with the lifecycle sidecar.

use serde::{Deserialize, Serialize};

use crate::Condition;

/// Request sent to the sidecar, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SdkRequest {
    /// Marks the server ready to receive players.
    Ready,
    /// Liveness ping.
    Health,
    /// Sets a named condition.
    SetCondition {
        /// Condition to set.
        condition: Condition,
        /// New value.
        value: bool,
    },
    /// Opens a notification stream on a dedicated connection.
    Watch,
}

impl SdkRequest {
    /// Short operation name used in logs and errors.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Health => "health",
            Self::SetCondition { .. } => "set_condition",
            Self::Watch => "watch",
        }
    }
}

/// Reply to a single [`SdkRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SdkReply {
    /// The request was applied.
    Ok,
    /// The request was refused.
    Error {
        /// Reason reported by the sidecar.
        message: String,
    },
}
