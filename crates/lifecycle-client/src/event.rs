//! External state notifications delivered by a watch subscription.

use serde::{Deserialize, Serialize};

/// Constraint kind signalling the server was taken out of service.
pub const NOT_IN_SERVICE: &str = "NotInService";

/// A constraint the control plane currently applies to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint kind, for example [`NOT_IN_SERVICE`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the constraint is in force.
    #[serde(default)]
    pub effective: bool,
    /// Optional human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Constraint {
    /// Builds a constraint of the given kind.
    #[must_use]
    pub fn new(kind: impl Into<String>, effective: bool) -> Self {
        Self {
            kind: kind.into(),
            effective,
            message: None,
        }
    }
}

/// One watch notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent {
    /// Constraints applied at the time of the notification.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl StateEvent {
    /// Builds an event carrying the given constraints.
    #[must_use]
    pub fn with_constraints(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Returns true when an effective [`NOT_IN_SERVICE`] constraint is present.
    #[must_use]
    pub fn is_out_of_service(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| constraint.effective && constraint.kind == NOT_IN_SERVICE)
    }
}
