//! Count lifecycle states.

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// The state of a physical count in its review lifecycle.
///
/// State transitions:
/// ```text
/// Draft ──► Submitted ──┬──► Approved
///                       └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CountStatus {
    /// Count is being recorded, lines can be added, edited and removed.
    #[default]
    Draft,

    /// Count is awaiting review.
    Submitted,

    /// Count was accepted and its quantities applied to the catalog (terminal state).
    Approved,

    /// Count was sent back with a reason (terminal state).
    Rejected,
}

impl CountStatus {
    pub const ALL: [CountStatus; 4] = [
        CountStatus::Draft,
        CountStatus::Submitted,
        CountStatus::Approved,
        CountStatus::Rejected,
    ];

    /// Returns true if lines can be added, edited or removed in this state.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, CountStatus::Draft)
    }

    /// Returns true if the count can be submitted in this state.
    pub fn can_submit(&self) -> bool {
        matches!(self, CountStatus::Draft)
    }

    /// Returns true if the count can be approved or rejected in this state.
    pub fn can_review(&self) -> bool {
        matches!(self, CountStatus::Submitted)
    }

    /// Returns true if the count can be deleted in this state.
    pub fn can_delete(&self) -> bool {
        matches!(self, CountStatus::Draft)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, CountStatus::Approved | CountStatus::Rejected)
    }

    /// Returns the state name as stored and sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CountStatus::Draft => "draft",
            CountStatus::Submitted => "submitted",
            CountStatus::Approved => "approved",
            CountStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for CountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CountStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("count status", s))
    }
}
