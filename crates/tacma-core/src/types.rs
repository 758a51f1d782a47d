//! Core type definitions and errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds since the tracker's time origin.
pub type Timestamp = i64;

/// Errors raised by activity and tracker operations.
///
/// Degenerate inputs (empty logs, empty ranges, zero-sum priorities) are not
/// errors; they evaluate to zero or no-ops.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// No activity has this identifier.
    #[error("activity {0} was not found")]
    NotFound(ActivityId),

    /// The activity is finished and no longer accepts priority changes.
    #[error("activity {0} is finished")]
    Finished(ActivityId),

    /// Priorities must be finite and non-negative.
    #[error("invalid priority {value} for activity {id}")]
    InvalidPriority { id: ActivityId, value: f64 },

    /// A manual log edit was rejected.
    #[error("invalid edit of activity {id}: {reason}")]
    InvalidEdit { id: ActivityId, reason: String },

    /// A persisted record cannot be turned into an activity.
    #[error("corrupt record for activity {id}: {reason}")]
    CorruptRecord { id: ActivityId, reason: String },
}

/// Identifier of an activity, unique within a tracker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActivityId(u32);

impl ActivityId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ActivityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for ActivityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_id_parses_and_displays() {
        let id: ActivityId = " 42 ".parse().unwrap();
        assert_eq!(id, ActivityId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<ActivityId>().is_err());
    }

    #[test]
    fn activity_id_serde_is_transparent() {
        let json = serde_json::to_string(&ActivityId::new(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: ActivityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.value(), 7);
    }

    #[test]
    fn error_messages_name_the_activity() {
        assert_eq!(
            CoreError::NotFound(ActivityId::new(3)).to_string(),
            "activity 3 was not found"
        );
        assert_eq!(
            CoreError::Finished(ActivityId::new(1)).to_string(),
            "activity 1 is finished"
        );
    }
}
