//! Plain records exchanged with the persistence layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ActivityId, Timestamp};

/// A priority value that takes effect at `at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityChange {
    pub at: Timestamp,
    pub value: f64,
}

impl PriorityChange {
    #[must_use]
    pub const fn new(at: Timestamp, value: f64) -> Self {
        Self { at, value }
    }
}

/// Raw persisted state of one activity.
///
/// Derived series are not stored; they are rebuilt from the logs when the
/// record is turned back into an [`Activity`](crate::Activity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub created: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<Timestamp>,
    /// Toggle timestamps; an odd count means the activity is running.
    #[serde(default)]
    pub onoff: Vec<Timestamp>,
    pub priority: Vec<PriorityChange>,
    pub archived_stop: Timestamp,
}

/// Everything needed to restore a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// Wall-clock instant of timestamp 0.
    pub start_date: DateTime<Utc>,
    pub activities: Vec<ActivityRecord>,
}

/// A field that was missing or unreadable and got a default value on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub activity: ActivityId,
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "activity {}: field `{}` {}",
            self.activity, self.field, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_omits_absent_finish() {
        let record = ActivityRecord {
            id: ActivityId::new(1),
            name: "write".to_string(),
            comment: String::new(),
            created: 10,
            finished: None,
            onoff: vec![20, 30],
            priority: vec![PriorityChange::new(10, 1.0)],
            archived_stop: 10,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("finished"));
        let parsed: ActivityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn record_json_defaults_comment_and_onoff() {
        let json = r#"{"id":2,"name":"read","created":0,"priority":[{"at":0,"value":2.0}],"archived_stop":0}"#;
        let parsed: ActivityRecord = serde_json::from_str(json).unwrap();
        assert!(parsed.comment.is_empty());
        assert!(parsed.onoff.is_empty());
    }

    #[test]
    fn parse_warning_display() {
        let warning = ParseWarning {
            activity: ActivityId::new(4),
            field: "archived_stop",
            message: "missing, defaulted to creation time".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "activity 4: field `archived_stop` missing, defaulted to creation time"
        );
    }
}
