//! Priority history commands.
//!
//! `set` replaces the whole history in one edit, the way a user would correct
//! a mistyped priority after the fact.

use std::io::Write;

use anyhow::{Context, Result};
use tacma_core::{ActivityId, PriorityChange, Tracker};

use super::util::{format_time, parse_tracker_time, validate_priority};

pub fn list<W: Write>(writer: &mut W, tracker: &Tracker, id: ActivityId) -> Result<()> {
    let activity = tracker.activity(id)?;
    writeln!(writer, "Priority history of task {id}: {}", activity.name())?;
    for change in activity.priority_log() {
        writeln!(writer, "  {}  {}", format_time(tracker, change.at), change.value)?;
    }
    Ok(())
}

pub fn set<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    changes: &[String],
) -> Result<()> {
    let log = changes
        .iter()
        .map(|change| parse_change(&*tracker, change))
        .collect::<Result<Vec<_>>>()?;
    let count = log.len();
    tracker.reset_priority(id, log)?;
    writeln!(writer, "Replaced priority history of task {id} ({count} changes)")?;
    Ok(())
}

/// Parses `TIME=PRIORITY`.
fn parse_change(tracker: &Tracker, s: &str) -> Result<PriorityChange> {
    let Some((time, value)) = s.rsplit_once('=') else {
        anyhow::bail!("Invalid priority change: {s}. Use TIME=PRIORITY (e.g., '2 hours ago=3')");
    };
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid priority in {s}"))?;
    let value = validate_priority(value)?;
    Ok(PriorityChange::new(parse_tracker_time(tracker, time.trim())?, value))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use tacma_core::{CoreError, ManualClock, TrackerConfig};

    use super::*;

    /// A task created at 09:00 and a clock three hours later.
    fn tracker() -> (Tracker, ActivityId) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 9, 0, 0).single().unwrap());
        let mut tracker = Tracker::new(TrackerConfig::default(), clock.clone());
        let id = tracker.add_activity("write", 1.0, "").unwrap();
        clock.advance(3 * 3_600);
        (tracker, id)
    }

    #[test]
    fn set_and_list_priority_history() {
        let (mut tracker, id) = tracker();
        let other = tracker.add_activity("read", 1.0, "").unwrap();
        let mut output = Vec::new();

        set(
            &mut output,
            &mut tracker,
            id,
            &["2025-05-05T09:00:00Z=1".to_string(), "2 hours ago = 3".to_string()],
        )
        .unwrap();
        list(&mut output, &tracker, id).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @r"
        Replaced priority history of task 0 (2 changes)
          2025-05-05 09:00:00  1
          2025-05-05 10:00:00  3
        ");
        assert!((tracker.stats().weight_at(id, 3_600) - 1.0).abs() < 1e-9);
        assert!((tracker.weight(id).unwrap() - 0.75).abs() < 1e-9);
        assert!((tracker.weight(other).unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn malformed_changes_are_rejected() {
        let (mut tracker, id) = tracker();
        let mut output = Vec::new();

        assert!(set(&mut output, &mut tracker, id, &["3".to_string()]).is_err());
        assert!(set(&mut output, &mut tracker, id, &["1 hour ago=x".to_string()]).is_err());
        assert!(set(&mut output, &mut tracker, id, &["1 hour ago=-2".to_string()]).is_err());
        assert!(set(&mut output, &mut tracker, id, &[]).is_err());
        assert!(output.is_empty());
        assert_eq!(tracker.activity(id).unwrap().priority_log().len(), 1);
    }

    #[test]
    fn finished_task_history_is_read_only() {
        let (mut tracker, id) = tracker();
        tracker.finish(id).unwrap();
        let mut output = Vec::new();

        let err = set(&mut output, &mut tracker, id, &["1 hour ago=2".to_string()]).unwrap_err();
        assert_eq!(err.downcast_ref::<CoreError>(), Some(&CoreError::Finished(id)));
    }
}
