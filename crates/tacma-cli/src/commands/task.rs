//! Commands that create and edit tasks.

use std::io::Write;

use anyhow::Result;
use tacma_core::{Activity, ActivityId, Tracker};

use super::util::validate_priority;

pub fn add<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    name: &str,
    priority: f64,
    comment: &str,
) -> Result<ActivityId> {
    let priority = validate_priority(priority)?;
    if name.trim().is_empty() {
        anyhow::bail!("Task name cannot be empty");
    }
    let id = tracker.add_activity(name.trim(), priority, comment)?;
    writeln!(writer, "Added task {id}: {}", name.trim())?;
    Ok(id)
}

pub fn start<W: Write>(writer: &mut W, tracker: &mut Tracker, id: ActivityId) -> Result<()> {
    let previous = tracker.active().map(Activity::id);
    tracker.turn_on(id)?;
    let name = tracker.activity(id)?.name();
    match previous {
        Some(prev) if prev != id => writeln!(writer, "Switched from task {prev} to {id}: {name}")?,
        Some(_) => writeln!(writer, "Task {id} is already running: {name}")?,
        None => writeln!(writer, "Started task {id}: {name}")?,
    }
    Ok(())
}

pub fn stop<W: Write>(writer: &mut W, tracker: &mut Tracker) -> Result<()> {
    match tracker.turn_off() {
        Some(id) => writeln!(writer, "Stopped task {id}: {}", tracker.activity(id)?.name())?,
        None => writeln!(writer, "Nothing is running.")?,
    }
    Ok(())
}

pub fn set_priority<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    value: f64,
) -> Result<()> {
    let value = validate_priority(value)?;
    tracker.change_priority(id, value)?;
    writeln!(writer, "Task {id} priority is now {value}")?;
    Ok(())
}

pub fn rename<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    name: &str,
) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Task name cannot be empty");
    }
    tracker.rename(id, name.trim())?;
    writeln!(writer, "Renamed task {id} to {}", name.trim())?;
    Ok(())
}

pub fn comment<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    text: &str,
) -> Result<()> {
    tracker.set_comment(id, text)?;
    writeln!(writer, "Updated comment of task {id}")?;
    Ok(())
}

pub fn finish<W: Write>(writer: &mut W, tracker: &mut Tracker, id: ActivityId) -> Result<()> {
    tracker.finish(id)?;
    writeln!(writer, "Finished task {id}: {}", tracker.activity(id)?.name())?;
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, tracker: &mut Tracker, id: ActivityId) -> Result<()> {
    let removed = tracker.remove(id)?;
    writeln!(writer, "Removed task {id}: {}", removed.name())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use tacma_core::{CoreError, ManualClock, TrackerConfig};

    use super::*;

    fn tracker() -> (Tracker, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 9, 0, 0).single().unwrap());
        (Tracker::new(TrackerConfig::default(), clock.clone()), clock)
    }

    #[test]
    fn task_lifecycle_messages() {
        let (mut tracker, clock) = tracker();
        let mut output = Vec::new();

        let a = add(&mut output, &mut tracker, " write ", 2.0, "draft").unwrap();
        let b = add(&mut output, &mut tracker, "read", 1.0, "").unwrap();
        start(&mut output, &mut tracker, a).unwrap();
        clock.advance(60);
        start(&mut output, &mut tracker, b).unwrap();
        start(&mut output, &mut tracker, b).unwrap();
        stop(&mut output, &mut tracker).unwrap();
        stop(&mut output, &mut tracker).unwrap();
        set_priority(&mut output, &mut tracker, a, 4.0).unwrap();
        rename(&mut output, &mut tracker, a, "write book").unwrap();
        comment(&mut output, &mut tracker, a, "chapter 2").unwrap();
        finish(&mut output, &mut tracker, b).unwrap();
        remove(&mut output, &mut tracker, b).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @r"
        Added task 0: write
        Added task 1: read
        Started task 0: write
        Switched from task 0 to 1: read
        Task 1 is already running: read
        Stopped task 1: read
        Nothing is running.
        Task 0 priority is now 4
        Renamed task 0 to write book
        Updated comment of task 0
        Finished task 1: read
        Removed task 1: read
        ");
        assert_eq!(tracker.activity(a).unwrap().comment(), "chapter 2");
    }

    #[test]
    fn invalid_input_is_rejected() {
        let (mut tracker, _) = tracker();
        let mut output = Vec::new();

        assert!(add(&mut output, &mut tracker, "  ", 1.0, "").is_err());
        assert!(add(&mut output, &mut tracker, "x", -2.0, "").is_err());
        let id = add(&mut output, &mut tracker, "x", 1.0, "").unwrap();
        assert!(set_priority(&mut output, &mut tracker, id, f64::INFINITY).is_err());

        let err = start(&mut output, &mut tracker, ActivityId::new(9)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CoreError>(),
            Some(&CoreError::NotFound(ActivityId::new(9)))
        );
    }
}
