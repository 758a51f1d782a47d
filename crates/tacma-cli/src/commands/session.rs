//! Session commands for inspecting and correcting a task's toggle log.

use std::io::Write;

use anyhow::Result;
use tacma_core::{ActivityId, Tracker};

use super::util::{format_duration, format_time, parse_tracker_time};

pub fn list<W: Write>(writer: &mut W, tracker: &Tracker, id: ActivityId) -> Result<()> {
    let activity = tracker.activity(id)?;
    writeln!(writer, "Sessions of task {id}: {}", activity.name())?;

    let mut any = false;
    for (index, (start, end)) in activity.sessions().enumerate() {
        any = true;
        writeln!(
            writer,
            "{index:>3}  {}  {}  {:>8}",
            format_time(tracker, start),
            format_time(tracker, end),
            format_duration(end - start)
        )?;
    }
    if let Some(&since) = activity.onoff().last().filter(|_| activity.is_on()) {
        any = true;
        writeln!(
            writer,
            "  *  {}  {:<19}  {:>8}",
            format_time(tracker, since),
            "running",
            format_duration(tracker.now_secs() - since)
        )?;
    }
    if !any {
        writeln!(writer, "No sessions recorded.")?;
    }
    Ok(())
}

pub fn add<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    start: &str,
    end: &str,
) -> Result<()> {
    let start = parse_tracker_time(tracker, start)?;
    let end = parse_tracker_time(tracker, end)?;
    tracker.add_session(id, start, end)?;
    writeln!(
        writer,
        "Added session to task {id}: {} - {}",
        format_time(tracker, start),
        format_time(tracker, end)
    )?;
    Ok(())
}

pub fn remove<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    index: usize,
) -> Result<()> {
    tracker.remove_session(id, index)?;
    writeln!(writer, "Removed session {index} of task {id}")?;
    Ok(())
}

/// Replaces the whole toggle log of a task.
pub fn set<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    id: ActivityId,
    times: &[String],
) -> Result<()> {
    let onoff = times
        .iter()
        .map(|t| parse_tracker_time(&*tracker, t))
        .collect::<Result<Vec<_>>>()?;
    tracker.reset_onoff(id, onoff)?;
    writeln!(writer, "Replaced sessions of task {id}")?;
    Ok(())
}
