//! Implementation of the `tacma export` command.
//!
//! Prints the complete tracker state in the same shape it is stored in, so
//! the output can be inspected or fed to other tools.

use std::io::Write;

use anyhow::Result;
use tacma_core::Tracker;

pub fn run<W: Write>(writer: &mut W, tracker: &Tracker) -> Result<()> {
    let snapshot = tracker.snapshot();
    tracing::debug!(activities = snapshot.activities.len(), "exporting");
    writeln!(writer, "{}", serde_json::to_string_pretty(&snapshot)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tacma_core::{ManualClock, TrackerConfig, TrackerSnapshot};

    use super::*;

    #[test]
    fn export_parses_back_into_a_snapshot() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 9, 0, 0).single().unwrap());
        let mut tracker = Tracker::new(TrackerConfig::default(), clock.clone());
        let id = tracker.add_activity("write", 2.0, "notes").unwrap();
        tracker.turn_on(id).unwrap();
        clock.advance(120);
        tracker.turn_off();

        let mut output = Vec::new();
        run(&mut output, &tracker).unwrap();

        let parsed: TrackerSnapshot = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed, tracker.snapshot());
        assert_eq!(parsed.activities[0].onoff, vec![0, 120]);
    }
}
