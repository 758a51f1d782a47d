//! Status command: one row of statistics per task plus a total.
//!
//! Columns follow the tracker's three reporting windows (24 hours, one week,
//! four weeks). The week columns show real time next to the percentage of
//! the time the task's priority entitled it to.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tacma_core::{Activity, ActivityId, ActivityStats, Timestamp, Tracker};

use super::util::{format_duration, parse_tracker_time};

const DAY_SECS: i64 = 24 * 60 * 60;
const WEEK_SECS: i64 = 7 * DAY_SECS;
const FOUR_WEEKS_SECS: i64 = 4 * WEEK_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    On,
    Off,
    Finished,
}

impl State {
    fn of(activity: &Activity) -> Self {
        if activity.is_on() {
            Self::On
        } else if activity.is_alive() {
            Self::Off
        } else {
            Self::Finished
        }
    }

    const fn marker(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "",
            Self::Finished => "done",
        }
    }
}

/// Time due versus time spent in one window.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WindowTime {
    pub must: f64,
    pub real: i64,
}

impl WindowTime {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn display(self) -> String {
        let percent = if self.must > 0.0 {
            (self.real as f64 / self.must * 100.0) as i64
        } else {
            0
        };
        format!("{} / {percent}%", format_duration(self.real))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityStatus {
    pub id: ActivityId,
    pub state: State,
    pub title: String,
    pub priority: f64,
    pub weight: f64,
    pub last_day: i64,
    pub last_week: WindowTime,
    pub last_four_weeks: WindowTime,
    pub last_session: Option<i64>,
    pub idle: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalStatus {
    pub last_day: i64,
    pub last_week: i64,
    pub last_four_weeks: i64,
    /// Shortest idle time; absent while something runs.
    pub idle: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub at: DateTime<Utc>,
    pub activities: Vec<ActivityStatus>,
    pub total: TotalStatus,
}

pub fn run<W: Write>(writer: &mut W, tracker: &Tracker, json: bool, at: Option<&str>) -> Result<()> {
    let at = at.map(|s| parse_tracker_time(tracker, s)).transpose()?;
    let report = build_report(tracker, at)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_table(writer, &report)?;
    }
    Ok(())
}

/// Computes the report at `at`, or now.
///
/// With `at`, every column is read from the history as it stood at that
/// time: tasks created later are left out, and state, priority, last session
/// and idle time come from the logs up to `at`.
#[allow(clippy::cast_possible_truncation)]
pub fn build_report(tracker: &Tracker, at: Option<Timestamp>) -> Result<StatusReport> {
    let end = at.unwrap_or_else(|| tracker.now_secs());
    let past: Vec<Activity>;
    let activities = match at {
        None => tracker.activities(),
        Some(t) => {
            past = tracker.activities().iter().filter_map(|a| a.as_of(t)).collect();
            &past
        }
    };

    let mut rows = Vec::with_capacity(activities.len());
    for activity in activities {
        let id = activity.id();
        let weight = match at {
            None => tracker.weight(id)?,
            Some(t) => tracker.stats().weight_at(id, t),
        };
        let window = |dur| -> Result<WindowTime> {
            Ok(WindowTime {
                must: tracker.must_time(id, dur, Some(end))?,
                real: ActivityStats::real_time(activities, id, dur, end)?,
            })
        };
        rows.push(ActivityStatus {
            id,
            state: State::of(activity),
            title: activity.name().to_string(),
            priority: activity.current_priority(),
            weight,
            last_day: ActivityStats::real_time(activities, id, DAY_SECS, end)?,
            last_week: window(WEEK_SECS)?,
            last_four_weeks: window(FOUR_WEEKS_SECS)?,
            last_session: ActivityStats::last_session(activities, id, end)?,
            idle: activity.last_stop().map(|stop| end - stop),
        });
    }

    let idle = if activities.iter().any(Activity::is_on) {
        None
    } else {
        rows.iter().filter_map(|row| row.idle).min()
    };
    let total = TotalStatus {
        last_day: tracker.total_working_time(DAY_SECS, Some(end)) as i64,
        last_week: tracker.total_working_time(WEEK_SECS, Some(end)) as i64,
        last_four_weeks: tracker.total_working_time(FOUR_WEEKS_SECS, Some(end)) as i64,
        idle,
    };

    Ok(StatusReport {
        at: tracker.to_datetime(end),
        activities: rows,
        total,
    })
}

// ========== Human-Readable Output ==========

fn write_table<W: Write>(writer: &mut W, report: &StatusReport) -> Result<()> {
    if report.activities.is_empty() {
        writeln!(writer, "No tasks yet. Add one with `tacma add <name>`.")?;
        return Ok(());
    }

    write_row(
        writer,
        ["ID", "", "TITLE", "PRIO", "WEIGHT", "24H", "WEEK", "4 WEEKS", "SESSION", "IDLE"],
    )?;
    for row in &report.activities {
        write_row(
            writer,
            [
                &row.id.to_string(),
                row.state.marker(),
                &row.title,
                &row.priority.to_string(),
                &format_weight(row.weight),
                &format_duration(row.last_day),
                &row.last_week.display(),
                &row.last_four_weeks.display(),
                &row.last_session.map_or_else(|| "-".to_string(), format_duration),
                &row.idle.map_or_else(|| "-".to_string(), format_duration),
            ],
        )?;
    }
    let total = &report.total;
    write_row(
        writer,
        [
            "",
            "",
            "TOTAL",
            "",
            "",
            &format_duration(total.last_day),
            &format_duration(total.last_week),
            &format_duration(total.last_four_weeks),
            "",
            &total.idle.map_or_else(String::new, format_duration),
        ],
    )?;
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, cells: [&str; 10]) -> Result<()> {
    let [id, state, title, priority, weight, day, week, four_weeks, session, idle] = cells;
    writeln!(
        writer,
        "{id:<4} {state:<3} {title:<20} {priority:>5} {weight:>6} {day:>8} {week:>13} {four_weeks:>13} {session:>8} {idle:>8}"
    )?;
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn format_weight(weight: f64) -> String {
    format!("{}%", (weight * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use insta::assert_snapshot;
    use tacma_core::{ManualClock, TrackerConfig};

    use super::*;

    /// `write` ran for an hour, then `read` for half an hour; both stopped
    /// ten minutes ago.
    fn tracker() -> Tracker {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 9, 0, 0).single().unwrap());
        let mut tracker = Tracker::new(TrackerConfig::default(), clock.clone());
        let write = tracker.add_activity("write", 1.0, "").unwrap();
        let read = tracker.add_activity("read", 3.0, "").unwrap();
        tracker.turn_on(write).unwrap();
        clock.advance(3_600);
        tracker.turn_on(read).unwrap();
        clock.advance(1_800);
        tracker.turn_off();
        clock.advance(600);
        tracker
    }

    #[test]
    fn status_table_shows_shares_and_totals() {
        let mut output = Vec::new();
        run(&mut output, &tracker(), false, None).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output.trim_end(), @r"
        ID       TITLE                 PRIO WEIGHT      24H          WEEK       4 WEEKS  SESSION     IDLE
        0        write                    1    25%    1h 0m  1h 0m / 266%  1h 0m / 266%        -      40m
        1        read                     3    75%      30m     30m / 44%     30m / 44%      30m      10m
                 TOTAL                               1h 30m        1h 30m        1h 30m               10m
        ");
    }

    #[test]
    fn report_values() {
        let report = build_report(&tracker(), None).unwrap();

        let write = &report.activities[0];
        assert_eq!(write.state, State::Off);
        assert_eq!(write.last_week.real, 3_600);
        assert!((write.last_week.must - 1_350.0).abs() < 1e-9);
        assert_eq!(write.idle, Some(2_400));
        assert_eq!(report.total.last_four_weeks, 5_400);
        assert_eq!(report.total.idle, Some(600));
    }

    #[test]
    fn report_at_earlier_time_moves_windows() {
        let tracker = tracker();
        let report = build_report(&tracker, Some(1_800)).unwrap();

        assert_eq!(report.at, tracker.to_datetime(1_800));
        assert_eq!(report.activities[0].last_day, 1_800);
        assert_eq!(report.activities[1].last_day, 0);
        assert_eq!(report.total.last_day, 1_800);
    }

    #[test]
    fn report_at_earlier_time_uses_past_state() {
        let mut tracker = tracker();
        tracker.add_activity("later", 1.0, "").unwrap();
        let report = build_report(&tracker, Some(1_800)).unwrap();

        assert_eq!(report.activities.len(), 2);
        let write = &report.activities[0];
        assert_eq!(write.state, State::On);
        assert_eq!(write.last_session, Some(1_800));
        assert_eq!(write.idle, None);

        let read = &report.activities[1];
        assert_eq!(read.state, State::Off);
        assert_eq!(read.last_session, None);
        assert_eq!(read.idle, Some(1_800));
        assert_eq!(report.total.idle, None);
    }

    #[test]
    fn running_task_hides_total_idle() {
        let mut tracker = tracker();
        let id = tracker.activities()[0].id();
        tracker.turn_on(id).unwrap();

        let report = build_report(&tracker, None).unwrap();
        assert_eq!(report.activities[0].state, State::On);
        assert_eq!(report.activities[0].idle, None);
        assert_eq!(report.total.idle, None);
    }

    #[test]
    fn json_output_is_parseable() {
        let mut output = Vec::new();
        run(&mut output, &tracker(), true, None).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["activities"][1]["title"], "read");
        assert_eq!(value["activities"][1]["state"], "off");
        assert_eq!(value["total"]["last_day"], 5_400);
    }

    #[test]
    fn empty_tracker_hint() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 9, 0, 0).single().unwrap());
        let tracker = Tracker::new(TrackerConfig::default(), clock);
        let mut output = Vec::new();
        run(&mut output, &tracker, false, None).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @"No tasks yet. Add one with `tacma add <name>`.");
    }
}
