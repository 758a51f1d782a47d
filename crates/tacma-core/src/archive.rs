//! Splitting old history off the live data.
//!
//! Archiving happens in two steps. [`Tracker::plan_archive`] builds both
//! halves without touching the tracker; the caller persists
//! [`ArchivePlan::archive`] and only then calls [`Tracker::apply_archive`],
//! so a failed write leaves the live data as it was.

use chrono::{DateTime, TimeDelta, Utc};

use crate::activity::Activity;
use crate::event::DataEvent;
use crate::record::TrackerSnapshot;
use crate::tracker::Tracker;
use crate::types::{ActivityId, Timestamp};

pub const WEEK_SECS: i64 = 7 * 24 * 60 * 60;

/// Both halves of an archive split.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    /// Split point, in seconds of the current time origin.
    pub cutoff: Timestamp,
    /// History before the cutoff, on the current time origin.
    pub archive: TrackerSnapshot,
    retained: Vec<Activity>,
    retained_start: DateTime<Utc>,
    restart: Option<(ActivityId, Timestamp)>,
}

impl ArchivePlan {
    /// Activities that stay live, already rebased on the new origin.
    pub fn retained(&self) -> &[Activity] {
        &self.retained
    }

    /// Time origin of the live data once the plan is applied.
    pub const fn retained_start(&self) -> DateTime<Utc> {
        self.retained_start
    }
}

impl Tracker {
    /// Whether the live history has grown past the archive threshold.
    pub fn needs_archive(&self) -> bool {
        self.now_secs() > i64::from(self.config.archive_after_weeks) * WEEK_SECS
    }

    /// Plans a split if the history is old enough.
    pub fn plan_archive(&self) -> Option<ArchivePlan> {
        if !self.needs_archive() {
            return None;
        }
        self.plan_archive_forced()
    }

    /// Plans a split at the usual cutoff regardless of the threshold.
    ///
    /// `None` when there is nothing older than the cutoff.
    pub fn plan_archive_forced(&self) -> Option<ArchivePlan> {
        let now = self.now_secs();
        let cutoff = now - i64::from(self.config.keep_weeks) * WEEK_SECS;
        if cutoff <= 0 {
            return None;
        }

        let mut stopped = self.activities.clone();
        let restart = stopped.iter_mut().find(|a| a.is_on()).map(|running| {
            running.switch(now);
            (running.id(), now - cutoff)
        });

        let archive = TrackerSnapshot {
            start_date: self.start_date,
            activities: stopped
                .iter()
                .filter_map(|a| a.truncated_after(cutoff))
                .map(|a| a.to_record())
                .collect(),
        };

        let retained = stopped
            .iter()
            .filter(|a| a.finished().is_none_or(|finished| finished >= cutoff))
            .map(|a| {
                let mut kept = a.clone();
                if let Some(stop) = a.last_stop() {
                    kept.set_archived_stop(stop);
                }
                kept.delete_before(cutoff);
                kept.shift_time(-cutoff);
                kept
            })
            .collect();

        Some(ArchivePlan {
            cutoff,
            archive,
            retained,
            retained_start: self.start_date + TimeDelta::seconds(cutoff),
            restart,
        })
    }

    /// Replaces the live data with the retained half of `plan`.
    pub fn apply_archive(&mut self, plan: ArchivePlan) {
        let archived = plan.archive.activities.len();
        self.activities = plan.retained;
        self.start_date = plan.retained_start;
        if let Some((id, at)) = plan.restart {
            if let Some(activity) = self.activities.iter_mut().find(|a| a.id() == id) {
                activity.switch(at);
            }
        }
        tracing::info!(
            cutoff = plan.cutoff,
            archived,
            retained = self.activities.len(),
            start_date = %self.start_date,
            "archived old history"
        );
        self.emit(DataEvent::Archived);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::tracker::TrackerConfig;

    const DAY: i64 = 24 * 60 * 60;

    fn setup() -> (Tracker, ManualClock) {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).single().unwrap();
        let clock = ManualClock::new(start);
        (Tracker::new(TrackerConfig::default(), clock.clone()), clock)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    /// Two activities worked on for an hour every day for 21 weeks; `writing`
    /// is left running at the end.
    fn long_history() -> (Tracker, ManualClock, ActivityId, ActivityId) {
        let (mut tracker, clock) = setup();
        let writing = tracker.add_activity("writing", 1.0, "").unwrap();
        let reading = tracker.add_activity("reading", 3.0, "").unwrap();
        for day in 0..21 * 7 {
            let id = if day % 2 == 0 { writing } else { reading };
            tracker.turn_on(id).unwrap();
            clock.advance(3_600);
            tracker.turn_off();
            clock.advance(DAY - 3_600);
        }
        tracker.turn_on(writing).unwrap();
        clock.advance(1_800);
        (tracker, clock, writing, reading)
    }

    #[test]
    fn young_history_is_not_archived() {
        let (mut tracker, clock) = setup();
        tracker.add_activity("a", 1.0, "").unwrap();
        clock.advance(20 * WEEK_SECS);

        assert!(!tracker.needs_archive());
        assert!(tracker.plan_archive().is_none());
    }

    #[test]
    fn forced_plan_needs_history_older_than_kept_weeks() {
        let (mut tracker, clock) = setup();
        tracker.add_activity("a", 1.0, "").unwrap();
        clock.advance(2 * WEEK_SECS);

        assert!(tracker.plan_archive_forced().is_none());
    }

    #[test]
    fn planning_does_not_touch_the_tracker() {
        let (tracker, _, _, _) = long_history();
        let before = tracker.snapshot();

        let plan = tracker.plan_archive().unwrap();

        assert_eq!(tracker.snapshot(), before);
        assert_eq!(plan.cutoff, tracker.now_secs() - 5 * WEEK_SECS);
    }

    #[test]
    fn archive_half_ends_at_cutoff() {
        let (tracker, _, writing, _) = long_history();
        let plan = tracker.plan_archive().unwrap();

        assert_eq!(plan.archive.start_date, tracker.start_date());
        assert_eq!(plan.archive.activities.len(), 2);
        for record in &plan.archive.activities {
            assert!(record.onoff.iter().all(|&t| t <= plan.cutoff));
            assert_eq!(record.onoff.len() % 2, 0);
        }
        let archived_writing = plan
            .archive
            .activities
            .iter()
            .find(|r| r.id == writing)
            .unwrap();
        assert_eq!(archived_writing.created, 0);
    }

    #[test]
    fn applying_keeps_recent_statistics() {
        let (mut tracker, clock, writing, reading) = long_history();
        let week_real = tracker.real_time(reading, WEEK_SECS, None).unwrap();
        let week_must = tracker.must_time(writing, WEEK_SECS, None).unwrap();
        let idle = tracker.idle_time(reading).unwrap();

        let plan = tracker.plan_archive().unwrap();
        let new_start = plan.retained_start();
        tracker.apply_archive(plan);

        assert_eq!(tracker.start_date(), new_start);
        assert_eq!(tracker.now_secs(), 5 * WEEK_SECS);
        assert_eq!(tracker.to_datetime(tracker.now_secs()), clock.now());
        assert_eq!(tracker.active().map(Activity::id), Some(writing));
        assert_eq!(tracker.real_time(reading, WEEK_SECS, None), Ok(week_real));
        assert_close(tracker.must_time(writing, WEEK_SECS, None).unwrap(), week_must);
        assert_eq!(tracker.idle_time(reading), Ok(idle));
        for activity in tracker.activities() {
            assert!(activity.onoff().iter().all(|&t| t >= 0));
        }
    }

    #[test]
    fn old_finished_activities_stay_in_the_archive_only() {
        let (mut tracker, clock, _, _) = long_history();
        let done = tracker.add_activity("done", 1.0, "").unwrap();
        tracker.finish(done).unwrap();
        clock.advance(6 * WEEK_SECS);

        let plan = tracker.plan_archive().unwrap();

        assert!(plan.archive.activities.iter().any(|r| r.id == done));
        assert!(plan.retained().iter().all(|a| a.id() != done));
    }

    #[test]
    fn idle_time_survives_when_last_stop_is_archived() {
        let (mut tracker, clock) = setup();
        let a = tracker.add_activity("a", 1.0, "").unwrap();
        tracker.turn_on(a).unwrap();
        clock.advance(3_600);
        tracker.turn_off();
        clock.advance(21 * WEEK_SECS);
        let idle = tracker.idle_time(a).unwrap();

        let plan = tracker.plan_archive().unwrap();
        tracker.apply_archive(plan);

        assert!(tracker.activity(a).unwrap().onoff().is_empty());
        assert_eq!(tracker.idle_time(a), Ok(idle));
    }
}
