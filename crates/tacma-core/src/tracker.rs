//! The data store: owns every activity and keeps statistics current.
//!
//! All mutations go through [`Tracker`] so that each change emits exactly one
//! [`DataEvent`]. The statistics cache is updated before any listener sees
//! the event.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::clock::Clock;
use crate::event::{DataEvent, Listeners};
use crate::record::{PriorityChange, TrackerSnapshot};
use crate::stats::{ActivityStats, find_activity};
use crate::types::{ActivityId, CoreError, Timestamp};

/// Tunables owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// History older than this many weeks triggers an archive split.
    pub archive_after_weeks: u32,
    /// Weeks of history kept in the live data after a split.
    pub keep_weeks: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            archive_after_weeks: 20,
            keep_weeks: 5,
        }
    }
}

#[derive(Debug)]
pub struct Tracker {
    pub(crate) config: TrackerConfig,
    clock: Box<dyn Clock>,
    pub(crate) start_date: DateTime<Utc>,
    pub(crate) activities: Vec<Activity>,
    stats: ActivityStats,
    listeners: Listeners,
}

impl Tracker {
    /// An empty tracker whose time origin is the clock's current time.
    pub fn new(config: TrackerConfig, clock: impl Clock + 'static) -> Self {
        let start_date = clock.now();
        Self {
            config,
            clock: Box::new(clock),
            start_date,
            activities: Vec::new(),
            stats: ActivityStats::new(),
            listeners: Listeners::new(),
        }
    }

    /// Restores a tracker from persisted records.
    ///
    /// Identifiers must be unique and at most one record may be running.
    pub fn from_snapshot(
        config: TrackerConfig,
        clock: impl Clock + 'static,
        snapshot: TrackerSnapshot,
    ) -> Result<Self, CoreError> {
        let activities = snapshot
            .activities
            .into_iter()
            .map(Activity::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = BTreeSet::new();
        if let Some(dup) = activities.iter().find(|a| !seen.insert(a.id())) {
            return Err(CoreError::CorruptRecord {
                id: dup.id(),
                reason: "identifier is used more than once".to_string(),
            });
        }
        if let Some(second) = activities.iter().filter(|a| a.is_on()).nth(1) {
            return Err(CoreError::CorruptRecord {
                id: second.id(),
                reason: "another activity is already running".to_string(),
            });
        }

        let stats = ActivityStats::from_activities(&activities);
        tracing::debug!(
            activities = activities.len(),
            start_date = %snapshot.start_date,
            "restored tracker"
        );
        Ok(Self {
            config,
            clock: Box::new(clock),
            start_date: snapshot.start_date,
            activities,
            stats,
            listeners: Listeners::new(),
        })
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            start_date: self.start_date,
            activities: self.activities.iter().map(Activity::to_record).collect(),
        }
    }

    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub const fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub const fn stats(&self) -> &ActivityStats {
        &self.stats
    }

    /// Registers a callback for every subsequent change.
    pub fn subscribe(&mut self, listener: impl FnMut(&DataEvent) + 'static) {
        self.listeners.subscribe(listener);
    }

    // ========== Time ==========

    pub fn now_secs(&self) -> Timestamp {
        self.to_secs(self.clock.now())
    }

    pub fn to_secs(&self, at: DateTime<Utc>) -> Timestamp {
        (at - self.start_date).num_seconds()
    }

    pub fn to_datetime(&self, secs: Timestamp) -> DateTime<Utc> {
        self.start_date + TimeDelta::seconds(secs)
    }

    // ========== Lookups ==========

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn activity(&self, id: ActivityId) -> Result<&Activity, CoreError> {
        find_activity(&self.activities, id)
    }

    /// The running activity, if any.
    pub fn active(&self) -> Option<&Activity> {
        self.activities.iter().find(|a| a.is_on())
    }

    // ========== Mutations ==========

    /// Creates an activity and returns its identifier.
    pub fn add_activity(
        &mut self,
        name: impl Into<String>,
        priority: f64,
        comment: impl Into<String>,
    ) -> Result<ActivityId, CoreError> {
        let id = self
            .activities
            .iter()
            .map(Activity::id)
            .max()
            .map_or(ActivityId::new(0), ActivityId::next);
        let mut activity = Activity::new(id, name, priority, self.now_secs())?;
        activity.set_comment(comment);
        tracing::debug!(%id, name = activity.name(), priority, "added activity");
        self.activities.push(activity);
        self.emit(DataEvent::ActivityAdded(id));
        Ok(id)
    }

    pub fn rename(&mut self, id: ActivityId, name: impl Into<String>) -> Result<(), CoreError> {
        let name = name.into();
        let activity = self.activity_mut(id)?;
        if activity.name() == name {
            return Ok(());
        }
        activity.set_name(name);
        self.emit(DataEvent::NameChanged(id));
        Ok(())
    }

    pub fn set_comment(
        &mut self,
        id: ActivityId,
        comment: impl Into<String>,
    ) -> Result<(), CoreError> {
        let comment = comment.into();
        let activity = self.activity_mut(id)?;
        if activity.comment() == comment {
            return Ok(());
        }
        activity.set_comment(comment);
        self.emit(DataEvent::CommentChanged(id));
        Ok(())
    }

    /// Sets the priority from now on. Setting the current value again does
    /// nothing.
    #[allow(clippy::float_cmp)]
    pub fn change_priority(&mut self, id: ActivityId, priority: f64) -> Result<(), CoreError> {
        let now = self.now_secs();
        let activity = self.activity_mut(id)?;
        if activity.current_priority() == priority {
            return Ok(());
        }
        activity.set_priority(now, priority)?;
        tracing::debug!(%id, priority, "changed priority");
        self.emit(DataEvent::PriorityChanged(id));
        Ok(())
    }

    /// Starts `id`, stopping whichever activity was running.
    pub fn turn_on(&mut self, id: ActivityId) -> Result<(), CoreError> {
        let now = self.now_secs();
        let target = self.activity(id)?;
        if !target.is_alive() {
            return Err(CoreError::Finished(id));
        }
        if target.is_on() {
            return Ok(());
        }
        if let Some(running) = self.activities.iter_mut().find(|a| a.is_on()) {
            tracing::debug!(id = %running.id(), "stopping running activity");
            running.switch(now);
        }
        self.activity_mut(id)?.switch(now);
        tracing::debug!(%id, at = now, "started activity");
        self.emit(DataEvent::ActiveChanged(Some(id)));
        Ok(())
    }

    /// Stops the running activity and returns it, if there was one.
    pub fn turn_off(&mut self) -> Option<ActivityId> {
        let now = self.now_secs();
        let running = self.activities.iter_mut().find(|a| a.is_on())?;
        running.switch(now);
        let id = running.id();
        tracing::debug!(%id, at = now, "stopped activity");
        self.emit(DataEvent::ActiveChanged(None));
        Some(id)
    }

    pub fn finish(&mut self, id: ActivityId) -> Result<(), CoreError> {
        let now = self.now_secs();
        let activity = self.activity_mut(id)?;
        if !activity.is_alive() {
            return Ok(());
        }
        let was_running = activity.is_on();
        activity.finish(now);
        tracing::debug!(%id, at = now, "finished activity");
        self.emit(DataEvent::Finished(id));
        if was_running {
            self.emit(DataEvent::ActiveChanged(None));
        }
        Ok(())
    }

    /// Deletes an activity with all its history.
    pub fn remove(&mut self, id: ActivityId) -> Result<Activity, CoreError> {
        let idx = self
            .activities
            .iter()
            .position(|a| a.id() == id)
            .ok_or(CoreError::NotFound(id))?;
        let removed = self.activities.remove(idx);
        tracing::debug!(%id, "removed activity");
        self.emit(DataEvent::Removed(id));
        Ok(removed)
    }

    /// Replaces the toggle log of `id`.
    pub fn reset_onoff(&mut self, id: ActivityId, onoff: Vec<Timestamp>) -> Result<(), CoreError> {
        let now = self.now_secs();
        self.activity_mut(id)?.reset_onoff(onoff, now)?;
        tracing::debug!(%id, "replaced toggle log");
        self.emit(DataEvent::ManualDataChanged(id));
        Ok(())
    }

    /// Replaces the priority log of `id`.
    pub fn reset_priority(
        &mut self,
        id: ActivityId,
        priority: Vec<PriorityChange>,
    ) -> Result<(), CoreError> {
        let now = self.now_secs();
        self.activity_mut(id)?.reset_priority(priority, now)?;
        tracing::debug!(%id, "replaced priority log");
        self.emit(DataEvent::ManualDataChanged(id));
        Ok(())
    }

    pub fn add_session(
        &mut self,
        id: ActivityId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<(), CoreError> {
        let now = self.now_secs();
        self.activity_mut(id)?.add_session(start, end, now)?;
        self.emit(DataEvent::ManualDataChanged(id));
        Ok(())
    }

    pub fn remove_session(&mut self, id: ActivityId, index: usize) -> Result<(), CoreError> {
        self.activity_mut(id)?.remove_session(index)?;
        self.emit(DataEvent::ManualDataChanged(id));
        Ok(())
    }

    // ========== Statistics ==========

    /// Current priority of `id` relative to all unfinished activities.
    pub fn weight(&self, id: ActivityId) -> Result<f64, CoreError> {
        let priority = self.activity(id)?.current_priority();
        let total: f64 = self
            .activities
            .iter()
            .filter(|a| a.is_alive())
            .map(Activity::current_priority)
            .sum();
        Ok(if total > 0.0 { priority / total } else { 0.0 })
    }

    /// Seconds `id` should have run in the `dur` seconds before `end`
    /// (default: now).
    pub fn must_time(
        &self,
        id: ActivityId,
        dur: i64,
        end: Option<Timestamp>,
    ) -> Result<f64, CoreError> {
        let end = end.unwrap_or_else(|| self.now_secs());
        self.stats.must_time(id, dur, end)
    }

    /// Seconds `id` actually ran in the `dur` seconds before `end`
    /// (default: now).
    pub fn real_time(
        &self,
        id: ActivityId,
        dur: i64,
        end: Option<Timestamp>,
    ) -> Result<i64, CoreError> {
        let end = end.unwrap_or_else(|| self.now_secs());
        ActivityStats::real_time(&self.activities, id, dur, end)
    }

    pub fn last_session(&self, id: ActivityId) -> Result<Option<i64>, CoreError> {
        ActivityStats::last_session(&self.activities, id, self.now_secs())
    }

    /// Seconds since `id` last stopped; `None` while it runs.
    pub fn idle_time(&self, id: ActivityId) -> Result<Option<i64>, CoreError> {
        let now = self.now_secs();
        Ok(self.activity(id)?.last_stop().map(|stop| now - stop))
    }

    /// Seconds during which anything ran in the `dur` seconds before `end`
    /// (default: now).
    pub fn total_working_time(&self, dur: i64, end: Option<Timestamp>) -> f64 {
        let end = end.unwrap_or_else(|| self.now_secs());
        self.stats.total_working_time(dur, end)
    }

    fn activity_mut(&mut self, id: ActivityId) -> Result<&mut Activity, CoreError> {
        self.activities
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(CoreError::NotFound(id))
    }

    pub(crate) fn emit(&mut self, event: DataEvent) {
        self.stats.handle(&event, &self.activities);
        self.listeners.emit(&event);
    }
}
