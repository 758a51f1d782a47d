//! Statistics derived from the whole set of activities.
//!
//! # Series
//!
//! [`ActivityStats`] caches three families of piecewise functions:
//!
//! 1. **weights**: each activity's priority divided by the sum of all
//!    priorities at the same instant (0 where the sum is 0)
//! 2. **working activity**: 1 wherever at least one activity runs
//! 3. **working portion**: weight × working activity, i.e. the share of the
//!    elapsed working time an activity deserves
//!
//! The cache is rebuilt in full whenever a time series changes. Metadata edits
//! (names, comments) leave it untouched.
//!
//! A rebuild sums priorities and running indicators in one sorted sweep each.
//! Per-activity series then only visit the cells that overlap that
//! activity's own priority or weight, found by binary search.

use std::collections::BTreeMap;

use crate::activity::Activity;
use crate::event::DataEvent;
use crate::interval::IntervalSet;
use crate::types::{ActivityId, CoreError, Timestamp};

#[derive(Debug, Clone, Default)]
pub struct ActivityStats {
    working_activity: IntervalSet,
    weights: BTreeMap<ActivityId, IntervalSet>,
    working_portion: BTreeMap<ActivityId, IntervalSet>,
}

impl ActivityStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_activities(activities: &[Activity]) -> Self {
        let mut stats = Self::new();
        stats.rebuild(activities);
        stats
    }

    /// Brings the cache up to date after `event`.
    pub fn handle(&mut self, event: &DataEvent, activities: &[Activity]) {
        if event.changes_series() {
            self.rebuild(activities);
        }
    }

    /// Recomputes every cached series from `activities`.
    pub fn rebuild(&mut self, activities: &[Activity]) {
        self.working_activity.clear();
        self.weights.clear();
        self.working_portion.clear();
        if activities.is_empty() {
            return;
        }

        let priorities: Vec<IntervalSet> = activities
            .iter()
            .map(|a| a.priority_pw(None, None))
            .collect();
        let refs: Vec<&IntervalSet> = priorities.iter().collect();
        let total = IntervalSet::sum(&refs);
        self.weights = activities
            .iter()
            .zip(&priorities)
            .map(|(a, p)| (a.id(), p.zip_on_support(&total, |p, t| p / t)))
            .collect();

        let work: Vec<IntervalSet> = activities.iter().map(|a| a.work_pw(None, None)).collect();
        let refs: Vec<&IntervalSet> = work.iter().collect();
        self.working_activity = IntervalSet::sum(&refs).support();

        self.working_portion = self
            .weights
            .iter()
            .map(|(id, w)| (*id, w.zip_on_support(&self.working_activity, |w, on| w * on)))
            .collect();

        tracing::debug!(
            activities = activities.len(),
            total_segments = total.len(),
            working_segments = self.working_activity.len(),
            "rebuilt activity statistics"
        );
    }

    /// Seconds activity `id` should have received in `[end - dur, end]`.
    pub fn must_time(&self, id: ActivityId, dur: i64, end: Timestamp) -> Result<f64, CoreError> {
        let portion = self
            .working_portion
            .get(&id)
            .ok_or(CoreError::NotFound(id))?;
        let (t0, t1) = query_window(dur, end);
        Ok(portion.integral(Some(t0), Some(t1)))
    }

    /// Seconds activity `id` actually ran in `[end - dur, end]`.
    ///
    /// Read from the raw toggle log rather than the cached series.
    pub fn real_time(
        activities: &[Activity],
        id: ActivityId,
        dur: i64,
        end: Timestamp,
    ) -> Result<i64, CoreError> {
        let activity = find_activity(activities, id)?;
        let t1 = end;
        let t0 = (end - dur).max(0);
        Ok(activity.dur_within(t0, t1))
    }

    /// Length of the session to show for `id`.
    ///
    /// While something runs, that is the running session's elapsed time, for
    /// the running activity only. Otherwise it is the length of the session
    /// that ended last, for the activity it belongs to only.
    pub fn last_session(
        activities: &[Activity],
        id: ActivityId,
        now: Timestamp,
    ) -> Result<Option<i64>, CoreError> {
        find_activity(activities, id)?;

        if let Some(active) = activities.iter().find(|a| a.is_on()) {
            let since = active.onoff().last().copied().unwrap_or(now);
            return Ok((active.id() == id).then_some(now - since));
        }

        let latest = activities
            .iter()
            .filter_map(|a| match a.onoff() {
                [.., start, end] => Some((a.id(), *end, end - start)),
                _ => None,
            })
            .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best });

        Ok(latest
            .filter(|(latest_id, ..)| *latest_id == id)
            .map(|(.., dur)| dur))
    }

    /// Seconds during which any activity ran in `[end - dur, end]`.
    pub fn total_working_time(&self, dur: i64, end: Timestamp) -> f64 {
        let (t0, t1) = query_window(dur, end);
        self.working_activity.integral(Some(t0), Some(t1))
    }

    /// Weight of `id` at instant `t`; 0 for unknown activities.
    #[allow(clippy::cast_precision_loss)]
    pub fn weight_at(&self, id: ActivityId, t: Timestamp) -> f64 {
        self.weights.get(&id).map_or(0.0, |w| w.val(t as f64))
    }

    pub fn weights(&self, id: ActivityId) -> Option<&IntervalSet> {
        self.weights.get(&id)
    }

    pub fn working_portion(&self, id: ActivityId) -> Option<&IntervalSet> {
        self.working_portion.get(&id)
    }

    pub const fn working_activity(&self) -> &IntervalSet {
        &self.working_activity
    }
}

pub(crate) fn find_activity(activities: &[Activity], id: ActivityId) -> Result<&Activity, CoreError> {
    activities
        .iter()
        .find(|a| a.id() == id)
        .ok_or(CoreError::NotFound(id))
}

#[allow(clippy::cast_precision_loss)]
fn query_window(dur: i64, end: Timestamp) -> (f64, f64) {
    ((end - dur).max(0) as f64, end as f64)
}
