//! A single tracked activity.
//!
//! An [`Activity`] keeps two append-only logs (toggle timestamps and priority
//! changes) and mirrors each of them in an [`IntervalSet`] so statistics can
//! combine activities without re-reading the logs. Every operation that
//! touches a log leaves the derived series in sync before it returns.

use crate::interval::IntervalSet;
use crate::record::{ActivityRecord, PriorityChange};
use crate::types::{ActivityId, CoreError, Timestamp};

/// Sessions no longer than this are treated as noise when reporting idle time.
pub const SIGNIFICANT_SESSION_SECS: i64 = 300;

const OPEN_END: f64 = f64::INFINITY;

#[allow(clippy::cast_precision_loss)]
const fn secs(t: Timestamp) -> f64 {
    t as f64
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp(t: f64) -> Timestamp {
    t.round() as Timestamp
}

#[derive(Debug, Clone)]
pub struct Activity {
    id: ActivityId,
    name: String,
    comment: String,
    created: Timestamp,
    finished: Option<Timestamp>,
    onoff: Vec<Timestamp>,
    priority: Vec<PriorityChange>,
    /// End of the last significant session before history was truncated.
    archived_stop: Timestamp,

    work: IntervalSet,
    prior: IntervalSet,
}

impl Activity {
    /// Creates an alive, stopped activity with `priority` effective from `now`.
    pub fn new(
        id: ActivityId,
        name: impl Into<String>,
        priority: f64,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        check_priority(id, priority)?;
        let mut activity = Self {
            id,
            name: name.into(),
            comment: String::new(),
            created: now,
            finished: None,
            onoff: Vec::new(),
            priority: vec![PriorityChange::new(now, priority)],
            archived_stop: now,
            work: IntervalSet::new(),
            prior: IntervalSet::new(),
        };
        activity.actualize();
        Ok(activity)
    }

    pub const fn id(&self) -> ActivityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub const fn created(&self) -> Timestamp {
        self.created
    }

    pub const fn finished(&self) -> Option<Timestamp> {
        self.finished
    }

    pub const fn archived_stop(&self) -> Timestamp {
        self.archived_stop
    }

    pub(crate) const fn set_archived_stop(&mut self, at: Timestamp) {
        self.archived_stop = at;
    }

    /// Raw toggle log.
    pub fn onoff(&self) -> &[Timestamp] {
        &self.onoff
    }

    /// Raw priority log.
    pub fn priority_log(&self) -> &[PriorityChange] {
        &self.priority
    }

    /// Whether the activity is running (odd number of toggles).
    pub fn is_on(&self) -> bool {
        self.onoff.len() % 2 == 1
    }

    pub const fn is_alive(&self) -> bool {
        self.finished.is_none()
    }

    pub fn current_priority(&self) -> f64 {
        self.priority.last().map_or(0.0, |p| p.value)
    }

    /// Completed `(start, end)` sessions, oldest first.
    pub fn sessions(&self) -> impl Iterator<Item = (Timestamp, Timestamp)> + '_ {
        self.onoff.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }

    /// Seconds spent running inside `[t0, t1]`, read from the raw toggle log.
    ///
    /// A running session counts as open past `t1`.
    pub fn dur_within(&self, t0: Timestamp, t1: Timestamp) -> i64 {
        self.onoff
            .chunks(2)
            .map(|pair| {
                let start = pair[0];
                let end = pair.get(1).copied().unwrap_or_else(|| start.max(t1) + 1);
                (t1.min(end) - t0.max(start)).max(0)
            })
            .sum()
    }

    /// Priority over time restricted to `[t0, t1]` (unbounded by default).
    pub fn priority_pw(&self, t0: Option<Timestamp>, t1: Option<Timestamp>) -> IntervalSet {
        let (t0, t1) = window(t0, t1);
        self.prior.cut(t0, t1)
    }

    /// Running indicator over time restricted to `[t0, t1]` (unbounded by default).
    pub fn work_pw(&self, t0: Option<Timestamp>, t1: Option<Timestamp>) -> IntervalSet {
        if self.onoff.is_empty() {
            return IntervalSet::new();
        }
        let (t0, t1) = window(t0, t1);
        self.work.cut(t0, t1)
    }

    /// Toggles the running state at `now`.
    pub fn switch(&mut self, now: Timestamp) {
        self.onoff.push(now);
        let value = self.is_on().then_some(1.0);
        self.work.add_section(secs(now), OPEN_END, value);
    }

    /// Records a new priority effective from `now`.
    pub fn set_priority(&mut self, now: Timestamp, value: f64) -> Result<(), CoreError> {
        if !self.is_alive() {
            return Err(CoreError::Finished(self.id));
        }
        check_priority(self.id, value)?;
        self.priority.push(PriorityChange::new(now, value));
        self.prior.add_section(secs(now), OPEN_END, Some(value));
        Ok(())
    }

    /// Finishes the activity: priority drops to 0 and a running session stops.
    ///
    /// Finishing is irrevocable; a second call does nothing.
    pub fn finish(&mut self, now: Timestamp) {
        if !self.is_alive() {
            return;
        }
        if self.current_priority() != 0.0 {
            self.priority.push(PriorityChange::new(now, 0.0));
            self.prior.add_section(secs(now), OPEN_END, Some(0.0));
        }
        if self.is_on() {
            self.switch(now);
        }
        self.finished = Some(now);
    }

    /// End of the most recent session longer than
    /// [`SIGNIFICANT_SESSION_SECS`], or `archived_stop` if there is none.
    ///
    /// `None` while the activity is running.
    pub fn last_stop(&self) -> Option<Timestamp> {
        if self.is_on() {
            return None;
        }
        let stop = self
            .onoff
            .rchunks_exact(2)
            .find(|pair| pair[1] - pair[0] > SIGNIFICANT_SESSION_SECS)
            .map_or(self.archived_stop, |pair| pair[1]);
        Some(stop)
    }

    /// Drops log entries before `tm`, keeping the state at `tm` intact.
    ///
    /// A session running across `tm` is split there, and the priority in
    /// effect at `tm` is re-recorded at `tm`.
    pub fn delete_before(&mut self, tm: Timestamp) {
        let onoff_idx = self.cut_onoff(tm);
        self.onoff.drain(..onoff_idx);
        let priority_idx = self.cut_priority(tm);
        self.priority.drain(..priority_idx);
        self.actualize();
    }

    /// Drops log entries at or after `tm`.
    ///
    /// Returns `false` when the activity did not exist before `tm`; its logs
    /// are wiped and the caller should discard it.
    #[must_use]
    pub fn delete_after(&mut self, tm: Timestamp) -> bool {
        if self.created >= tm {
            self.onoff.clear();
            self.priority.clear();
            self.actualize();
            return false;
        }
        if self.finished.is_some_and(|f| f >= tm) {
            self.finished = None;
        }
        let onoff_idx = self.cut_onoff(tm);
        self.onoff.truncate(onoff_idx);
        let priority_idx = self.cut_priority(tm);
        self.priority.truncate(priority_idx);
        self.actualize();
        true
    }

    /// Moves every timestamp by `delta` seconds.
    ///
    /// Priority timestamps are clamped at 0.
    pub fn shift_time(&mut self, delta: i64) {
        for t in &mut self.onoff {
            *t += delta;
        }
        for p in &mut self.priority {
            p.at = (p.at + delta).max(0);
        }
        self.created += delta;
        self.archived_stop += delta;
        if let Some(finished) = &mut self.finished {
            *finished += delta;
        }
        self.actualize();
    }

    /// A copy holding only history before `tm`, or `None` if the activity
    /// was created at or after `tm`.
    #[must_use]
    pub fn truncated_after(&self, tm: Timestamp) -> Option<Self> {
        let mut copy = self.clone();
        copy.delete_after(tm).then_some(copy)
    }

    /// A copy holding only history from `tm` on.
    #[must_use]
    pub fn truncated_before(&self, tm: Timestamp) -> Self {
        let mut copy = self.clone();
        copy.delete_before(tm);
        copy
    }

    /// Replaces the toggle log.
    ///
    /// The new log must be sorted, lie within `[created, now]`, and keep the
    /// current running state. Finished activities cannot be edited.
    pub fn reset_onoff(&mut self, onoff: Vec<Timestamp>, now: Timestamp) -> Result<(), CoreError> {
        if !self.is_alive() {
            return Err(CoreError::Finished(self.id));
        }
        if !onoff.is_sorted() {
            return Err(self.invalid_edit("toggle times must be in ascending order"));
        }
        if onoff.first().is_some_and(|&t| t < self.created) {
            return Err(self.invalid_edit("sessions cannot start before the activity was created"));
        }
        if onoff.last().is_some_and(|&t| t > now) {
            return Err(self.invalid_edit("toggle times cannot be in the future"));
        }
        if onoff.len() % 2 != self.onoff.len() % 2 {
            return Err(self.invalid_edit("edit would change whether the activity is running"));
        }
        self.onoff = onoff;
        self.actualize();
        Ok(())
    }

    /// Replaces the priority log.
    ///
    /// Changes must be sorted, lie within `[created, now]`, and carry valid
    /// priorities. Finished activities cannot be edited.
    pub fn reset_priority(
        &mut self,
        priority: Vec<PriorityChange>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if !self.is_alive() {
            return Err(CoreError::Finished(self.id));
        }
        if priority.is_empty() {
            return Err(self.invalid_edit("priority log cannot be empty"));
        }
        if !priority.is_sorted_by_key(|p| p.at) {
            return Err(self.invalid_edit("priority changes must be in ascending order"));
        }
        if priority.first().is_some_and(|p| p.at < self.created) {
            return Err(self.invalid_edit("priority changes cannot predate the activity"));
        }
        if priority.last().is_some_and(|p| p.at > now) {
            return Err(self.invalid_edit("priority changes cannot be in the future"));
        }
        for change in &priority {
            check_priority(self.id, change.value)?;
        }
        self.priority = priority;
        self.actualize();
        Ok(())
    }

    /// The activity as it stood at `t`, or `None` if it did not exist yet.
    ///
    /// Toggles and priority changes after `t` are dropped, so a session
    /// running at `t` is still running in the copy.
    #[must_use]
    pub fn as_of(&self, t: Timestamp) -> Option<Self> {
        if self.created > t {
            return None;
        }
        let mut past = self.clone();
        past.onoff.retain(|&at| at <= t);
        past.priority.retain(|p| p.at <= t);
        if past.priority.is_empty() {
            return None;
        }
        if past.finished.is_some_and(|finished| finished > t) {
            past.finished = None;
        }
        past.actualize();
        Some(past)
    }

    /// Inserts a completed session, merging it with sessions it overlaps or
    /// touches.
    pub fn add_session(
        &mut self,
        start: Timestamp,
        end: Timestamp,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if end <= start {
            return Err(self.invalid_edit("session must end after it starts"));
        }
        if start < self.created {
            return Err(self.invalid_edit("session cannot start before the activity was created"));
        }
        if end > now {
            return Err(self.invalid_edit("session cannot end in the future"));
        }
        let running = if self.is_on() { self.onoff.last().copied() } else { None };
        if running.is_some_and(|since| end > since) {
            return Err(self.invalid_edit("session overlaps the running session"));
        }

        let mut sessions =
            IntervalSet::from_segments(self.sessions().map(|(a, b)| (secs(a), secs(b), 1.0)));
        sessions.add_section(secs(start), secs(end), Some(1.0));
        let merged = IntervalSet::func(|v| v[0], &[&sessions]);

        let mut onoff: Vec<Timestamp> = merged
            .segments()
            .iter()
            .flat_map(|s| [timestamp(s.start), timestamp(s.end)])
            .collect();
        onoff.extend(running);
        self.onoff = onoff;
        self.actualize();
        Ok(())
    }

    /// Deletes the `index`-th completed session.
    pub fn remove_session(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.onoff.len() / 2 {
            return Err(self.invalid_edit(format!("there is no session #{index}")));
        }
        self.onoff.drain(2 * index..2 * index + 2);
        self.actualize();
        Ok(())
    }

    /// Rebuilds both derived series from the raw logs.
    pub fn actualize(&mut self) {
        self.work.clear();
        for pair in self.onoff.chunks_exact(2) {
            self.work.add_section(secs(pair[0]), secs(pair[1]), Some(1.0));
        }
        if self.is_on() {
            if let Some(&since) = self.onoff.last() {
                self.work.add_section(secs(since), OPEN_END, Some(1.0));
            }
        }

        self.prior.clear();
        for p in &self.priority {
            self.prior.add_section(secs(p.at), OPEN_END, Some(p.value));
        }
    }

    pub fn to_record(&self) -> ActivityRecord {
        ActivityRecord {
            id: self.id,
            name: self.name.clone(),
            comment: self.comment.clone(),
            created: self.created,
            finished: self.finished,
            onoff: self.onoff.clone(),
            priority: self.priority.clone(),
            archived_stop: self.archived_stop,
        }
    }

    /// Restores an activity, rejecting records whose logs are unusable.
    pub fn from_record(record: ActivityRecord) -> Result<Self, CoreError> {
        let corrupt = |reason: &str| CoreError::CorruptRecord {
            id: record.id,
            reason: reason.to_string(),
        };
        if record.priority.is_empty() {
            return Err(corrupt("priority log is empty"));
        }
        if !record.onoff.is_sorted() {
            return Err(corrupt("toggle log is not sorted"));
        }
        if !record.priority.is_sorted_by_key(|p| p.at) {
            return Err(corrupt("priority log is not sorted"));
        }
        if record.priority.iter().any(|p| !p.value.is_finite() || p.value < 0.0) {
            return Err(corrupt("priority value is not a non-negative number"));
        }

        let mut activity = Self {
            id: record.id,
            name: record.name,
            comment: record.comment,
            created: record.created,
            finished: record.finished,
            onoff: record.onoff,
            priority: record.priority,
            archived_stop: record.archived_stop,
            work: IntervalSet::new(),
            prior: IntervalSet::new(),
        };
        activity.actualize();
        Ok(activity)
    }

    /// Splits a session running across `tm` and returns the index of the
    /// first toggle at or after `tm`.
    fn cut_onoff(&mut self, tm: Timestamp) -> usize {
        let mut idx = self.onoff.partition_point(|&t| t < tm);
        if idx % 2 == 1 {
            self.onoff.splice(idx..idx, [tm, tm]);
            idx += 1;
        }
        idx
    }

    /// Makes sure a priority entry exists exactly at `tm` (if any priority was
    /// in effect) and returns its index.
    fn cut_priority(&mut self, tm: Timestamp) -> usize {
        let idx = self.priority.partition_point(|p| p.at < tm);
        if self.priority.get(idx).is_some_and(|p| p.at == tm) {
            return idx;
        }
        if idx > 0 {
            let value = self.priority[idx - 1].value;
            self.priority.insert(idx, PriorityChange::new(tm, value));
        }
        idx
    }

    fn invalid_edit(&self, reason: impl Into<String>) -> CoreError {
        CoreError::InvalidEdit {
            id: self.id,
            reason: reason.into(),
        }
    }
}

fn check_priority(id: ActivityId, value: f64) -> Result<(), CoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidPriority { id, value })
    }
}

fn window(t0: Option<Timestamp>, t1: Option<Timestamp>) -> (f64, f64) {
    (
        t0.map_or(f64::NEG_INFINITY, secs),
        t1.map_or(f64::INFINITY, secs),
    )
}
