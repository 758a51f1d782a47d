//! Core domain logic for the tacma activity tracker.
//!
//! This crate contains:
//! - Interval sets: piecewise-constant functions over time and their algebra
//! - Activities: raw on/off and priority logs with derived series
//! - Statistics: weights, working time and per-activity targets
//! - The tracker: the data store that owns activities and emits change events
//! - Archiving: splitting old history off the live data

mod archive;
pub mod activity;
pub mod clock;
pub mod event;
pub mod interval;
pub mod record;
pub mod stats;
mod tracker;
pub mod types;

pub use activity::{Activity, SIGNIFICANT_SESSION_SECS};
pub use archive::{ArchivePlan, WEEK_SECS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{DataEvent, Listeners};
pub use interval::{IntervalSet, Segment};
pub use record::{ActivityRecord, ParseWarning, PriorityChange, TrackerSnapshot};
pub use stats::ActivityStats;
pub use tracker::{Tracker, TrackerConfig};
pub use types::{ActivityId, CoreError, Timestamp};
