//! Change notifications emitted by the tracker.

use crate::types::ActivityId;

/// Something changed in the tracked data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEvent {
    ActivityAdded(ActivityId),
    /// The running activity changed; `None` means nothing runs now.
    ActiveChanged(Option<ActivityId>),
    PriorityChanged(ActivityId),
    NameChanged(ActivityId),
    CommentChanged(ActivityId),
    /// A raw log was edited by hand.
    ManualDataChanged(ActivityId),
    Finished(ActivityId),
    Removed(ActivityId),
    /// Old history was split off and the time origin moved.
    Archived,
}

impl DataEvent {
    /// Whether the event alters a time series (as opposed to metadata only).
    pub const fn changes_series(&self) -> bool {
        !matches!(self, Self::NameChanged(_) | Self::CommentChanged(_))
    }

    /// The activity the event is about, if any.
    pub const fn activity(&self) -> Option<ActivityId> {
        match *self {
            Self::ActivityAdded(id)
            | Self::PriorityChanged(id)
            | Self::NameChanged(id)
            | Self::CommentChanged(id)
            | Self::ManualDataChanged(id)
            | Self::Finished(id)
            | Self::Removed(id) => Some(id),
            Self::ActiveChanged(id) => id,
            Self::Archived => None,
        }
    }
}

type Listener = Box<dyn FnMut(&DataEvent)>;

/// Callbacks notified in subscription order.
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Listener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&DataEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: &DataEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn metadata_events_do_not_change_series() {
        let id = ActivityId::new(1);
        assert!(!DataEvent::NameChanged(id).changes_series());
        assert!(!DataEvent::CommentChanged(id).changes_series());
        assert!(DataEvent::PriorityChanged(id).changes_series());
        assert!(DataEvent::ActiveChanged(None).changes_series());
        assert!(DataEvent::Archived.changes_series());
    }

    #[test]
    fn event_reports_its_activity() {
        let id = ActivityId::new(5);
        assert_eq!(DataEvent::Removed(id).activity(), Some(id));
        assert_eq!(DataEvent::ActiveChanged(None).activity(), None);
        assert_eq!(DataEvent::Archived.activity(), None);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        for name in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            listeners.subscribe(move |event| log.borrow_mut().push((name, *event)));
        }

        listeners.emit(&DataEvent::Archived);

        assert_eq!(
            *log.borrow(),
            vec![
                ("first", DataEvent::Archived),
                ("second", DataEvent::Archived),
                ("third", DataEvent::Archived),
            ]
        );
        assert_eq!(listeners.len(), 3);
    }
}
