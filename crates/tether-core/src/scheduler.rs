#![forbid(unsafe_code)]

//! Deferred notification queue.
//!
//! Writes happen immediately; their notifications wait here until the
//! engine is flushed. Flushing drains the queue one batch at a time, so
//! everything written in one logical operation is observed together.
//!
//! # Invariants
//!
//! 1. Notifications are delivered in the order they were scheduled.
//! 2. Without coalescing, every write produces its own notification, even
//!    repeated writes to one path.
//! 3. With coalescing, a plain write to a path that already has a queued
//!    plain write is dropped; the queued one keeps the oldest `prev`.
//!    List edits are never coalesced, and neither are writes that reached
//!    different list items through the same path.

use std::collections::VecDeque;

use crate::keyed::{ItemKey, ListEdit};
use crate::value::Value;

/// What happened at the notified path.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The value was replaced or mutated. `prev` is absent for inserted keys.
    Set { prev: Option<Value> },
    /// A keyed list operation ran on the list at the path.
    List(ListEdit),
}

/// One deferred notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    path: String,
    change: Change,
    /// `(list path, item key)` for every list the written path passes
    /// through, captured when the write happened.
    items: Vec<(String, ItemKey)>,
}

impl Notification {
    /// Notification for a replaced value.
    #[must_use]
    pub fn set(path: impl Into<String>, prev: Option<Value>) -> Self {
        Self {
            path: path.into(),
            change: Change::Set { prev },
            items: Vec::new(),
        }
    }

    /// Notification for a list edit.
    #[must_use]
    pub fn list(path: impl Into<String>, edit: ListEdit) -> Self {
        Self {
            path: path.into(),
            change: Change::List(edit),
            items: Vec::new(),
        }
    }

    pub(crate) fn with_item_keys(mut self, items: Vec<(String, ItemKey)>) -> Self {
        self.items = items;
        self
    }

    /// Key of the item of the list at `list_path` that the written path
    /// went through, as it was at write time.
    #[must_use]
    pub fn item_key(&self, list_path: &str) -> Option<ItemKey> {
        self.items
            .iter()
            .find(|(path, _)| path == list_path)
            .map(|(_, key)| *key)
    }

    /// Path that was written.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn change(&self) -> &Change {
        &self.change
    }

    /// Value before the write, for plain writes.
    #[must_use]
    pub fn prev(&self) -> Option<&Value> {
        match &self.change {
            Change::Set { prev } => prev.as_ref(),
            Change::List(_) => None,
        }
    }

    /// The list edit, for list operations.
    #[must_use]
    pub fn list_edit(&self) -> Option<&ListEdit> {
        match &self.change {
            Change::List(edit) => Some(edit),
            Change::Set { .. } => None,
        }
    }
}

/// FIFO queue of pending notifications.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Notification>,
    coalesce_same_path: bool,
    scheduled: u64,
    coalesced: u64,
}

impl Scheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(coalesce_same_path: bool) -> Self {
        Self {
            coalesce_same_path,
            ..Self::default()
        }
    }

    /// Queue a notification. Returns `false` if it was merged into one
    /// already queued.
    pub fn schedule(&mut self, notification: Notification) -> bool {
        self.scheduled += 1;
        if self.coalesce_same_path && matches!(notification.change, Change::Set { .. }) {
            let duplicate = self.queue.iter().any(|queued| {
                queued.path == notification.path
                    && queued.items == notification.items
                    && matches!(queued.change, Change::Set { .. })
            });
            if duplicate {
                self.coalesced += 1;
                return false;
            }
        }
        self.queue.push_back(notification);
        true
    }

    /// Take every queued notification, oldest first.
    pub fn take_batch(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total notifications ever scheduled (including coalesced ones).
    #[must_use]
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled
    }

    /// Notifications dropped by coalescing.
    #[must_use]
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyed::KeyedList;

    #[test]
    fn batches_preserve_order() {
        let mut s = Scheduler::new(false);
        s.schedule(Notification::set("a", None));
        s.schedule(Notification::set("b", None));
        s.schedule(Notification::set("a", None));
        let paths: Vec<_> = s.take_batch().iter().map(|n| n.path().to_owned()).collect();
        assert_eq!(paths, ["a", "b", "a"]);
        assert!(s.is_empty());
    }

    #[test]
    fn coalescing_keeps_oldest_prev() {
        let mut s = Scheduler::new(true);
        assert!(s.schedule(Notification::set("a", Some(Value::from(1)))));
        assert!(!s.schedule(Notification::set("a", Some(Value::from(2)))));
        assert!(s.schedule(Notification::set("b", None)));
        let batch = s.take_batch();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].prev(), Some(&Value::from(1)));
        assert_eq!(s.coalesced_count(), 1);
        assert_eq!(s.scheduled_count(), 3);
    }

    #[test]
    fn writes_to_different_items_are_not_coalesced() {
        let keys = KeyedList::from_values(vec![Value::from(1), Value::from(2)]);
        let (first, second) = (keys.key_at(0).unwrap(), keys.key_at(1).unwrap());
        let mut s = Scheduler::new(true);
        let at = |key| Notification::set("items[0]", None).with_item_keys(vec![("items".into(), key)]);
        assert!(s.schedule(at(first)));
        assert!(s.schedule(at(second)));
        assert!(!s.schedule(at(second)));
        let batch = s.take_batch();
        assert_eq!(batch[0].item_key("items"), Some(first));
        assert_eq!(batch[1].item_key("items"), Some(second));
        assert_eq!(batch[1].item_key("other"), None);
    }

    #[test]
    fn list_edits_are_never_coalesced() {
        let mut s = Scheduler::new(true);
        s.schedule(Notification::list("items", ListEdit::default()));
        s.schedule(Notification::list("items", ListEdit::default()));
        assert_eq!(s.len(), 2);
    }
}
