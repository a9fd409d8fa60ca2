#![forbid(unsafe_code)]

//! Keyed list reconciliation.
//!
//! A list routine renders one output group per item. The
//! [`ListReconciler`] remembers which handles each item key produced and,
//! given the list's current keys plus (optionally) the edit that led there,
//! touches only what changed:
//!
//! - **Full pass** (no edit): every index is rendered again, and outputs of
//!   keys that left the list are destroyed.
//! - **Edit pass**: outputs of removed keys are destroyed; each added key is
//!   rendered at its current position, before the first following item that
//!   still has output. Items the edit did not name are left alone.
//!
//! # Invariants
//!
//! 1. After a pass, every key with outputs is present in the list.
//! 2. A key's outputs are destroyed exactly once, by the pass that replaces
//!    or drops them, or by [`ListReconciler::drain_all`].
//! 3. The full pass and the edit pass leave the same set of keys with
//!    output, and that output lives in list order.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::host::NodeHandle;
use crate::keyed::{ItemKey, ListEdit};

/// Where reconciliation sends its render and destroy requests.
pub(crate) trait ItemSink {
    /// Render the item at `index`, mounting output before `anchor` when set.
    fn render(&mut self, index: usize, anchor: Option<NodeHandle>) -> Vec<NodeHandle>;

    /// Destroy previously rendered output.
    fn destroy(&mut self, handles: Vec<NodeHandle>);
}

/// Per-routine record of which item produced which output.
#[derive(Debug, Default)]
pub struct ListReconciler {
    outputs: HashMap<ItemKey, Vec<NodeHandle>>,
    previous_keys: Vec<ItemKey>,
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub rendered: usize,
    pub destroyed: usize,
}

impl ListReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys seen by the last pass, in list order.
    #[must_use]
    pub fn previous_keys(&self) -> &[ItemKey] {
        &self.previous_keys
    }

    /// Output recorded for `key`.
    #[must_use]
    pub fn outputs_of(&self, key: ItemKey) -> Option<&[NodeHandle]> {
        self.outputs.get(&key).map(Vec::as_slice)
    }

    /// Number of keys holding output.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Bring outputs in line with `keys`.
    pub(crate) fn reconcile(
        &mut self,
        keys: &[ItemKey],
        edit: Option<&ListEdit>,
        sink: &mut dyn ItemSink,
    ) -> ReconcileStats {
        let stats = match edit {
            Some(edit) => self.apply_edit(keys, edit, sink),
            None => self.replace_all(keys, sink),
        };
        self.previous_keys = keys.to_vec();
        trace!(
            items = keys.len(),
            rendered = stats.rendered,
            destroyed = stats.destroyed,
            full = edit.is_none(),
            "list reconciled"
        );
        stats
    }

    fn replace_all(&mut self, keys: &[ItemKey], sink: &mut dyn ItemSink) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let mut fresh: Vec<(ItemKey, Vec<NodeHandle>)> = Vec::with_capacity(keys.len());
        let upper = keys.len().max(self.previous_keys.len());
        for index in 0..upper {
            if let Some(old) = self.previous_keys.get(index) {
                if let Some(handles) = self.outputs.remove(old) {
                    stats.destroyed += 1;
                    sink.destroy(handles);
                }
            }
            if let Some(key) = keys.get(index) {
                // A key that moved to an earlier index still has output there.
                if let Some(handles) = self.outputs.remove(key) {
                    stats.destroyed += 1;
                    sink.destroy(handles);
                }
                fresh.push((*key, sink.render(index, None)));
                stats.rendered += 1;
            }
        }
        for (_, handles) in self.outputs.drain() {
            stats.destroyed += 1;
            sink.destroy(handles);
        }
        self.outputs.extend(fresh);
        stats
    }

    fn apply_edit(
        &mut self,
        keys: &[ItemKey],
        edit: &ListEdit,
        sink: &mut dyn ItemSink,
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let re_added: HashSet<ItemKey> = edit.added.iter().copied().collect();
        for key in &edit.removed {
            if re_added.contains(key) {
                continue;
            }
            if let Some(handles) = self.outputs.remove(key) {
                stats.destroyed += 1;
                sink.destroy(handles);
            }
        }

        let mut hint = edit.indices.add.as_ref().map_or(0, |range| range.start);
        for key in &edit.added {
            let Some(index) = locate(keys, *key, hint) else {
                continue;
            };
            hint = index + 1;
            if let Some(handles) = self.outputs.remove(key) {
                stats.destroyed += 1;
                sink.destroy(handles);
            }
            let anchor = keys[index + 1..]
                .iter()
                .find_map(|k| self.outputs.get(k).and_then(|h| h.first().copied()));
            let handles = sink.render(index, anchor);
            stats.rendered += 1;
            self.outputs.insert(*key, handles);
        }
        stats
    }

    /// Destroy every recorded output.
    pub(crate) fn drain_all(&mut self, sink: &mut dyn ItemSink) -> usize {
        let mut count = 0;
        for key in std::mem::take(&mut self.previous_keys) {
            if let Some(handles) = self.outputs.remove(&key) {
                count += 1;
                sink.destroy(handles);
            }
        }
        for (_, handles) in self.outputs.drain() {
            count += 1;
            sink.destroy(handles);
        }
        count
    }
}

/// Position of `key` in `keys`, checking `hint` first.
fn locate(keys: &[ItemKey], key: ItemKey, hint: usize) -> Option<usize> {
    if keys.get(hint) == Some(&key) {
        return Some(hint);
    }
    keys.iter().position(|k| *k == key)
}
