#![forbid(unsafe_code)]

//! Ordered sequences with stable per-item identity.
//!
//! A [`KeyedList`] pairs every element with an opaque [`ItemKey`]. The five
//! mutating operations keep both sequences in lockstep and report which
//! index ranges were added and removed, so list renderers can touch only
//! the affected items.
//!
//! # Invariants
//!
//! 1. `keys.len() == data.len()` after every operation.
//! 2. `data[i]` and `keys[i]` describe the same logical item for as long as
//!    the item stays in the list, whatever is inserted or removed around it.
//! 3. Keys are never reused: inserted items always receive fresh keys.
//! 4. Cloning a list keeps its keys, so writing a list value back into the
//!    store does not change item identity.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Removal from an empty list | `remove_last`/`remove_first` on `[]` | Returns `None`, empty change |
//! | Splice past the end | `start > len` | `start` is clamped to `len` |
//! | Oversized remove count | `start + count > len` | Removes to the end |

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::Value;

/// Global counter for item identity tokens.
static NEXT_ITEM_KEY: AtomicU64 = AtomicU64::new(1);

/// Opaque identity token of one list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(u64);

impl ItemKey {
    fn fresh() -> Self {
        Self(NEXT_ITEM_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw token value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Index ranges touched by one list mutation.
///
/// Removal ranges refer to positions before the mutation, addition ranges to
/// positions after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexChange {
    /// Range of newly inserted items.
    pub add: Option<Range<usize>>,
    /// Range of removed items.
    pub remove: Option<Range<usize>>,
}

impl IndexChange {
    /// Whether the mutation changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_none() && self.remove.is_none()
    }

    fn with_add(mut self, range: Range<usize>) -> Self {
        if !range.is_empty() {
            self.add = Some(range);
        }
        self
    }

    fn with_remove(mut self, range: Range<usize>) -> Self {
        if !range.is_empty() {
            self.remove = Some(range);
        }
        self
    }
}

/// Full description of one list mutation: index ranges plus the keys that
/// entered and left the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEdit {
    /// Affected index ranges.
    pub indices: IndexChange,
    /// Keys of inserted items, in list order.
    pub added: Vec<ItemKey>,
    /// Keys of removed items, in former list order.
    pub removed: Vec<ItemKey>,
}

impl ListEdit {
    /// An edit that replaces the item at `index` with itself, forcing only
    /// that item to be rendered again.
    #[must_use]
    pub fn refresh(index: usize, key: ItemKey) -> Self {
        Self {
            indices: IndexChange {
                add: Some(index..index + 1),
                remove: Some(index..index + 1),
            },
            added: vec![key],
            removed: vec![key],
        }
    }

    /// Whether the edit changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Ordered sequence with a parallel sequence of identity keys.
#[derive(Debug, Clone, Default)]
pub struct KeyedList {
    data: Vec<Value>,
    keys: Vec<ItemKey>,
    shallow: bool,
}

impl KeyedList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap plain values, minting one key per element.
    #[must_use]
    pub fn from_values(data: Vec<Value>) -> Self {
        let keys = data.iter().map(|_| ItemKey::fresh()).collect();
        Self {
            data,
            keys,
            shallow: false,
        }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the list has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data.get(index)
    }

    /// Mutable item at `index`. Replacing an item in place keeps its key.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.data.get_mut(index)
    }

    /// Key of the item at `index`.
    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<ItemKey> {
        self.keys.get(index).copied()
    }

    /// Current position of the item identified by `key`.
    #[must_use]
    pub fn position(&self, key: ItemKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    /// All items.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.data
    }

    /// All keys, parallel to [`values`](Self::values).
    #[must_use]
    pub fn keys(&self) -> &[ItemKey] {
        &self.keys
    }

    /// Iterate over items.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.data.iter()
    }

    /// Iterate over `(key, item)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (ItemKey, &Value)> {
        self.keys.iter().copied().zip(self.data.iter())
    }

    /// Whether reactive descent into the items is suppressed.
    #[must_use]
    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    /// Mark or unmark the list as shallow.
    pub fn set_shallow(&mut self, shallow: bool) {
        self.shallow = shallow;
    }

    /// Consume the list, returning its items.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.data
    }

    /// Append items at the tail.
    pub fn append(&mut self, items: impl IntoIterator<Item = Value>) -> ListEdit {
        let items: Vec<Value> = items.into_iter().collect();
        let start = self.data.len();
        let added: Vec<ItemKey> = items.iter().map(|_| ItemKey::fresh()).collect();
        self.keys.extend_from_slice(&added);
        let indices = IndexChange::default().with_add(start..start + items.len());
        self.data.extend(items);
        self.check();
        ListEdit {
            indices,
            added,
            removed: Vec::new(),
        }
    }

    /// Remove the last item.
    pub fn remove_last(&mut self) -> (Option<Value>, ListEdit) {
        let Some(key) = self.keys.pop() else {
            return (None, ListEdit::default());
        };
        let len = self.data.len();
        let indices = IndexChange::default().with_remove(len - 1..len);
        let item = self.data.pop();
        self.check();
        (
            item,
            ListEdit {
                indices,
                added: Vec::new(),
                removed: vec![key],
            },
        )
    }

    /// Remove the first item.
    pub fn remove_first(&mut self) -> (Option<Value>, ListEdit) {
        if self.keys.is_empty() {
            return (None, ListEdit::default());
        }
        let key = self.keys.remove(0);
        let indices = IndexChange::default().with_remove(0..1);
        let item = self.data.remove(0);
        self.check();
        (
            Some(item),
            ListEdit {
                indices,
                added: Vec::new(),
                removed: vec![key],
            },
        )
    }

    /// Insert items at the head, keeping their relative order.
    pub fn insert_first(&mut self, items: impl IntoIterator<Item = Value>) -> ListEdit {
        let items: Vec<Value> = items.into_iter().collect();
        let added: Vec<ItemKey> = items.iter().map(|_| ItemKey::fresh()).collect();
        self.keys.splice(0..0, added.iter().copied());
        let indices = IndexChange::default().with_add(0..items.len());
        self.data.splice(0..0, items);
        self.check();
        ListEdit {
            indices,
            added,
            removed: Vec::new(),
        }
    }

    /// Remove `remove_count` items at `start` (all remaining items when
    /// `None`) and insert `items` in their place.
    pub fn splice_at(
        &mut self,
        start: usize,
        remove_count: Option<usize>,
        items: impl IntoIterator<Item = Value>,
    ) -> (Vec<Value>, ListEdit) {
        let len = self.data.len();
        let start = start.min(len);
        let end = remove_count.map_or(len, |count| start.saturating_add(count).min(len));
        let items: Vec<Value> = items.into_iter().collect();
        let added: Vec<ItemKey> = items.iter().map(|_| ItemKey::fresh()).collect();
        let removed: Vec<ItemKey> = self.keys.splice(start..end, added.iter().copied()).collect();
        let indices = IndexChange::default()
            .with_remove(start..end)
            .with_add(start..start + items.len());
        let removed_items: Vec<Value> = self.data.splice(start..end, items).collect();
        self.check();
        (
            removed_items,
            ListEdit {
                indices,
                added,
                removed,
            },
        )
    }

    fn check(&self) {
        debug_assert_eq!(
            self.keys.len(),
            self.data.len(),
            "keyed list desync: {} keys for {} items",
            self.keys.len(),
            self.data.len()
        );
    }
}

impl PartialEq for KeyedList {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl From<Vec<Value>> for KeyedList {
    fn from(data: Vec<Value>) -> Self {
        Self::from_values(data)
    }
}

impl FromIterator<Value> for KeyedList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().collect())
    }
}
