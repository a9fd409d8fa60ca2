#![forbid(unsafe_code)]

//! Mirror of the backing store, one entry per reachable path.
//!
//! The [`ProxyTree`] records, for every path a [`Node`](crate::Node) may
//! write through, what shape of value lives there and which child keys were
//! mirrored below it. It is rebuilt for a subtree after every write, so a
//! location that changes from record to number loses its mirrored children,
//! and a record that loses a key loses that child's entry.
//!
//! # Invariants
//!
//! 1. Every mirrored path resolves in the backing store.
//! 2. Children of shallow containers and of leaves are never mirrored.
//! 3. Synchronization is iterative (explicit stack), so deep trees do not
//!    grow the call stack.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::StateError;
use crate::keyed::{ItemKey, KeyedList, ListEdit};
use crate::path::{derive_path, is_valid_key, segments};
use crate::value::{Record, Value};

/// Shape of a mirrored location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorKind {
    /// Primitive value; no children.
    Leaf,
    /// Record whose entries are mirrored.
    Record,
    /// List whose items are mirrored.
    List,
    /// Read-through function leaf.
    Function,
    /// Container marked shallow; observed as a whole.
    Shallow,
}

impl MirrorKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Record(r) if r.is_shallow() => Self::Shallow,
            Value::List(l) if l.is_shallow() => Self::Shallow,
            Value::Record(_) => Self::Record,
            Value::List(_) => Self::List,
            Value::Function(_) => Self::Function,
            _ => Self::Leaf,
        }
    }
}

#[derive(Debug, Clone)]
struct Mirror {
    kind: MirrorKind,
    children: Vec<String>,
}

/// Path-indexed mirror of the store.
#[derive(Debug, Default)]
pub struct ProxyTree {
    entries: HashMap<String, Mirror>,
}

impl ProxyTree {
    /// Create an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is mirrored.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Shape recorded for `path`.
    #[must_use]
    pub fn kind(&self, path: &str) -> Option<MirrorKind> {
        self.entries.get(path).map(|m| m.kind)
    }

    /// Mirrored child keys of `path`, in store order.
    #[must_use]
    pub fn children(&self, path: &str) -> &[String] {
        self.entries
            .get(path)
            .map(|m| m.children.as_slice())
            .unwrap_or_default()
    }

    /// Number of mirrored paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bring the subtree at `path` in line with `value`.
    pub fn sync(&mut self, value: &Value, path: &str) {
        let mut stack: Vec<(&Value, String)> = vec![(value, path.to_owned())];
        while let Some((value, path)) = stack.pop() {
            let kind = MirrorKind::of(value);
            let children: Vec<(String, &Value)> = match (kind, value) {
                (MirrorKind::Record, Value::Record(r)) => r
                    .iter()
                    .filter(|(key, _)| {
                        let valid = is_valid_key(key);
                        if !valid {
                            warn!(path = %path, key = %key, "skipping key that cannot be addressed by path");
                        }
                        valid
                    })
                    .map(|(key, child)| (key.clone(), child))
                    .collect(),
                (MirrorKind::List, Value::List(l)) => l
                    .iter()
                    .enumerate()
                    .map(|(i, child)| (i.to_string(), child))
                    .collect(),
                _ => Vec::new(),
            };

            let stale: Vec<String> = match self.entries.get(&path) {
                Some(mirror) if !mirror.children.is_empty() => {
                    let live: HashSet<&str> = children.iter().map(|(k, _)| k.as_str()).collect();
                    mirror
                        .children
                        .iter()
                        .filter(|k| !live.contains(k.as_str()))
                        .cloned()
                        .collect()
                }
                _ => Vec::new(),
            };
            for key in stale {
                self.prune(&derive_path(&path, &key));
            }

            let keys = children.iter().map(|(k, _)| k.clone()).collect();
            for (key, child) in children {
                stack.push((child, derive_path(&path, &key)));
            }
            self.entries.insert(
                path,
                Mirror {
                    kind,
                    children: keys,
                },
            );
        }
    }

    /// Drop the entry at `path` and everything mirrored below it.
    pub fn prune(&mut self, path: &str) {
        let mut stack = vec![path.to_owned()];
        while let Some(path) = stack.pop() {
            if let Some(mirror) = self.entries.remove(&path) {
                stack.extend(mirror.children.iter().map(|k| derive_path(&path, k)));
            }
        }
    }
}

/// Backing store plus its mirror. Every write goes through here.
#[derive(Debug)]
pub(crate) struct Store {
    root: Value,
    tree: ProxyTree,
}

impl Store {
    pub(crate) fn new(root: Value) -> Self {
        let mut tree = ProxyTree::new();
        tree.sync(&root, "");
        Self { root, tree }
    }

    pub(crate) fn root(&self) -> &Value {
        &self.root
    }

    pub(crate) fn tree(&self) -> &ProxyTree {
        &self.tree
    }

    pub(crate) fn resolve(&self, path: &str) -> Option<&Value> {
        self.root.resolve(path)
    }

    fn resync(&mut self, path: &str) {
        match self.root.resolve(path) {
            Some(value) => self.tree.sync(value, path),
            None => self.tree.prune(path),
        }
    }

    fn writable(&self, path: &str) -> Result<(), StateError> {
        match self.tree.kind(path) {
            None => Err(StateError::InvalidPath(path.to_owned())),
            Some(MirrorKind::Function) => Err(StateError::ReadOnly(path.to_owned())),
            Some(_) => Ok(()),
        }
    }

    fn slot(&mut self, path: &str) -> Result<&mut Value, StateError> {
        self.root
            .resolve_mut(path)
            .ok_or_else(|| StateError::InvalidPath(path.to_owned()))
    }

    /// Replace the value at `path`, returning the previous value.
    pub(crate) fn assign(&mut self, path: &str, value: Value) -> Result<Value, StateError> {
        self.writable(path)?;
        let prev = std::mem::replace(self.slot(path)?, value);
        self.resync(path);
        Ok(prev)
    }

    /// Copy of the value at `path`, if a write there would be accepted.
    pub(crate) fn writable_value(&self, path: &str) -> Result<Value, StateError> {
        self.writable(path)?;
        self.resolve(path)
            .cloned()
            .ok_or_else(|| StateError::InvalidPath(path.to_owned()))
    }

    /// Keys of the list items `path` passes through, paired with the path
    /// of each list.
    pub(crate) fn item_keys(&self, path: &str) -> Vec<(String, ItemKey)> {
        let mut out = Vec::new();
        let mut value = &self.root;
        let mut parent_end = 0;
        for (segment, end) in segments(path) {
            if let (Value::List(list), Some(index)) = (value, segment.index()) {
                if let Some(key) = list.key_at(index) {
                    out.push((path[..parent_end].to_owned(), key));
                }
            }
            let Some(child) = value.child(segment) else {
                break;
            };
            value = child;
            parent_end = end;
        }
        out
    }

    /// Run `f` against the record at `path`.
    pub(crate) fn edit_record<R>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut Record) -> R,
    ) -> Result<R, StateError> {
        self.writable(path)?;
        let record = self
            .slot(path)?
            .as_record_mut()
            .ok_or_else(|| StateError::NotARecord(path.to_owned()))?;
        let out = f(record);
        self.resync(path);
        Ok(out)
    }

    /// Run a keyed list operation against the list at `path`.
    pub(crate) fn edit_list<R>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut KeyedList) -> (R, ListEdit),
    ) -> Result<(R, ListEdit), StateError> {
        self.writable(path)?;
        let list = self
            .slot(path)?
            .as_list_mut()
            .ok_or_else(|| StateError::NotAList(path.to_owned()))?;
        let out = f(list);
        self.resync(path);
        Ok(out)
    }
}
