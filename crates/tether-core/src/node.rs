#![forbid(unsafe_code)]

//! Path lenses into an engine's store.
//!
//! A [`Node`] is an `(engine, path)` pair. It owns no data: every read
//! resolves the live value at the path, and every write goes through the
//! store, resynchronizes the mirror below the path and queues a
//! notification for the next [`Engine::flush`](crate::Engine::flush).
//!
//! ```
//! use tether_core::{Engine, Record, Value};
//!
//! let engine = Engine::headless(Record::new().with("user", Record::new().with("name", "ada")));
//! let name = engine.state().child("user").and_then(|u| u.child("name")).unwrap();
//! assert_eq!(name.path(), "user.name");
//!
//! let prev = name.set("grace").unwrap();
//! assert_eq!(prev, Value::from("ada"));
//! assert_eq!(name.get(), Some(Value::from("grace")));
//! assert_eq!(engine.pending(), 1);
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Stale node | Path no longer mirrored | Reads return `None`, writes `InvalidPath` |
//! | Engine dropped | Node outlived its engine | Reads return `None`, writes `Detached` |
//! | Empty list edit | Removal from `[]`, empty append | No notification |

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::engine::Shared;
use crate::error::StateError;
use crate::keyed::{KeyedList, ListEdit};
use crate::path::{derive_path, is_valid_key, split_last};
use crate::proxy::MirrorKind;
use crate::scheduler::Notification;
use crate::value::Value;

/// Handle to one location in an engine's store.
#[derive(Clone)]
pub struct Node {
    shared: Weak<Shared>,
    path: Rc<str>,
}

impl Node {
    pub(crate) fn new(shared: Weak<Shared>, path: impl Into<Rc<str>>) -> Self {
        Self {
            shared,
            path: path.into(),
        }
    }

    fn shared(&self) -> Result<Rc<Shared>, StateError> {
        self.shared.upgrade().ok_or(StateError::Detached)
    }

    /// Path of this node. The root is `""`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the path is currently mirrored (and so writable).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|s| s.store.borrow().tree().contains(&self.path))
    }

    /// Mirrored shape at the path.
    #[must_use]
    pub fn kind(&self) -> Option<MirrorKind> {
        let shared = self.shared.upgrade()?;
        let kind = shared.store.borrow().tree().kind(&self.path);
        kind
    }

    /// Copy of the live value.
    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.with(Value::clone)
    }

    /// Borrow the live value. `f` must not write to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> Option<R> {
        let shared = self.shared.upgrade()?;
        let store = shared.store.borrow();
        store.resolve(&self.path).map(f)
    }

    /// Child node, if `key` is mirrored below this one.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<Node> {
        let path = derive_path(&self.path, key);
        let shared = self.shared.upgrade()?;
        let mirrored = shared.store.borrow().tree().contains(&path);
        mirrored.then(|| Self::new(self.shared.clone(), path))
    }

    /// Child node for a list index.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<Node> {
        self.child(&index.to_string())
    }

    /// Child node without checking that it exists. Useful for registering
    /// on a path that will only appear later.
    #[must_use]
    pub fn at(&self, key: &str) -> Node {
        Self::new(self.shared.clone(), derive_path(&self.path, key))
    }

    /// Parent node. `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        let (parent, _) = split_last(&self.path)?;
        Some(Self::new(self.shared.clone(), parent))
    }

    /// Mirrored child keys, in store order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.shared
            .upgrade()
            .map(|s| s.store.borrow().tree().children(&self.path).to_vec())
            .unwrap_or_default()
    }

    /// Length of the list at the path.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.with(|v| v.as_list().map(KeyedList::len)).flatten()
    }

    /// Replace the value, returning the previous one.
    pub fn set(&self, value: impl Into<Value>) -> Result<Value, StateError> {
        let shared = self.shared()?;
        let prev = shared.store.borrow_mut().assign(&self.path, value.into())?;
        shared.schedule(Notification::set(&*self.path, Some(prev.clone())));
        Ok(prev)
    }

    /// Read-modify-write of the value. This is the way to change the
    /// contents of a shallow container.
    ///
    /// `f` edits a copy, so it may read the engine; the copy is then
    /// written back like [`set`](Self::set), replacing anything `f` itself
    /// wrote at this path.
    pub fn update(&self, f: impl FnOnce(&mut Value)) -> Result<(), StateError> {
        let shared = self.shared()?;
        let mut value = shared.store.borrow().writable_value(&self.path)?;
        f(&mut value);
        let prev = shared.store.borrow_mut().assign(&self.path, value)?;
        shared.schedule(Notification::set(&*self.path, Some(prev)));
        Ok(())
    }

    /// Insert or replace `key` in the record at the path. The notification
    /// is for the child path.
    pub fn insert(&self, key: &str, value: impl Into<Value>) -> Result<Option<Value>, StateError> {
        if !is_valid_key(key) {
            return Err(StateError::InvalidKey {
                path: self.path.to_string(),
                key: key.to_owned(),
            });
        }
        let shared = self.shared()?;
        let value = value.into();
        let prev = shared
            .store
            .borrow_mut()
            .edit_record(&self.path, |record| record.insert(key, value))?;
        shared.schedule(Notification::set(derive_path(&self.path, key), prev.clone()));
        Ok(prev)
    }

    /// Remove `key` from the record at the path. Removing an absent key
    /// changes nothing and notifies nobody.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, StateError> {
        let shared = self.shared()?;
        let prev = shared
            .store
            .borrow_mut()
            .edit_record(&self.path, |record| record.remove(key))?;
        if prev.is_some() {
            shared.schedule(Notification::set(derive_path(&self.path, key), prev.clone()));
        }
        Ok(prev)
    }

    /// Call the function stored at the path.
    pub fn call(&self, args: &[Value]) -> Result<Value, StateError> {
        let shared = self.shared()?;
        let function = {
            let store = shared.store.borrow();
            let value = store
                .resolve(&self.path)
                .ok_or_else(|| StateError::InvalidPath(self.path.to_string()))?;
            value
                .as_function()
                .cloned()
                .ok_or_else(|| StateError::NotAFunction(self.path.to_string()))?
        };
        Ok(function.call(args))
    }

    /// Append items to the list at the path.
    pub fn append<I>(&self, items: I) -> Result<(), StateError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.edit_list(|list| ((), list.append(items)))
    }

    /// Remove and return the last item.
    pub fn remove_last(&self) -> Result<Option<Value>, StateError> {
        self.edit_list(KeyedList::remove_last)
    }

    /// Remove and return the first item.
    pub fn remove_first(&self) -> Result<Option<Value>, StateError> {
        self.edit_list(KeyedList::remove_first)
    }

    /// Insert items at the head of the list.
    pub fn insert_first<I>(&self, items: I) -> Result<(), StateError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.edit_list(|list| ((), list.insert_first(items)))
    }

    /// Remove `remove_count` items at `start` (the rest of the list when
    /// `None`), insert `items` there, and return the removed items.
    pub fn splice_at<I>(
        &self,
        start: usize,
        remove_count: Option<usize>,
        items: I,
    ) -> Result<Vec<Value>, StateError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.edit_list(|list| list.splice_at(start, remove_count, items))
    }

    fn edit_list<R>(
        &self,
        op: impl FnOnce(&mut KeyedList) -> (R, ListEdit),
    ) -> Result<R, StateError> {
        let shared = self.shared()?;
        let (out, edit) = shared.store.borrow_mut().edit_list(&self.path, op)?;
        if edit.is_empty() {
            trace!(path = %self.path, "empty list edit; not notifying");
        } else {
            shared.schedule(Notification::list(&*self.path, edit));
        }
        Ok(out)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && Weak::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &&*self.path)
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}
