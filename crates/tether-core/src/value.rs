#![forbid(unsafe_code)]

//! Tagged store values.
//!
//! The backing store is a tree of [`Value`]s. Composite values are
//! [`Record`]s (string-keyed, insertion ordered) and [`KeyedList`]s. Either
//! can be marked *shallow*, which stops the proxy tree from mirroring its
//! children: the container is then observed as a single opaque leaf.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::keyed::KeyedList;
use crate::path::{Segment, segments};

/// A callable leaf stored in the tree.
///
/// Functions are exposed read-through: they can be resolved and called, but
/// not replaced through their own node.
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(&[Value]) -> Value>);

impl Function {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// String-keyed mapping that preserves insertion order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    entries: IndexMap<String, Value>,
    shallow: bool,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Mutable value stored under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove `key`, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether reactive descent into the entries is suppressed.
    #[must_use]
    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    /// Mark or unmark the record as shallow.
    pub fn set_shallow(&mut self, shallow: bool) {
        self.shallow = shallow;
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            shallow: false,
        }
    }
}

/// One location's content in the backing store.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent or explicitly empty.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Record(Record),
    List(KeyedList),
    Function(Function),
}

/// Coarse shape of a value, as observed by the proxy tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Record,
    List,
    Function,
}

impl Value {
    /// Shape of the value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Record(_) => ValueKind::Record,
            Self::List(_) => ValueKind::List,
            Self::Function(_) => ValueKind::Function,
        }
    }

    /// Whether the value has children (record or list).
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Record(_) | Self::List(_))
    }

    /// Whether the value is a container marked shallow.
    #[must_use]
    pub fn is_shallow(&self) -> bool {
        match self {
            Self::Record(r) => r.is_shallow(),
            Self::List(l) => l.is_shallow(),
            _ => false,
        }
    }

    /// Mark a container as shallow. Leaves are returned unchanged.
    #[must_use]
    pub fn shallow(mut self) -> Self {
        match &mut self {
            Self::Record(r) => r.set_shallow(true),
            Self::List(l) => l.set_shallow(true),
            _ => {}
        }
        self
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&KeyedList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut KeyedList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Child addressed by one path segment.
    ///
    /// Index segments address list items and digit-named record keys alike.
    #[must_use]
    pub fn child(&self, segment: Segment<'_>) -> Option<&Value> {
        match (self, segment) {
            (Self::Record(r), segment) => r.get(segment.key()),
            (Self::List(l), Segment::Index(_)) => l.get(segment.index()?),
            _ => None,
        }
    }

    /// Mutable child addressed by one path segment.
    pub fn child_mut(&mut self, segment: Segment<'_>) -> Option<&mut Value> {
        match (self, segment) {
            (Self::Record(r), segment) => r.get_mut(segment.key()),
            (Self::List(l), Segment::Index(_)) => l.get_mut(segment.index()?),
            _ => None,
        }
    }

    /// Resolve a path below this value. The empty path resolves to `self`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        segments(path).try_fold(self, |value, (segment, _)| value.child(segment))
    }

    /// Mutable variant of [`resolve`](Self::resolve).
    pub fn resolve_mut(&mut self, path: &str) -> Option<&mut Value> {
        segments(path).try_fold(self, |value, (segment, _)| value.child_mut(segment))
    }
}

/// Mark a value as shallow (see [`Value::shallow`]).
#[must_use]
pub fn shallow(value: impl Into<Value>) -> Value {
    value.into().shallow()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Record(r) => {
                f.write_str("{")?;
                for (i, (k, v)) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Function(_) => f.write_str("<function>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize, f32);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

/// Keeps the list's existing keys; wrapping is idempotent.
impl From<KeyedList> for Value {
    fn from(l: KeyedList) -> Self {
        Self::List(l)
    }
}

/// Mints a fresh key per element.
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(KeyedList::from_values(items))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
