#![forbid(unsafe_code)]

//! Errors surfaced by store access through [`Node`](crate::Node).
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unmirrored path | Write through a typo'd or stale path | `InvalidPath` |
//! | Bad key | Key contains `.`, `[`, `]` or is empty | `InvalidKey` |
//! | Function node written | Function leaves are read-through | `ReadOnly` |
//! | Wrong container | List op on a non-list, insert on a non-record | `NotAList` / `NotARecord` |
//! | Engine dropped | Node outlived its engine | `Detached` |
//!
//! Registration on an unresolvable path is not an error: the registration
//! simply never fires until that path is written.

use std::fmt;

/// Errors from store reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// No live reactive node exists at the path.
    InvalidPath(String),
    /// A key that cannot be expressed in path notation.
    InvalidKey { path: String, key: String },
    /// The node is read-through (a function leaf).
    ReadOnly(String),
    /// The value at the path is not a list.
    NotAList(String),
    /// The value at the path is not a record.
    NotARecord(String),
    /// The value at the path is not a function.
    NotAFunction(String),
    /// The engine owning the node has been dropped.
    Detached,
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPath(p) => write!(f, "no reactive node at '{}'", display_path(p)),
            Self::InvalidKey { path, key } => {
                write!(f, "key '{key}' under '{}' cannot be addressed", display_path(path))
            }
            Self::ReadOnly(p) => write!(f, "node '{}' is read-only", display_path(p)),
            Self::NotAList(p) => write!(f, "value at '{}' is not a list", display_path(p)),
            Self::NotARecord(p) => write!(f, "value at '{}' is not a record", display_path(p)),
            Self::NotAFunction(p) => {
                write!(f, "value at '{}' is not a function", display_path(p))
            }
            Self::Detached => write!(f, "engine has been dropped"),
        }
    }
}

impl std::error::Error for StateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_root() {
        assert_eq!(
            StateError::InvalidPath(String::new()).to_string(),
            "no reactive node at '<root>'"
        );
        assert_eq!(
            StateError::NotAList("user".into()).to_string(),
            "value at 'user' is not a list"
        );
    }
}
