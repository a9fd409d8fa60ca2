#![forbid(unsafe_code)]

//! Canonical path notation for store locations.
//!
//! A path is built by appending segments to a parent path: named keys become
//! `.name` (or `name` at the root) and index keys become `[n]`. A key made
//! only of ASCII digits is always an index, never a name, so the parser in
//! [`segments`] recovers exactly the segments [`derive_path`] produced.
//!
//! ```
//! use tether_core::path::{derive_path, prefixes};
//!
//! let tabs = derive_path("", "tabs");
//! let third = derive_path(&tabs, "2");
//! let name = derive_path(&third, "name");
//! assert_eq!(name, "tabs[2].name");
//! assert_eq!(prefixes(&name).collect::<Vec<_>>(), ["tabs", "tabs[2]", "tabs[2].name"]);
//! ```
//!
//! # Invariants
//!
//! 1. The root path is the empty string.
//! 2. `prefixes(p)` yields one entry per segment, shallowest first, and the
//!    last entry is `p` itself.
//! 3. Keys rejected by [`is_valid_key`] are never turned into paths by the
//!    store; they would make segment boundaries ambiguous.

/// Whether `key` addresses an index (a non-empty run of ASCII digits).
#[must_use]
pub fn is_index(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `key` can be embedded in a path without ambiguity.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '[', ']'])
}

/// Append `key` to `parent`.
#[must_use]
pub fn derive_path(parent: &str, key: &str) -> String {
    if is_index(key) {
        format!("{parent}[{key}]")
    } else if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}.{key}")
    }
}

/// One parsed path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A named property (`.name`).
    Name(&'a str),
    /// An index (`[n]`), kept as the raw digit string.
    Index(&'a str),
}

impl<'a> Segment<'a> {
    /// The key text of the segment.
    #[must_use]
    pub fn key(self) -> &'a str {
        match self {
            Self::Name(key) | Self::Index(key) => key,
        }
    }

    /// The numeric value of an index segment.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Index(digits) => digits.parse().ok(),
            Self::Name(_) => None,
        }
    }
}

/// Iterator over the segments of a path.
///
/// Yields each segment together with the byte offset where the prefix ending
/// in that segment stops. Parsing stops at the first malformed index segment.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    path: &'a str,
    pos: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = (Segment<'a>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.path.get(self.pos..).filter(|r| !r.is_empty())?;
        if let Some(inner) = rest.strip_prefix('[') {
            let close = inner.find(']')?;
            let start = self.pos + 1;
            self.pos = start + close + 1;
            return Some((Segment::Index(&self.path[start..start + close]), self.pos));
        }
        let start = if rest.starts_with('.') {
            self.pos + 1
        } else {
            self.pos
        };
        let end = self.path[start..]
            .find(['.', '['])
            .map_or(self.path.len(), |i| start + i);
        self.pos = end;
        Some((Segment::Name(&self.path[start..end]), end))
    }
}

/// Parse `path` into its segments.
#[must_use]
pub fn segments(path: &str) -> Segments<'_> {
    Segments { path, pos: 0 }
}

/// Every complete-segment prefix of `path`, shallowest first.
pub fn prefixes(path: &str) -> impl Iterator<Item = &str> + '_ {
    segments(path).map(move |(_, end)| &path[..end])
}

/// Split off the last segment, returning the parent path and that segment.
#[must_use]
pub fn split_last(path: &str) -> Option<(&str, Segment<'_>)> {
    let mut parent_end = 0;
    let mut last = None;
    for (segment, end) in segments(path) {
        if let Some((_, prev_end)) = last {
            parent_end = prev_end;
        }
        last = Some((segment, end));
    }
    let (segment, _) = last?;
    Some((&path[..parent_end], segment))
}

/// Whether `path` lies strictly below `ancestor` on a segment boundary.
#[must_use]
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && matches!(path.as_bytes()[ancestor.len()], b'.' | b'[')
}
