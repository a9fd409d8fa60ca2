#![forbid(unsafe_code)]

//! Path-keyed registry of render routines.
//!
//! A [`DependencyGraph`] maps each registered path to the routines that
//! declared it. A lookup for a written path returns the routines registered
//! on the path itself, on every ancestor prefix (the root included), and,
//! optionally, on every descendant path.
//!
//! # Invariants
//!
//! 1. A routine appears at most once in a lookup result, at its first match.
//! 2. Ancestor matches come shallowest first, then the exact path, then
//!    descendants in path order. Within a path, registration order holds.
//! 3. After `forget`, a routine is absent from every path it was registered
//!    under.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::rc::Rc;

use crate::path::{Segment, is_descendant, segments};

/// Identifier of a registered render routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutineId(u64);

impl RoutineId {
    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// How a registration path relates to the written path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Registered on the written path itself.
    Exact,
    /// Registered on an ancestor. `item` is set when the next segment below
    /// the ancestor is an index, naming the list item that changed.
    Ancestor { item: Option<usize> },
    /// Registered below the written path.
    Descendant,
}

/// One routine matched by a lookup.
#[derive(Debug)]
pub struct Match<E> {
    pub id: RoutineId,
    pub entry: Rc<E>,
    /// Registration path that matched.
    pub path: String,
    pub relation: Relation,
}

#[derive(Debug)]
struct Registered<E> {
    entry: Rc<E>,
    paths: Vec<String>,
}

/// Registry of routines by dependency path.
#[derive(Debug)]
pub struct DependencyGraph<E> {
    by_path: BTreeMap<String, Vec<RoutineId>>,
    routines: HashMap<RoutineId, Registered<E>>,
    next_id: u64,
}

impl<E> Default for DependencyGraph<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> DependencyGraph<E> {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_path: BTreeMap::new(),
            routines: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register `entry` under each of `paths` (duplicates collapse).
    pub fn register(&mut self, paths: Vec<String>, entry: E) -> RoutineId {
        let id = RoutineId(self.next_id);
        self.next_id += 1;
        let mut unique: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        for path in &unique {
            self.by_path.entry(path.clone()).or_default().push(id);
        }
        self.routines.insert(
            id,
            Registered {
                entry: Rc::new(entry),
                paths: unique,
            },
        );
        id
    }

    /// Remove a routine from every path, returning its entry.
    pub fn forget(&mut self, id: RoutineId) -> Option<Rc<E>> {
        let registered = self.routines.remove(&id)?;
        for path in &registered.paths {
            if let Some(ids) = self.by_path.get_mut(path) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_path.remove(path);
                }
            }
        }
        Some(registered.entry)
    }

    /// Whether the routine is still registered.
    #[must_use]
    pub fn contains(&self, id: RoutineId) -> bool {
        self.routines.contains_key(&id)
    }

    /// Entry of a registered routine.
    #[must_use]
    pub fn get(&self, id: RoutineId) -> Option<Rc<E>> {
        self.routines.get(&id).map(|r| Rc::clone(&r.entry))
    }

    /// Paths a routine is registered under.
    #[must_use]
    pub fn paths_of(&self, id: RoutineId) -> Option<&[String]> {
        self.routines.get(&id).map(|r| r.paths.as_slice())
    }

    /// Number of routines registered directly on `path`.
    #[must_use]
    pub fn registrations_at(&self, path: &str) -> usize {
        self.by_path.get(path).map_or(0, Vec::len)
    }

    /// Number of registered routines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Routines affected by a write at `path`.
    #[must_use]
    pub fn lookup(&self, path: &str, descendants: bool) -> Vec<Match<E>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        // Ancestors: the root, then each proper prefix of `path`.
        let mut prefix_end = 0;
        for (segment, end) in segments(path) {
            let item = match segment {
                Segment::Index(_) => segment.index(),
                Segment::Name(_) => None,
            };
            self.collect(
                &path[..prefix_end],
                Relation::Ancestor { item },
                &mut seen,
                &mut out,
            );
            prefix_end = end;
        }
        self.collect(path, Relation::Exact, &mut seen, &mut out);

        if descendants {
            let below = self
                .by_path
                .range::<str, _>((Bound::Excluded(path), Bound::Unbounded))
                .take_while(|(p, _)| p.starts_with(path))
                .filter(|(p, _)| is_descendant(p, path))
                .map(|(p, _)| p.clone())
                .collect::<Vec<_>>();
            for p in below {
                self.collect(&p, Relation::Descendant, &mut seen, &mut out);
            }
        }
        out
    }

    fn collect(
        &self,
        path: &str,
        relation: Relation,
        seen: &mut HashSet<RoutineId>,
        out: &mut Vec<Match<E>>,
    ) {
        let Some(ids) = self.by_path.get(path) else {
            return;
        };
        for id in ids {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(registered) = self.routines.get(id) {
                out.push(Match {
                    id: *id,
                    entry: Rc::clone(&registered.entry),
                    path: path.to_owned(),
                    relation,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(matches: &[Match<&'static str>]) -> Vec<&'static str> {
        matches.iter().map(|m| *m.entry).collect()
    }

    #[test]
    fn lookup_walks_prefixes() {
        let mut g = DependencyGraph::new();
        g.register(vec!["user.name".into()], "name");
        g.register(vec!["user".into()], "user");
        g.register(vec!["user.age".into()], "age");
        let hits = g.lookup("user.name", true);
        assert_eq!(ids(&hits), ["user", "name"]);
        assert_eq!(hits[0].relation, Relation::Ancestor { item: None });
        assert_eq!(hits[1].relation, Relation::Exact);
    }

    #[test]
    fn index_segments_mark_changed_item() {
        let mut g = DependencyGraph::new();
        g.register(vec!["tabs".into()], "tabs");
        let hits = g.lookup("tabs[2].name", false);
        assert_eq!(hits[0].relation, Relation::Ancestor { item: Some(2) });
    }

    #[test]
    fn root_registrations_see_everything() {
        let mut g = DependencyGraph::new();
        g.register(vec![String::new()], "root");
        assert_eq!(ids(&g.lookup("a.b", false)), ["root"]);
        assert_eq!(g.lookup("", false)[0].relation, Relation::Exact);
    }

    #[test]
    fn descendants_are_optional() {
        let mut g = DependencyGraph::new();
        g.register(vec!["user.name".into()], "name");
        g.register(vec!["username".into()], "other");
        assert!(g.lookup("user", false).is_empty());
        let hits = g.lookup("user", true);
        assert_eq!(ids(&hits), ["name"]);
        assert_eq!(hits[0].relation, Relation::Descendant);
    }

    #[test]
    fn routine_matches_once() {
        let mut g = DependencyGraph::new();
        g.register(vec!["a".into(), "a.b".into()], "both");
        assert_eq!(g.lookup("a.b", true).len(), 1);
    }

    #[test]
    fn forget_removes_every_path() {
        let mut g = DependencyGraph::new();
        let id = g.register(vec!["a".into(), "b".into()], "x");
        assert!(g.contains(id));
        assert_eq!(g.paths_of(id).map(<[String]>::len), Some(2));
        assert!(g.forget(id).is_some());
        assert!(!g.contains(id));
        assert_eq!(g.registrations_at("a"), 0);
        assert!(g.lookup("b", true).is_empty());
        assert!(g.forget(id).is_none());
    }

    #[test]
    fn duplicate_paths_collapse() {
        let mut g = DependencyGraph::new();
        let id = g.register(vec!["a".into(), "a".into()], "x");
        assert_eq!(g.registrations_at("a"), 1);
        assert_eq!(g.paths_of(id).map(<[String]>::len), Some(1));
    }
}
