#![forbid(unsafe_code)]

//! Registration scopes tied to a host node's lifetime.
//!
//! A [`Scope`] collects the routines registered through it. When the owner
//! node is destroyed, the host fires the scope's destroy hook and every
//! collected routine is forgotten, so UI torn down by the host stops
//! reacting to the store.
//!
//! # Usage
//!
//! ```ignore
//! let scope = engine.scope_to(panel);
//! scope.reactive(render_title, &[title]);
//! scope.reactive_list(render_row, &rows, &[]);
//!
//! host.destroy(panel); // both routines are forgotten
//! ```
//!
//! # Invariants
//!
//! 1. After the owner's destroy hook runs, no routine registered through
//!    the scope is invoked again, even if notifications are still queued.
//! 2. A closed scope registers nothing.
//! 3. Dropping the `Scope` value does not forget anything; only the owner's
//!    destruction does.
//! 4. [`Scope::len`] counts only routines the engine still knows; ids
//!    forgotten or disposed through the [`Engine`] directly are dropped.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Dead owner | `scope_to` on a destroyed or unknown handle | Scope starts closed, `warn!` |
//! | Owner destroyed mid-render | Initial render destroys its own owner | Routine forgotten, `None` returned |
//! | Engine dropped | Scope outlived its engine | Registrations return `None` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::engine::{Engine, ItemContext, RenderContext, Shared};
use crate::graph::RoutineId;
use crate::host::NodeHandle;
use crate::node::Node;
use crate::value::Value;

#[derive(Debug, Default)]
struct ScopeState {
    routines: RefCell<Vec<RoutineId>>,
    closed: Cell<bool>,
}

/// Registration facade bound to an owner node.
pub struct Scope {
    shared: Weak<Shared>,
    owner: NodeHandle,
    state: Rc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(shared: &Rc<Shared>, owner: NodeHandle) -> Self {
        let state = Rc::new(ScopeState::default());
        let weak_shared = Rc::downgrade(shared);
        let hook_state = Rc::clone(&state);
        let hook_shared = weak_shared.clone();
        let attached = shared.host.on_destroy(
            owner,
            Box::new(move || {
                hook_state.closed.set(true);
                let ids = std::mem::take(&mut *hook_state.routines.borrow_mut());
                let Some(shared) = hook_shared.upgrade() else {
                    return;
                };
                let mut graph = shared.graph.borrow_mut();
                let forgotten = ids.iter().filter(|id| graph.forget(**id).is_some()).count();
                debug!(owner = owner.id(), forgotten, "scope closed");
            }),
        );
        if !attached {
            warn!(owner = owner.id(), "scope owner is not alive; scope starts closed");
            state.closed.set(true);
        }
        Self {
            shared: weak_shared,
            owner,
            state,
        }
    }

    fn engine(&self) -> Option<Engine> {
        if self.state.closed.get() {
            return None;
        }
        self.shared.upgrade().map(Engine::from_shared)
    }

    /// Drop ids the engine no longer knows.
    fn prune(&self) {
        let mut routines = self.state.routines.borrow_mut();
        match self.shared.upgrade() {
            Some(shared) => {
                let graph = shared.graph.borrow();
                routines.retain(|id| graph.contains(*id));
            }
            None => routines.clear(),
        }
    }

    fn adopt(&self, engine: &Engine, id: RoutineId) -> Option<RoutineId> {
        if self.state.closed.get() {
            engine.forget(id);
            return None;
        }
        self.prune();
        self.state.routines.borrow_mut().push(id);
        Some(id)
    }

    /// Owner node.
    #[must_use]
    pub fn owner(&self) -> NodeHandle {
        self.owner
    }

    /// Whether the owner has been destroyed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    /// Number of live routines registered through this scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prune();
        self.state.routines.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root node of the store.
    #[must_use]
    pub fn state(&self) -> Option<Node> {
        self.shared.upgrade().map(|s| Engine::from_shared(s).state())
    }

    /// [`Engine::reactive`], forgotten with the owner.
    pub fn reactive<F>(&self, render: F, args: &[Node]) -> Option<RoutineId>
    where
        F: Fn(&RenderContext<'_>, &[Value]) + 'static,
    {
        let engine = self.engine()?;
        let id = engine.reactive(render, args);
        self.adopt(&engine, id)
    }

    /// [`Engine::reactive_list`], forgotten with the owner.
    pub fn reactive_list<F>(&self, render: F, list: &Node, args: &[Node]) -> Option<RoutineId>
    where
        F: Fn(&ItemContext<'_>, &[Value]) + 'static,
    {
        let engine = self.engine()?;
        let id = engine.reactive_list(render, list, args);
        self.adopt(&engine, id)
    }

    /// Forget one routine registered through this scope.
    pub fn forget(&self, id: RoutineId) -> bool {
        let mut routines = self.state.routines.borrow_mut();
        let Some(pos) = routines.iter().position(|r| *r == id) else {
            return false;
        };
        routines.remove(pos);
        drop(routines);
        self.shared
            .upgrade()
            .is_some_and(|s| Engine::from_shared(s).forget(id))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("owner", &self.owner)
            .field("routines", &self.len())
            .field("closed", &self.state.closed.get())
            .finish()
    }
}
