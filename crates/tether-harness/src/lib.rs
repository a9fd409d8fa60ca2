#![forbid(unsafe_code)]

//! In-memory node host for driving tether engines in tests and demos.
//!
//! [`MemoryHost`] keeps a tree of tagged nodes with optional text and
//! attributes. It implements [`Host`], so render routines build nodes with
//! [`MemoryHost::build`], attach them with [`MemoryHost::mount`], and the
//! engine tracks and destroys what they produced.
//!
//! ```
//! use std::rc::Rc;
//! use tether_core::{Engine, Host, Record};
//! use tether_harness::{MemoryHost, NodeSpec};
//!
//! let host = Rc::new(MemoryHost::new());
//! let root = host.root();
//! let engine = Engine::new(Record::new().with("title", "hi"), Rc::clone(&host) as Rc<dyn Host>);
//!
//! let h = Rc::clone(&host);
//! let title = engine.state().child("title").unwrap();
//! engine.reactive(
//!     move |_, args| {
//!         let node = h.build(NodeSpec::new("h1").text(args[0].to_string()));
//!         h.mount(node, root).unwrap();
//!     },
//!     &[title.clone()],
//! );
//!
//! title.set("bye").unwrap();
//! engine.flush();
//! assert_eq!(host.child_texts(root), ["bye"]);
//! ```
//!
//! # Invariants
//!
//! 1. Every node created while a watch is open is reported by that watch
//!    and by every enclosing watch.
//! 2. While an insertion anchor is active, mounting into the anchor's
//!    parent places the node immediately before the anchor.
//! 3. Destroying a node destroys its subtree first, then unmounts it; each
//!    node's destroy hooks run once.
//! 4. No internal borrow is held while lifecycle callbacks run.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown handle | Handle never built or already destroyed | `HostError::InvalidHandle` (mount), no-op (destroy) |
//! | Double mount | Node already has a parent | `HostError::AlreadyMounted` |
//! | Bad target | Target is the node itself or one of its descendants | `HostError::InvalidTarget` |

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tether_core::{Host, NodeHandle, WatchId};
use tracing::trace;

/// Lifecycle events reported by [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Build,
    BeforeMount,
    Mount,
    BeforeUnmount,
    Unmount,
    BeforeDestroy,
    Destroy,
}

/// Errors from tree operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// The handle does not name a live node.
    InvalidHandle(NodeHandle),
    /// The node already has a parent.
    AlreadyMounted(NodeHandle),
    /// The node has no parent.
    NotMounted(NodeHandle),
    /// Mounting would create a cycle.
    InvalidTarget { node: NodeHandle, target: NodeHandle },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle(h) => write!(f, "no live node with handle {}", h.id()),
            Self::AlreadyMounted(h) => write!(f, "node {} is already mounted", h.id()),
            Self::NotMounted(h) => write!(f, "node {} is not mounted", h.id()),
            Self::InvalidTarget { node, target } => {
                write!(f, "cannot mount node {} into {}", node.id(), target.id())
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Declarative description of one node and its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSpec {
    tag: String,
    text: Option<String>,
    attrs: Vec<(String, String)>,
    children: Vec<NodeSpec>,
}

impl NodeSpec {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<NodeSpec>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// A text-only `span`.
impl From<&str> for NodeSpec {
    fn from(text: &str) -> Self {
        Self::new("span").text(text)
    }
}

#[derive(Debug)]
struct MemNode {
    tag: String,
    text: Option<String>,
    attrs: Vec<(String, String)>,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

type Callback = Rc<dyn Fn(Lifecycle, NodeHandle)>;

#[derive(Default)]
struct Tree {
    nodes: HashMap<NodeHandle, MemNode>,
    watches: Vec<(WatchId, Vec<NodeHandle>)>,
    anchors: Vec<NodeHandle>,
    listeners: HashMap<NodeHandle, Vec<(Lifecycle, Callback)>>,
    global: Vec<(Lifecycle, Callback)>,
    destroy_hooks: HashMap<NodeHandle, Vec<Box<dyn FnOnce()>>>,
    events: Vec<(Lifecycle, NodeHandle)>,
}

/// In-memory node tree implementing [`Host`].
pub struct MemoryHost {
    tree: RefCell<Tree>,
    next_id: Cell<u64>,
    root: NodeHandle,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create a host with a single `root` node.
    #[must_use]
    pub fn new() -> Self {
        let root = NodeHandle::new(1);
        let mut tree = Tree::default();
        tree.nodes.insert(
            root,
            MemNode {
                tag: "root".into(),
                text: None,
                attrs: Vec::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            tree: RefCell::new(tree),
            next_id: Cell::new(2),
            root,
        }
    }

    /// The always-present root node.
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    fn mint(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Build an unmounted node (and its children) from `spec`.
    pub fn build(&self, spec: impl Into<NodeSpec>) -> NodeHandle {
        let spec = spec.into();
        let mut built = Vec::new();
        let handle = self.build_into(&spec, None, &mut built);
        for h in built {
            self.emit(Lifecycle::Build, h);
        }
        handle
    }

    fn build_into(
        &self,
        spec: &NodeSpec,
        parent: Option<NodeHandle>,
        built: &mut Vec<NodeHandle>,
    ) -> NodeHandle {
        let handle = NodeHandle::new(self.mint());
        {
            let mut tree = self.tree.borrow_mut();
            tree.nodes.insert(
                handle,
                MemNode {
                    tag: spec.tag.clone(),
                    text: spec.text.clone(),
                    attrs: spec.attrs.clone(),
                    parent,
                    children: Vec::new(),
                },
            );
            for (_, seen) in &mut tree.watches {
                seen.push(handle);
            }
        }
        built.push(handle);
        for child in &spec.children {
            let c = self.build_into(child, Some(handle), built);
            if let Some(node) = self.tree.borrow_mut().nodes.get_mut(&handle) {
                node.children.push(c);
            }
        }
        handle
    }

    /// Append `node` to `target`'s children, or place it before the active
    /// insertion anchor when `target` is the anchor's parent.
    pub fn mount(&self, node: NodeHandle, target: NodeHandle) -> Result<(), HostError> {
        {
            let tree = self.tree.borrow();
            let n = tree.nodes.get(&node).ok_or(HostError::InvalidHandle(node))?;
            if !tree.nodes.contains_key(&target) {
                return Err(HostError::InvalidHandle(target));
            }
            if n.parent.is_some() {
                return Err(HostError::AlreadyMounted(node));
            }
            if tree.is_self_or_ancestor(node, target) {
                return Err(HostError::InvalidTarget { node, target });
            }
        }
        self.emit(Lifecycle::BeforeMount, node);
        {
            let mut tree = self.tree.borrow_mut();
            let anchor = tree
                .anchors
                .last()
                .copied()
                .filter(|a| tree.nodes.get(a).and_then(|n| n.parent) == Some(target));
            let Some(parent) = tree.nodes.get_mut(&target) else {
                return Err(HostError::InvalidHandle(target));
            };
            let pos = anchor
                .and_then(|a| parent.children.iter().position(|c| *c == a))
                .unwrap_or(parent.children.len());
            parent.children.insert(pos, node);
            if let Some(n) = tree.nodes.get_mut(&node) {
                n.parent = Some(target);
            }
        }
        self.emit(Lifecycle::Mount, node);
        Ok(())
    }

    /// Detach `node` from its parent, keeping it alive.
    pub fn unmount(&self, node: NodeHandle) -> Result<(), HostError> {
        let parent = {
            let tree = self.tree.borrow();
            let n = tree.nodes.get(&node).ok_or(HostError::InvalidHandle(node))?;
            n.parent.ok_or(HostError::NotMounted(node))?
        };
        self.emit(Lifecycle::BeforeUnmount, node);
        {
            let mut tree = self.tree.borrow_mut();
            if let Some(p) = tree.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
            if let Some(n) = tree.nodes.get_mut(&node) {
                n.parent = None;
            }
        }
        self.emit(Lifecycle::Unmount, node);
        Ok(())
    }

    /// Subscribe to `event` on one node.
    pub fn on(&self, node: NodeHandle, event: Lifecycle, callback: impl Fn(Lifecycle, NodeHandle) + 'static) {
        self.tree
            .borrow_mut()
            .listeners
            .entry(node)
            .or_default()
            .push((event, Rc::new(callback)));
    }

    /// Subscribe to `event` on every node.
    pub fn on_global(&self, event: Lifecycle, callback: impl Fn(Lifecycle, NodeHandle) + 'static) {
        self.tree
            .borrow_mut()
            .global
            .push((event, Rc::new(callback)));
    }

    fn emit(&self, event: Lifecycle, node: NodeHandle) {
        let callbacks: Vec<Callback> = {
            let mut tree = self.tree.borrow_mut();
            tree.events.push((event, node));
            tree.global
                .iter()
                .chain(tree.listeners.get(&node).into_iter().flatten())
                .filter(|(e, _)| *e == event)
                .map(|(_, cb)| Rc::clone(cb))
                .collect()
        };
        trace!(?event, node = node.id(), "lifecycle");
        for cb in callbacks {
            cb(event, node);
        }
    }

    /// Text of one node.
    #[must_use]
    pub fn text(&self, node: NodeHandle) -> Option<String> {
        self.tree.borrow().nodes.get(&node)?.text.clone()
    }

    /// Replace the text of one node.
    pub fn set_text(&self, node: NodeHandle, text: impl Into<String>) -> Result<(), HostError> {
        let mut tree = self.tree.borrow_mut();
        let n = tree.nodes.get_mut(&node).ok_or(HostError::InvalidHandle(node))?;
        n.text = Some(text.into());
        Ok(())
    }

    #[must_use]
    pub fn tag(&self, node: NodeHandle) -> Option<String> {
        self.tree.borrow().nodes.get(&node).map(|n| n.tag.clone())
    }

    #[must_use]
    pub fn attr(&self, node: NodeHandle, name: &str) -> Option<String> {
        let tree = self.tree.borrow();
        let n = tree.nodes.get(&node)?;
        n.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.tree.borrow().nodes.get(&node)?.parent
    }

    #[must_use]
    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.tree
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Texts of `node`'s direct children, in order. Children without text
    /// contribute their concatenated subtree text.
    #[must_use]
    pub fn child_texts(&self, node: NodeHandle) -> Vec<String> {
        self.children(node)
            .into_iter()
            .map(|c| self.text_content(c))
            .collect()
    }

    /// Concatenated text of a subtree, depth first.
    #[must_use]
    pub fn text_content(&self, node: NodeHandle) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(h) = stack.pop() {
            let Some(n) = tree.nodes.get(&h) else {
                continue;
            };
            if let Some(text) = &n.text {
                out.push_str(text);
            }
            stack.extend(n.children.iter().rev());
        }
        out
    }

    /// Number of live nodes, the root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.tree.borrow().nodes.len()
    }

    /// Lifecycle events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<(Lifecycle, NodeHandle)> {
        self.tree.borrow().events.clone()
    }

    /// How many times `event` was recorded.
    #[must_use]
    pub fn count(&self, event: Lifecycle) -> usize {
        self.tree
            .borrow()
            .events
            .iter()
            .filter(|(e, _)| *e == event)
            .count()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.tree.borrow_mut().events.clear();
    }
}

impl Tree {
    fn is_self_or_ancestor(&self, node: NodeHandle, mut target: NodeHandle) -> bool {
        loop {
            if target == node {
                return true;
            }
            match self.nodes.get(&target).and_then(|n| n.parent) {
                Some(parent) => target = parent,
                None => return false,
            }
        }
    }
}

impl Host for MemoryHost {
    fn begin_watch(&self) -> WatchId {
        let id = WatchId::new(self.mint());
        self.tree.borrow_mut().watches.push((id, Vec::new()));
        id
    }

    fn end_watch(&self, watch: WatchId) -> Vec<NodeHandle> {
        let mut tree = self.tree.borrow_mut();
        match tree.watches.iter().position(|(id, _)| *id == watch) {
            Some(pos) => tree.watches.remove(pos).1,
            None => Vec::new(),
        }
    }

    fn destroy(&self, handle: NodeHandle) {
        if handle == self.root || !self.is_alive(handle) {
            return;
        }
        self.emit(Lifecycle::BeforeDestroy, handle);
        for child in self.children(handle).into_iter().rev() {
            self.destroy(child);
        }
        if self.parent(handle).is_some() {
            let _ = self.unmount(handle);
        }
        let hooks = {
            let mut tree = self.tree.borrow_mut();
            tree.nodes.remove(&handle);
            tree.destroy_hooks.remove(&handle).unwrap_or_default()
        };
        self.emit(Lifecycle::Destroy, handle);
        for hook in hooks {
            hook();
        }
        let mut tree = self.tree.borrow_mut();
        tree.listeners.remove(&handle);
    }

    fn begin_insert_before(&self, anchor: NodeHandle) {
        self.tree.borrow_mut().anchors.push(anchor);
    }

    fn end_insert_before(&self) {
        self.tree.borrow_mut().anchors.pop();
    }

    fn on_destroy(&self, owner: NodeHandle, callback: Box<dyn FnOnce()>) -> bool {
        if !self.is_alive(owner) {
            return false;
        }
        self.tree
            .borrow_mut()
            .destroy_hooks
            .entry(owner)
            .or_default()
            .push(callback);
        true
    }

    fn is_alive(&self, handle: NodeHandle) -> bool {
        self.tree.borrow().nodes.contains_key(&handle)
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("MemoryHost")
            .field("nodes", &tree.nodes.len())
            .field("open_watches", &tree.watches.len())
            .field("anchors", &tree.anchors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mounts_and_renders_text() {
        let host = MemoryHost::new();
        let list = host.build(NodeSpec::new("ul").child("a").child("b"));
        host.mount(list, host.root()).unwrap();
        assert_eq!(host.text_content(list), "ab");
        assert_eq!(host.child_texts(list), ["a", "b"]);
        assert_eq!(host.tag(list).as_deref(), Some("ul"));
        assert_eq!(host.node_count(), 4);
    }

    #[test]
    fn watches_nest() {
        let host = MemoryHost::new();
        let outer = host.begin_watch();
        host.build("x");
        let inner = host.begin_watch();
        host.build(NodeSpec::new("div").child("y"));
        assert_eq!(host.end_watch(inner).len(), 2);
        assert_eq!(host.end_watch(outer).len(), 3);
    }

    #[test]
    fn anchor_redirects_mounts_into_its_parent() {
        let host = MemoryHost::new();
        let root = host.root();
        let a = host.build("a");
        let c = host.build("c");
        host.mount(a, root).unwrap();
        host.mount(c, root).unwrap();
        host.begin_insert_before(c);
        let b = host.build("b");
        host.mount(b, root).unwrap();
        let other = host.build("elsewhere");
        host.mount(other, a).unwrap();
        host.end_insert_before();
        assert_eq!(host.child_texts(root), ["aelsewhere", "b", "c"]);
    }

    #[test]
    fn destroy_is_recursive_and_runs_hooks_once() {
        let host = MemoryHost::new();
        let list = host.build(NodeSpec::new("ul").child("a"));
        host.mount(list, host.root()).unwrap();
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        assert!(host.on_destroy(list, Box::new(move || f.set(f.get() + 1))));
        host.destroy(list);
        host.destroy(list);
        assert_eq!(fired.get(), 1);
        assert_eq!(host.node_count(), 1);
        assert_eq!(host.count(Lifecycle::Destroy), 2);
        assert!(host.children(host.root()).is_empty());
        assert!(!host.on_destroy(list, Box::new(|| {})));
    }

    #[test]
    fn mount_errors() {
        let host = MemoryHost::new();
        let root = host.root();
        let a = host.build(NodeSpec::new("div").child("b"));
        let b = host.children(a)[0];
        assert_eq!(host.mount(a, b), Err(HostError::InvalidTarget { node: a, target: b }));
        assert_eq!(host.mount(b, root), Err(HostError::AlreadyMounted(b)));
        assert_eq!(
            host.mount(NodeHandle::new(999), root),
            Err(HostError::InvalidHandle(NodeHandle::new(999)))
        );
        assert_eq!(host.unmount(a), Err(HostError::NotMounted(a)));
    }

    #[test]
    fn lifecycle_callbacks_may_reenter() {
        let host = Rc::new(MemoryHost::new());
        let h = Rc::clone(&host);
        let texts = Rc::new(RefCell::new(Vec::new()));
        let t = Rc::clone(&texts);
        host.on_global(Lifecycle::Mount, move |_, node| {
            t.borrow_mut().push(h.text(node).unwrap_or_default());
        });
        let a = host.build("a");
        host.mount(a, host.root()).unwrap();
        assert_eq!(*texts.borrow(), ["a"]);
    }

    #[test]
    fn set_text_and_attrs() {
        let host = MemoryHost::new();
        let n = host.build(NodeSpec::new("p").attr("class", "dim"));
        host.set_text(n, "hello").unwrap();
        assert_eq!(host.text(n).as_deref(), Some("hello"));
        assert_eq!(host.attr(n, "class").as_deref(), Some("dim"));
        assert_eq!(host.attr(n, "id"), None);
    }
}
