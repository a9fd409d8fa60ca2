#![forbid(unsafe_code)]

//! Seam to the node-building collaborator.
//!
//! The engine never builds UI output itself. Render routines call the host
//! directly; the engine only needs to know *which* handles a routine
//! produced, so it brackets every render in a creation watch and destroys
//! the recorded handles on the next re-render.
//!
//! # Contract
//!
//! 1. Every handle created between `begin_watch` and the matching
//!    `end_watch` is reported by that watch, including handles created by
//!    nested watches.
//! 2. While an insertion anchor is active, mounts into the anchor's parent
//!    are placed immediately before the anchor instead of appended.
//! 3. `destroy` on an unknown or already destroyed handle is a no-op.
//! 4. `on_destroy` callbacks run once, when the owner is destroyed.

/// Opaque handle of a node produced by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
    /// Wrap a raw host identifier.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Identifier of one creation watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Primitives the engine consumes from the node builder.
pub trait Host {
    /// Start recording created handles.
    fn begin_watch(&self) -> WatchId;

    /// Stop recording and return the handles created since `begin_watch`.
    fn end_watch(&self, watch: WatchId) -> Vec<NodeHandle>;

    /// Destroy a node (and, host permitting, its subtree).
    fn destroy(&self, handle: NodeHandle);

    /// Place subsequent mounts into the anchor's parent before `anchor`.
    fn begin_insert_before(&self, anchor: NodeHandle);

    /// Undo the innermost `begin_insert_before`.
    fn end_insert_before(&self);

    /// Run `callback` when `owner` is destroyed. Returns `false` when the
    /// owner is unknown, in which case the callback is dropped unrun.
    fn on_destroy(&self, owner: NodeHandle, callback: Box<dyn FnOnce()>) -> bool;

    /// Whether `handle` refers to a live node.
    fn is_alive(&self, handle: NodeHandle) -> bool;
}

/// Host for engines that drive no UI output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {
    fn begin_watch(&self) -> WatchId {
        WatchId(0)
    }

    fn end_watch(&self, _watch: WatchId) -> Vec<NodeHandle> {
        Vec::new()
    }

    fn destroy(&self, _handle: NodeHandle) {}

    fn begin_insert_before(&self, _anchor: NodeHandle) {}

    fn end_insert_before(&self) {}

    fn on_destroy(&self, _owner: NodeHandle, _callback: Box<dyn FnOnce()>) -> bool {
        false
    }

    fn is_alive(&self, _handle: NodeHandle) -> bool {
        false
    }
}

/// RAII guard closing a creation watch, even if the render panics.
struct WatchGuard<'a> {
    host: &'a dyn Host,
    watch: Option<WatchId>,
}

impl WatchGuard<'_> {
    fn finish(mut self) -> Vec<NodeHandle> {
        self.watch
            .take()
            .map_or_else(Vec::new, |watch| self.host.end_watch(watch))
    }
}

impl Drop for WatchGuard<'_> {
    fn drop(&mut self) {
        if let Some(watch) = self.watch.take() {
            self.host.end_watch(watch);
        }
    }
}

/// RAII guard for an insertion anchor.
struct AnchorGuard<'a> {
    host: &'a dyn Host,
}

impl Drop for AnchorGuard<'_> {
    fn drop(&mut self) {
        self.host.end_insert_before();
    }
}

/// Run `render`, returning its result and every handle it created. With an
/// anchor, the produced output is mounted before it.
pub(crate) fn capture<R>(
    host: &dyn Host,
    anchor: Option<NodeHandle>,
    render: impl FnOnce() -> R,
) -> (R, Vec<NodeHandle>) {
    let guard = WatchGuard {
        host,
        watch: Some(host.begin_watch()),
    };
    let anchor_guard = anchor.map(|anchor| {
        host.begin_insert_before(anchor);
        AnchorGuard { host }
    });
    let out = render();
    drop(anchor_guard);
    (out, guard.finish())
}
