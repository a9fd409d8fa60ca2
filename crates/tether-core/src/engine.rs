#![forbid(unsafe_code)]

//! The reactive engine: store, dependency graph and notification queue.
//!
//! Render routines register against [`Node`] paths. Writes through nodes
//! take effect immediately but only *queue* notifications; [`Engine::flush`]
//! drains the queue, looks each written path up in the dependency graph and
//! re-runs the affected routines.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tether_core::{Engine, Record};
//!
//! let engine = Engine::headless(Record::new().with("count", 0));
//! let count = engine.state().child("count").unwrap();
//!
//! let seen = Rc::new(Cell::new(0.0));
//! let out = Rc::clone(&seen);
//! engine.reactive(move |_, args| out.set(args[0].as_f64().unwrap_or(0.0)), &[count.clone()]);
//!
//! count.set(5).unwrap();
//! assert_eq!(seen.get(), 0.0);
//! engine.flush();
//! assert_eq!(seen.get(), 5.0);
//! ```
//!
//! # Invariants
//!
//! 1. A routine's previous output is destroyed before it renders again.
//! 2. A routine forgotten while notifications are queued is never invoked
//!    again.
//! 3. No store, graph or queue borrow is held while user code or the host
//!    runs, so routines may read and write the engine freely.
//! 4. Notifications scheduled during a flush run in a later round of the
//!    same flush, up to `max_flush_rounds`.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Feedback loop | Routine writes what it depends on | Stops after `max_flush_rounds`, `warn!`, rest stays queued |
//! | Nested flush | `flush` called from a routine | Returns an empty report |
//! | Re-entrant list render | List routine triggers itself mid-render | Skipped with `warn!` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, debug_span, trace, warn};

use crate::config::EngineConfig;
use crate::graph::{DependencyGraph, Match, Relation, RoutineId};
use crate::host::{Host, NodeHandle, NullHost, capture};
use crate::keyed::{ItemKey, ListEdit};
use crate::list::{ItemSink, ListReconciler};
use crate::node::Node;
use crate::proxy::Store;
use crate::scheduler::{Change, Notification, Scheduler};
use crate::scope::Scope;
use crate::value::Value;

type RenderFn = Box<dyn Fn(&RenderContext<'_>, &[Value])>;
type ItemRenderFn = Box<dyn Fn(&ItemContext<'_>, &[Value])>;

/// A registered render routine.
pub(crate) enum Routine {
    Plain {
        render: RenderFn,
        args: Vec<String>,
        handles: RefCell<Vec<NodeHandle>>,
    },
    List {
        render: ItemRenderFn,
        list_path: String,
        args: Vec<String>,
        reconciler: RefCell<ListReconciler>,
    },
}

/// State shared between an engine and the nodes and scopes it hands out.
pub(crate) struct Shared {
    pub(crate) store: RefCell<Store>,
    pub(crate) graph: RefCell<DependencyGraph<Routine>>,
    pub(crate) scheduler: RefCell<Scheduler>,
    pub(crate) host: Rc<dyn Host>,
    pub(crate) config: EngineConfig,
    flushing: Cell<bool>,
}

impl Shared {
    /// Queue a notification, tagging it with the list items its path runs
    /// through as they are right now.
    pub(crate) fn schedule(&self, notification: Notification) {
        let items = self.store.borrow().item_keys(notification.path());
        trace!(path = %notification.path(), items = items.len(), "notification queued");
        self.scheduler
            .borrow_mut()
            .schedule(notification.with_item_keys(items));
    }
}

/// What a render routine is told about why it runs.
pub struct RenderContext<'a> {
    engine: &'a Engine,
    notification: Option<&'a Notification>,
}

impl<'a> RenderContext<'a> {
    /// Owning engine.
    #[must_use]
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Root node of the store.
    #[must_use]
    pub fn state(&self) -> Node {
        self.engine.state()
    }

    /// Notification that triggered this run; `None` on the initial render.
    #[must_use]
    pub fn notification(&self) -> Option<&'a Notification> {
        self.notification
    }

    /// Written path that triggered this run.
    #[must_use]
    pub fn path(&self) -> Option<&'a str> {
        self.notification.map(Notification::path)
    }

    /// Value at the written path before the write, for plain writes.
    #[must_use]
    pub fn prev(&self) -> Option<&'a Value> {
        self.notification.and_then(Notification::prev)
    }

    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.notification.is_none()
    }
}

/// What a list routine is told about the item it renders.
pub struct ItemContext<'a> {
    engine: &'a Engine,
    value: &'a Value,
    index: usize,
    key: ItemKey,
    notification: Option<&'a Notification>,
}

impl<'a> ItemContext<'a> {
    #[must_use]
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Root node of the store.
    #[must_use]
    pub fn state(&self) -> Node {
        self.engine.state()
    }

    /// Copy of the item being rendered.
    #[must_use]
    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Position of the item in the list.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identity of the item.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        self.key
    }

    /// Notification that triggered this render; `None` on the initial render.
    #[must_use]
    pub fn notification(&self) -> Option<&'a Notification> {
        self.notification
    }
}

/// Counters from one [`Engine::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Batches drained.
    pub rounds: usize,
    /// Notifications dispatched.
    pub notifications: usize,
    /// Routine invocations.
    pub invocations: usize,
    /// The round limit was hit with work still queued.
    pub saturated: bool,
}

/// What a list routine does for one notification.
enum ListPass {
    /// Render every item again.
    Full,
    /// Touch only what the edit names.
    Edit(ListEdit),
    /// The change no longer concerns any item; do nothing.
    Skip,
}

/// Resets the flushing flag even if a routine panics.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Owner of one reactive store.
pub struct Engine {
    shared: Rc<Shared>,
}

impl Engine {
    /// Create an engine over `initial`, rendering through `host`.
    #[must_use]
    pub fn new(initial: impl Into<Value>, host: Rc<dyn Host>) -> Self {
        Self::with_config(initial, host, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    #[must_use]
    pub fn with_config(initial: impl Into<Value>, host: Rc<dyn Host>, config: EngineConfig) -> Self {
        let store = Store::new(initial.into());
        debug!(mirrored = store.tree().len(), ?config, "engine created");
        Self {
            shared: Rc::new(Shared {
                store: RefCell::new(store),
                graph: RefCell::new(DependencyGraph::new()),
                scheduler: RefCell::new(Scheduler::new(config.coalesce_same_path)),
                host,
                config,
                flushing: Cell::new(false),
            }),
        }
    }

    /// Create an engine whose routines produce no host output.
    #[must_use]
    pub fn headless(initial: impl Into<Value>) -> Self {
        Self::new(initial, Rc::new(NullHost))
    }

    pub(crate) fn from_shared(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    /// Root node of the store.
    #[must_use]
    pub fn state(&self) -> Node {
        Node::new(Rc::downgrade(&self.shared), "")
    }

    /// Node at `path`, if mirrored.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<Node> {
        let mirrored = self.shared.store.borrow().tree().contains(path);
        mirrored.then(|| Node::new(Rc::downgrade(&self.shared), path))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn Host> {
        &self.shared.host
    }

    /// Copy of the whole store.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.shared.store.borrow().root().clone()
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.scheduler.borrow().len()
    }

    /// Drop every queued notification without running anything.
    pub fn take_pending(&self) -> Vec<Notification> {
        self.shared.scheduler.borrow_mut().take_batch()
    }

    /// Number of registered routines.
    #[must_use]
    pub fn routine_count(&self) -> usize {
        self.shared.graph.borrow().len()
    }

    /// Whether `id` is still registered.
    #[must_use]
    pub fn is_registered(&self, id: RoutineId) -> bool {
        self.shared.graph.borrow().contains(id)
    }

    /// Paths `id` is registered under.
    #[must_use]
    pub fn dependencies(&self, id: RoutineId) -> Vec<String> {
        self.shared
            .graph
            .borrow()
            .paths_of(id)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Render now and again whenever one of `args` (or anything above or
    /// below them) is written. The routine receives the live values of
    /// `args`; missing paths read as [`Value::Null`].
    pub fn reactive<F>(&self, render: F, args: &[Node]) -> RoutineId
    where
        F: Fn(&RenderContext<'_>, &[Value]) + 'static,
    {
        let paths = arg_paths(args);
        let values = self.resolve_args(&paths);
        let ctx = RenderContext {
            engine: self,
            notification: None,
        };
        let ((), handles) = capture(&*self.shared.host, None, || render(&ctx, &values));
        let id = self.shared.graph.borrow_mut().register(
            paths.clone(),
            Routine::Plain {
                render: Box::new(render),
                args: paths,
                handles: RefCell::new(handles),
            },
        );
        debug!(routine = id.id(), "registered reactive routine");
        id
    }

    /// Render every item of the list at `list`, then keep the output in
    /// step with list operations, re-rendering only what they touched.
    pub fn reactive_list<F>(&self, render: F, list: &Node, args: &[Node]) -> RoutineId
    where
        F: Fn(&ItemContext<'_>, &[Value]) + 'static,
    {
        let list_path = list.path().to_owned();
        let args = arg_paths(args);
        let mut paths = Vec::with_capacity(args.len() + 1);
        paths.push(list_path.clone());
        paths.extend(args.iter().cloned());

        let render: ItemRenderFn = Box::new(render);
        let reconciler = RefCell::new(ListReconciler::new());
        self.render_list(&render, &list_path, &args, &reconciler, None, None);
        let id = self.shared.graph.borrow_mut().register(
            paths,
            Routine::List {
                render,
                list_path,
                args,
                reconciler,
            },
        );
        debug!(routine = id.id(), "registered list routine");
        id
    }

    /// Stop re-running a routine. Its current output stays in place.
    pub fn forget(&self, id: RoutineId) -> bool {
        let forgotten = self.shared.graph.borrow_mut().forget(id).is_some();
        if forgotten {
            debug!(routine = id.id(), "routine forgotten");
        }
        forgotten
    }

    /// Forget a routine and destroy the output it currently owns.
    pub fn dispose(&self, id: RoutineId) -> bool {
        let Some(routine) = self.shared.graph.borrow_mut().forget(id) else {
            return false;
        };
        let host = &*self.shared.host;
        match &*routine {
            Routine::Plain { handles, .. } => {
                let old = std::mem::take(&mut *handles.borrow_mut());
                for handle in old {
                    host.destroy(handle);
                }
            }
            Routine::List { reconciler, .. } => match reconciler.try_borrow_mut() {
                Ok(mut reconciler) => {
                    reconciler.drain_all(&mut DestroySink { host });
                }
                Err(_) => warn!(routine = id.id(), "list routine disposed mid-render; output kept"),
            },
        }
        debug!(routine = id.id(), "routine disposed");
        true
    }

    /// Registration facade whose routines are forgotten when `owner` is
    /// destroyed.
    #[must_use]
    pub fn scope_to(&self, owner: NodeHandle) -> Scope {
        Scope::new(&self.shared, owner)
    }

    /// Run every queued notification, including those queued by the
    /// routines it runs.
    pub fn flush(&self) -> FlushReport {
        if self.shared.flushing.replace(true) {
            trace!("nested flush ignored");
            return FlushReport::default();
        }
        let _guard = FlushGuard(&self.shared.flushing);
        let max_rounds = self.shared.config.max_flush_rounds;
        let mut report = FlushReport::default();

        while !self.shared.scheduler.borrow().is_empty() {
            if report.rounds >= max_rounds {
                warn!(
                    rounds = report.rounds,
                    pending = self.pending(),
                    "flush round limit reached; leaving notifications queued"
                );
                report.saturated = true;
                break;
            }
            let batch = self.shared.scheduler.borrow_mut().take_batch();
            report.rounds += 1;
            let span = debug_span!("flush_round", round = report.rounds, size = batch.len());
            let _enter = span.enter();
            for notification in &batch {
                report.notifications += 1;
                report.invocations += self.dispatch(notification);
            }
        }
        if report.rounds > 0 {
            debug!(
                rounds = report.rounds,
                notifications = report.notifications,
                invocations = report.invocations,
                "flush complete"
            );
        }
        report
    }

    fn dispatch(&self, notification: &Notification) -> usize {
        let matches = self
            .shared
            .graph
            .borrow()
            .lookup(notification.path(), self.shared.config.notify_descendants);
        let mut invoked = 0;
        for matched in matches {
            if !self.is_registered(matched.id) {
                trace!(routine = matched.id.id(), "skipping forgotten routine");
                continue;
            }
            trace!(
                routine = matched.id.id(),
                path = %matched.path,
                relation = ?matched.relation,
                "dispatching"
            );
            match &*matched.entry {
                Routine::Plain {
                    render,
                    args,
                    handles,
                } => self.rerun_plain(matched.id, render, args, handles, notification),
                Routine::List {
                    render,
                    list_path,
                    args,
                    reconciler,
                } => {
                    let edit = match self.list_pass_for(&matched, list_path, notification) {
                        ListPass::Skip => continue,
                        ListPass::Full => None,
                        ListPass::Edit(edit) => Some(edit),
                    };
                    self.render_list(
                        render,
                        list_path,
                        args,
                        reconciler,
                        Some(notification),
                        edit.as_ref(),
                    );
                }
            }
            invoked += 1;
        }
        invoked
    }

    /// How a list routine reacts to `notification`.
    fn list_pass_for(
        &self,
        matched: &Match<Routine>,
        list_path: &str,
        notification: &Notification,
    ) -> ListPass {
        if matched.path != list_path {
            return ListPass::Full;
        }
        match (matched.relation, notification.change()) {
            (Relation::Exact, Change::List(edit)) => ListPass::Edit(edit.clone()),
            (Relation::Ancestor { item: Some(_) }, _) => {
                let Some(key) = notification.item_key(list_path) else {
                    return ListPass::Full;
                };
                let index = self
                    .shared
                    .store
                    .borrow()
                    .resolve(list_path)
                    .and_then(Value::as_list)
                    .and_then(|list| list.position(key));
                match index {
                    Some(index) => ListPass::Edit(ListEdit::refresh(index, key)),
                    None => {
                        trace!(path = list_path, key = key.id(), "written item left the list; refresh skipped");
                        ListPass::Skip
                    }
                }
            }
            _ => ListPass::Full,
        }
    }

    fn rerun_plain(
        &self,
        id: RoutineId,
        render: &RenderFn,
        args: &[String],
        handles: &RefCell<Vec<NodeHandle>>,
        notification: &Notification,
    ) {
        let host = &*self.shared.host;
        let old = std::mem::take(&mut *handles.borrow_mut());
        for handle in old {
            host.destroy(handle);
        }
        // Destroy hooks may have torn down the scope that owns this routine.
        if !self.is_registered(id) {
            return;
        }
        let values = self.resolve_args(args);
        let ctx = RenderContext {
            engine: self,
            notification: Some(notification),
        };
        let ((), made) = capture(host, None, || render(&ctx, &values));
        if self.is_registered(id) {
            *handles.borrow_mut() = made;
        } else {
            for handle in made {
                host.destroy(handle);
            }
        }
    }

    fn render_list(
        &self,
        render: &ItemRenderFn,
        list_path: &str,
        args: &[String],
        reconciler: &RefCell<ListReconciler>,
        notification: Option<&Notification>,
        edit: Option<&ListEdit>,
    ) {
        let keys: Vec<ItemKey> = self
            .shared
            .store
            .borrow()
            .resolve(list_path)
            .and_then(Value::as_list)
            .map(|list| list.keys().to_vec())
            .unwrap_or_default();
        let values = self.resolve_args(args);
        let Ok(mut reconciler) = reconciler.try_borrow_mut() else {
            warn!(path = list_path, "list routine triggered itself while rendering; skipped");
            return;
        };
        let mut sink = EngineSink {
            engine: self,
            render,
            list_path,
            args: &values,
            keys: &keys,
            notification,
        };
        reconciler.reconcile(&keys, edit, &mut sink);
    }

    fn resolve_args(&self, paths: &[String]) -> Vec<Value> {
        let store = self.shared.store.borrow();
        paths
            .iter()
            .map(|path| store.resolve(path).cloned().unwrap_or_default())
            .collect()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("mirrored", &self.shared.store.borrow().tree().len())
            .field("routines", &self.shared.graph.borrow().len())
            .field("pending", &self.shared.scheduler.borrow().len())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Create an engine over `initial`.
#[must_use]
pub fn create_engine(initial: impl Into<Value>, host: Rc<dyn Host>) -> Engine {
    Engine::new(initial, host)
}

fn arg_paths(args: &[Node]) -> Vec<String> {
    args.iter().map(|node| node.path().to_owned()).collect()
}

/// Renders list items through the engine's host.
struct EngineSink<'a> {
    engine: &'a Engine,
    render: &'a ItemRenderFn,
    list_path: &'a str,
    args: &'a [Value],
    keys: &'a [ItemKey],
    notification: Option<&'a Notification>,
}

impl ItemSink for EngineSink<'_> {
    fn render(&mut self, index: usize, anchor: Option<NodeHandle>) -> Vec<NodeHandle> {
        let item = self
            .engine
            .shared
            .store
            .borrow()
            .resolve(self.list_path)
            .and_then(Value::as_list)
            .and_then(|list| list.get(index))
            .cloned()
            .unwrap_or_default();
        let Some(key) = self.keys.get(index).copied() else {
            return Vec::new();
        };
        let ctx = ItemContext {
            engine: self.engine,
            value: &item,
            index,
            key,
            notification: self.notification,
        };
        let ((), handles) = capture(&*self.engine.shared.host, anchor, || {
            (self.render)(&ctx, self.args);
        });
        handles
    }

    fn destroy(&mut self, handles: Vec<NodeHandle>) {
        for handle in handles {
            self.engine.shared.host.destroy(handle);
        }
    }
}

/// Sink used when tearing a list routine down; never renders.
struct DestroySink<'a> {
    host: &'a dyn Host,
}

impl ItemSink for DestroySink<'_> {
    fn render(&mut self, _index: usize, _anchor: Option<NodeHandle>) -> Vec<NodeHandle> {
        Vec::new()
    }

    fn destroy(&mut self, handles: Vec<NodeHandle>) {
        for handle in handles {
            self.host.destroy(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use crate::value::Record;

    fn setup(initial: impl Into<Value>) -> (Rc<RecordingHost>, Engine) {
        let host = Rc::new(RecordingHost::default());
        let engine = Engine::new(initial, Rc::clone(&host) as Rc<dyn Host>);
        (host, engine)
    }

    fn user() -> Value {
        Record::new()
            .with("user", Record::new().with("name", "ada").with("age", 36))
            .into()
    }

    fn counter(engine: &Engine, path: &str) -> (Rc<Cell<usize>>, RoutineId) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let node = engine.state().at(path);
        let id = engine.reactive(move |_, _| h.set(h.get() + 1), &[node]);
        (hits, id)
    }

    #[test]
    fn exact_and_ancestor_routines_fire_once() {
        let (_, e) = setup(user());
        let (name, _) = counter(&e, "user.name");
        let (whole, _) = counter(&e, "user");
        let (age, _) = counter(&e, "user.age");
        e.node("user.name").unwrap().set("x").unwrap();
        let report = e.flush();
        assert_eq!((name.get(), whole.get(), age.get()), (2, 2, 1));
        assert_eq!(report.invocations, 2);
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn descendant_routines_follow_config() {
        let (_, e) = setup(user());
        let (name, _) = counter(&e, "user.name");
        e.node("user").unwrap().set(Record::new().with("name", "b")).unwrap();
        e.flush();
        assert_eq!(name.get(), 2);

        let quiet = Engine::with_config(
            user(),
            Rc::new(NullHost),
            EngineConfig::default().with_descendant_notifications(false),
        );
        let (name, _) = counter(&quiet, "user.name");
        quiet.node("user").unwrap().set(Record::new()).unwrap();
        quiet.flush();
        assert_eq!(name.get(), 1);
    }

    #[test]
    fn rerun_replaces_output() {
        let (host, e) = setup(user());
        let h = Rc::clone(&host);
        let name = e.node("user.name").unwrap();
        e.reactive(
            move |_, args| {
                h.create(&args[0].to_string());
            },
            &[name.clone()],
        );
        name.set("grace").unwrap();
        e.flush();
        assert_eq!(host.live_labels(), ["grace"]);
        assert_eq!(host.destroyed().len(), 1);
    }

    #[test]
    fn context_carries_prev() {
        let (_, e) = setup(user());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let age = e.node("user.age").unwrap();
        e.reactive(
            move |ctx, _| s.borrow_mut().push((ctx.is_initial(), ctx.prev().cloned())),
            &[age.clone()],
        );
        age.set(40).unwrap();
        e.flush();
        assert_eq!(
            *seen.borrow(),
            [(true, None), (false, Some(Value::from(36)))]
        );
    }

    #[test]
    fn forgotten_routines_never_run() {
        let (_, e) = setup(user());
        let (hits, id) = counter(&e, "user.name");
        e.node("user.name").unwrap().set("x").unwrap();
        assert!(e.forget(id));
        assert!(!e.forget(id));
        e.flush();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn dispose_destroys_output() {
        let (host, e) = setup(user());
        let h = Rc::clone(&host);
        let id = e.reactive(move |_, _| { h.create("x"); }, &[e.state()]);
        assert_eq!(host.live_labels(), ["x"]);
        assert!(e.dispose(id));
        assert!(host.live_labels().is_empty());
        assert!(!e.dispose(id));
    }

    #[test]
    fn feedback_loops_are_bounded() {
        let e = Engine::with_config(
            user(),
            Rc::new(NullHost),
            EngineConfig::default().with_max_flush_rounds(3),
        );
        let age = e.node("user.age").unwrap();
        let target = age.clone();
        e.reactive(
            move |ctx, args| {
                if !ctx.is_initial() {
                    let n = args[0].as_f64().unwrap_or(0.0);
                    target.set(n + 1.0).unwrap();
                }
            },
            &[age.clone()],
        );
        age.set(0).unwrap();
        let report = e.flush();
        assert!(report.saturated);
        assert_eq!(report.rounds, 3);
        assert_eq!(e.pending(), 1);
    }

    #[test]
    fn nested_flush_is_ignored() {
        let (_, e) = setup(user());
        let nested = Rc::new(Cell::new(None));
        let n = Rc::clone(&nested);
        e.reactive(
            move |ctx, _| {
                if !ctx.is_initial() {
                    n.set(Some(ctx.engine().flush()));
                }
            },
            &[e.state().at("user")],
        );
        e.node("user.age").unwrap().set(1).unwrap();
        e.flush();
        assert_eq!(nested.get(), Some(FlushReport::default()));
    }

    #[test]
    fn missing_args_read_as_null() {
        let (_, e) = setup(user());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let later = e.state().at("later");
        e.reactive(move |_, args| s.borrow_mut().push(args[0].clone()), &[later]);
        e.state().insert("later", 1).unwrap();
        e.flush();
        assert_eq!(*seen.borrow(), [Value::Null, Value::from(1)]);
    }

    #[test]
    fn list_routine_appends_before_nothing_and_inserts_before_anchor() {
        let (host, e) = setup(Record::new().with("items", vec![Value::from("b")]));
        let h = Rc::clone(&host);
        let items = e.node("items").unwrap();
        e.reactive_list(move |ctx, _| { h.create(&ctx.value().to_string()); }, &items, &[]);
        let b = host.live_labels();
        assert_eq!(b, ["b"]);
        items.insert_first(["a"]).unwrap();
        items.append(["c"]).unwrap();
        e.flush();
        assert_eq!(host.live_labels(), ["b", "a", "c"]);
        let placed = host.placed_before();
        assert_eq!(placed.len(), 1);
        assert_eq!(host.label(placed[0].0).as_deref(), Some("a"));
        assert_eq!(host.label(placed[0].1).as_deref(), Some("b"));
        assert!(host.destroyed().is_empty());
    }

    #[test]
    fn item_writes_refresh_one_item() {
        let (host, e) = setup(Record::new().with(
            "items",
            vec![
                Value::from(Record::new().with("n", "a")),
                Value::from(Record::new().with("n", "b")),
            ],
        ));
        let h = Rc::clone(&host);
        let items = e.node("items").unwrap();
        e.reactive_list(
            move |ctx, _| {
                let n = ctx.value().resolve("n").map(ToString::to_string).unwrap_or_default();
                h.create(&n);
            },
            &items,
            &[],
        );
        e.node("items[1].n").unwrap().set("B").unwrap();
        let report = e.flush();
        assert_eq!(report.invocations, 1);
        assert_eq!(host.destroyed().len(), 1);
        let mut live = host.live_labels();
        live.sort();
        assert_eq!(live, ["B", "a"]);
    }

    #[test]
    fn replacing_the_list_rerenders_everything() {
        let (host, e) = setup(Record::new().with("items", vec![Value::from("a")]));
        let h = Rc::clone(&host);
        let items = e.node("items").unwrap();
        e.reactive_list(move |ctx, _| { h.create(&ctx.value().to_string()); }, &items, &[]);
        items.set(vec![Value::from("x"), Value::from("y")]).unwrap();
        e.flush();
        assert_eq!(host.live_labels(), ["x", "y"]);
        assert_eq!(host.destroyed().len(), 1);
    }

    #[test]
    fn list_routines_see_args() {
        let (host, e) = setup(
            Record::new()
                .with("items", vec![Value::from("a")])
                .with("prefix", ">"),
        );
        let h = Rc::clone(&host);
        let items = e.node("items").unwrap();
        let prefix = e.node("prefix").unwrap();
        e.reactive_list(
            move |ctx, args| { h.create(&format!("{}{}", args[0], ctx.value())); },
            &items,
            &[prefix.clone()],
        );
        prefix.set("*").unwrap();
        e.flush();
        assert_eq!(host.live_labels(), ["*a"]);
    }

    #[test]
    fn engines_are_independent() {
        let (_, a) = setup(user());
        let (_, b) = setup(user());
        let (hits, _) = counter(&b, "user.name");
        a.node("user.name").unwrap().set("x").unwrap();
        a.flush();
        b.flush();
        assert_eq!(hits.get(), 1);
        assert_eq!(b.node("user.name").unwrap().get(), Some(Value::from("ada")));
    }
}
