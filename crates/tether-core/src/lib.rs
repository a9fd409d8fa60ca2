#![forbid(unsafe_code)]

//! Path-addressed reactive store for tether.
//!
//! An [`Engine`] owns a tree of [`Value`]s. Render routines register
//! against [`Node`] paths; writing through a node queues a notification,
//! and [`Engine::flush`] re-runs exactly the routines whose paths sit on,
//! above, or below the written path. List routines keep one output group
//! per item and react to list operations by rendering only the items that
//! entered or left.
//!
//! This crate provides:
//! - [`path`] for the canonical `a.b[2].c` notation
//! - [`KeyedList`] for lists whose items carry stable identity
//! - [`ProxyTree`] for the per-path mirror of the store
//! - [`DependencyGraph`] and [`Scheduler`] for propagation
//! - [`Host`] as the seam to whatever builds UI nodes
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tether_core::{Engine, Record, Value};
//!
//! let engine = Engine::headless(Record::new().with("items", Vec::<Value>::new()));
//! let items = engine.state().child("items").unwrap();
//!
//! let rendered = Rc::new(RefCell::new(Vec::new()));
//! let log = Rc::clone(&rendered);
//! engine.reactive_list(
//!     move |item, _| log.borrow_mut().push(item.value().to_string()),
//!     &items,
//!     &[],
//! );
//!
//! items.append(["a", "b"]).unwrap();
//! engine.flush();
//! assert_eq!(*rendered.borrow(), ["a", "b"]);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
#[cfg(feature = "json")]
mod json;
pub mod keyed;
pub mod list;
pub mod node;
pub mod path;
pub mod proxy;
pub mod scheduler;
pub mod scope;
pub mod value;

#[cfg(feature = "policy-config")]
pub use config::ConfigError;
pub use config::EngineConfig;
pub use engine::{Engine, FlushReport, ItemContext, RenderContext, create_engine};
pub use error::StateError;
pub use graph::{DependencyGraph, Relation, RoutineId};
pub use host::{Host, NodeHandle, NullHost, WatchId};
pub use keyed::{IndexChange, ItemKey, KeyedList, ListEdit};
pub use list::{ListReconciler, ReconcileStats};
pub use node::Node;
pub use proxy::{MirrorKind, ProxyTree};
pub use scheduler::{Change, Notification, Scheduler};
pub use scope::Scope;
pub use value::{Function, Record, Value, ValueKind, shallow};
