#![forbid(unsafe_code)]

//! Command-history feed driven by a tether store.
//!
//! A scripted session pushes, undoes, redoes and truncates history entries.
//! One list routine renders a row per entry, one routine moves the cursor
//! marker, and both are scoped to the feed's table node. After each step
//! the table is printed.
//!
//! Usage: `tether-demo [config.toml]`. Set `RUST_LOG=tether_core=debug` to
//! watch dispatch.

use std::process::ExitCode;
use std::rc::Rc;

use tether_core::{Engine, EngineConfig, Host, Node, NodeHandle, Record, StateError, Value, shallow};
use tether_harness::{MemoryHost, NodeSpec};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// One scripted step.
#[derive(Debug, Clone, Copy)]
enum Step {
    Push(&'static str),
    Undo,
    Redo,
    Truncate,
}

const SCRIPT: &[Step] = &[
    Step::Push("ls -la"),
    Step::Push("cd src"),
    Step::Push("cargo build"),
    Step::Undo,
    Step::Undo,
    Step::Redo,
    Step::Truncate,
    Step::Push("git status"),
];

fn load_config() -> Result<EngineConfig, String> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(EngineConfig::default());
    };
    let source = std::fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
    EngineConfig::from_toml_str(&source).map_err(|e| format!("{path}: {e}"))
}

struct Feed {
    host: Rc<MemoryHost>,
    engine: Engine,
    table: NodeHandle,
    history: Node,
    index: Node,
}

impl Feed {
    fn new(config: EngineConfig) -> Result<Self, String> {
        let host = Rc::new(MemoryHost::new());
        // Entries are observed as a whole; rows never need per-field updates.
        let initial = Record::new()
            .with("index", -1)
            .with("history", shallow(Vec::<Value>::new()));
        let engine = Engine::with_config(initial, Rc::clone(&host) as Rc<dyn Host>, config);
        let table = host.build(NodeSpec::new("table"));
        host.mount(table, host.root()).map_err(|e| e.to_string())?;
        let history = engine.node("history").ok_or("history is not mirrored")?;
        let index = engine.node("index").ok_or("index is not mirrored")?;
        let feed = Self {
            host,
            engine,
            table,
            history,
            index,
        };
        feed.attach();
        Ok(feed)
    }

    fn attach(&self) {
        let scope = self.engine.scope_to(self.table);
        let host = Rc::clone(&self.host);
        let table = self.table;
        scope.reactive_list(
            move |entry, _| {
                let row = host.build(
                    NodeSpec::new("tr")
                        .attr("data-history", entry.index().to_string())
                        .child(NodeSpec::new("td").text(format!("{}: ", entry.index() + 1)))
                        .child(NodeSpec::new("td").text(entry.value().to_string())),
                );
                if let Err(e) = host.mount(row, table) {
                    warn!(error = %e, "history row not mounted");
                }
            },
            &self.history,
            &[],
        );

        let host = Rc::clone(&self.host);
        let history = self.history.clone();
        scope.reactive(
            move |ctx, args| {
                if let Some(prev) = ctx.prev() {
                    info!(from = %prev, to = %args[0], "cursor moved");
                }
                let index = args[0].as_f64().unwrap_or(-1.0);
                let last = history.len().unwrap_or(0) as f64 - 1.0;
                let marker = if index < last {
                    format!("> at {} of {} (jump to latest)", index + 1.0, last + 1.0)
                } else {
                    format!("> at latest ({})", last + 1.0)
                };
                let node = host.build(NodeSpec::new("caption").text(marker));
                if let Err(e) = host.mount(node, table) {
                    warn!(error = %e, "cursor marker not mounted");
                }
            },
            &[self.index.clone()],
        );
    }

    fn cursor(&self) -> i64 {
        self.index.get().and_then(|v| v.as_f64()).unwrap_or(-1.0) as i64
    }

    fn apply(&self, step: Step) -> Result<(), StateError> {
        let len = self.history.len().unwrap_or(0) as i64;
        let cursor = self.cursor();
        match step {
            Step::Push(command) => {
                // Pushing after an undo drops the undone tail first.
                if cursor + 1 < len {
                    self.history.splice_at((cursor + 1) as usize, None, Vec::<Value>::new())?;
                }
                self.history.append([command])?;
                self.index.set(cursor + 1)?;
            }
            Step::Undo if cursor >= 0 => {
                self.index.set(cursor - 1)?;
            }
            Step::Redo if cursor + 1 < len => {
                self.index.set(cursor + 1)?;
            }
            Step::Truncate => {
                self.history.splice_at((cursor + 1).max(0) as usize, None, Vec::<Value>::new())?;
                // Re-render the marker against the shorter history.
                self.index.set(cursor)?;
            }
            Step::Undo | Step::Redo => info!(?step, "nothing to do"),
        }
        Ok(())
    }

    fn print(&self, label: &str) {
        println!("-- {label}");
        for child in self.host.children(self.table) {
            let indent = if self.host.tag(child).as_deref() == Some("caption") { "" } else { "   " };
            println!("{indent}{}", self.host.text_content(child));
        }
    }
}

fn run() -> Result<(), String> {
    let config = load_config()?;
    let feed = Feed::new(config)?;
    feed.print("start");
    for step in SCRIPT {
        feed.apply(*step).map_err(|e| e.to_string())?;
        let report = feed.engine.flush();
        info!(?step, rounds = report.rounds, invocations = report.invocations, "step applied");
        feed.print(&format!("{step:?}"));
    }
    let snapshot = serde_json::Value::from(&feed.engine.snapshot());
    let pretty = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
    println!("-- final store\n{pretty}");

    feed.host.destroy(feed.table);
    info!(routines = feed.engine.routine_count(), "feed closed");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("tether-demo: {message}");
            ExitCode::FAILURE
        }
    }
}
