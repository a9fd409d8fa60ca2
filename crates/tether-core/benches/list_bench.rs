//! Benchmarks for keyed list dispatch: edit pass versus full re-render.
//!
//! Run with: cargo bench -p tether-core --bench list_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::rc::Rc;
use tether_core::{Engine, Host, Record, Value};
use tether_harness::{MemoryHost, NodeSpec};

/// Engine with one list routine rendering `len` items under a `<ul>`.
fn engine_with_list(len: usize) -> (Rc<MemoryHost>, Engine) {
    let host = Rc::new(MemoryHost::new());
    let items: Vec<Value> = (0..len).map(Value::from).collect();
    let engine = Engine::new(
        Record::new().with("items", items),
        Rc::clone(&host) as Rc<dyn Host>,
    );
    let ul = host.build(NodeSpec::new("ul"));
    let h = Rc::clone(&host);
    let list = engine.state().at("items");
    engine.reactive_list(
        move |item, _| {
            let li = h.build(item.value().to_string().as_str());
            let _ = h.mount(li, ul);
        },
        &list,
        &[],
    );
    (host, engine)
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("list/append_one");
    for len in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("edit", len), &len, |b, &len| {
            let (_host, engine) = engine_with_list(len);
            let items = engine.state().at("items");
            b.iter(|| {
                items.append([Value::from(0)]).ok();
                black_box(engine.flush());
                items.remove_last().ok();
                black_box(engine.flush());
            });
        });
    }
    group.finish();
}

fn bench_full_rerender(c: &mut Criterion) {
    let mut group = c.benchmark_group("list/replace_all");
    for len in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("full", len), &len, |b, &len| {
            let (_host, engine) = engine_with_list(len);
            let items = engine.state().at("items");
            let replacement: Vec<Value> = (0..len).map(Value::from).collect();
            b.iter(|| {
                items.set(replacement.clone()).ok();
                black_box(engine.flush());
            });
        });
    }
    group.finish();
}

fn bench_item_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("list/item_write");
    for len in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("refresh", len), &len, |b, &len| {
            let (_host, engine) = engine_with_list(len);
            let target = engine.state().at("items").at(&(len / 2).to_string());
            let mut n = 0u32;
            b.iter(|| {
                n = n.wrapping_add(1);
                target.set(n).ok();
                black_box(engine.flush());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_full_rerender, bench_item_refresh);
criterion_main!(benches);
