use proptest::prelude::*;
use tether_core::{Host, NodeHandle};
use tether_harness::{Lifecycle, MemoryHost, NodeSpec};

#[derive(Debug, Clone)]
enum Op {
    Build(u8),
    Mount(usize, usize),
    Unmount(usize),
    Destroy(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3).prop_map(Op::Build),
        (0usize..16, 0usize..16).prop_map(|(n, t)| Op::Mount(n, t)),
        (0usize..16).prop_map(Op::Unmount),
        (0usize..16).prop_map(Op::Destroy),
    ]
}

fn pick(built: &[NodeHandle], i: usize) -> Option<NodeHandle> {
    built.get(i % built.len().max(1)).copied()
}

/// Every live node's parent lists it exactly once, and every listed child
/// points back at its parent.
fn assert_consistent(host: &MemoryHost, built: &[NodeHandle]) -> Result<(), TestCaseError> {
    for &node in built.iter().chain(std::iter::once(&host.root())) {
        if !host.is_alive(node) {
            prop_assert!(host.children(node).is_empty());
            continue;
        }
        for child in host.children(node) {
            prop_assert!(host.is_alive(child));
            prop_assert_eq!(host.parent(child), Some(node));
        }
        if let Some(parent) = host.parent(node) {
            let hits = host.children(parent).iter().filter(|c| **c == node).count();
            prop_assert_eq!(hits, 1);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn random_mutations_keep_the_tree_consistent(ops in prop::collection::vec(op(), 0..48)) {
        let host = MemoryHost::new();
        let mut built: Vec<NodeHandle> = Vec::new();
        for op in ops {
            match op {
                Op::Build(depth) => {
                    let mut spec = NodeSpec::new("div");
                    for _ in 0..depth {
                        spec = NodeSpec::new("div").child(spec);
                    }
                    built.push(host.build(spec));
                }
                Op::Mount(n, t) => {
                    let target = if t % 4 == 0 { Some(host.root()) } else { pick(&built, t) };
                    if let (Some(node), Some(target)) = (pick(&built, n), target) {
                        let _ = host.mount(node, target);
                    }
                }
                Op::Unmount(n) => {
                    if let Some(node) = pick(&built, n) {
                        let _ = host.unmount(node);
                    }
                }
                Op::Destroy(n) => {
                    if let Some(node) = pick(&built, n) {
                        host.destroy(node);
                    }
                }
            }
            assert_consistent(&host, &built)?;
        }
        prop_assert!(host.is_alive(host.root()));
        prop_assert_eq!(
            host.count(Lifecycle::Destroy),
            host.count(Lifecycle::BeforeDestroy)
        );
    }
}
