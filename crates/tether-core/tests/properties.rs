use std::rc::Rc;

use proptest::prelude::*;
use tether_core::path::{derive_path, prefixes, segments};
use tether_core::{Engine, Host, KeyedList, ListEdit, Record, Value};
use tether_harness::{MemoryHost, NodeSpec};

#[derive(Debug, Clone)]
enum Op {
    Append(Vec<u8>),
    RemoveLast,
    RemoveFirst,
    InsertFirst(Vec<u8>),
    Splice(usize, Option<usize>, Vec<u8>),
    /// Write one item in place; the index wraps around the current length.
    SetItem(usize, u8),
}

fn op() -> impl Strategy<Value = Op> {
    let items = || prop::collection::vec(any::<u8>(), 0..4);
    prop_oneof![
        items().prop_map(Op::Append),
        Just(Op::RemoveLast),
        Just(Op::RemoveFirst),
        items().prop_map(Op::InsertFirst),
        (0usize..8, prop::option::of(0usize..4), items())
            .prop_map(|(s, c, i)| Op::Splice(s, c, i)),
        (0usize..8, any::<u8>()).prop_map(|(i, v)| Op::SetItem(i, v)),
    ]
}

fn values(items: &[u8]) -> Vec<Value> {
    items.iter().map(|b| Value::from(u32::from(*b))).collect()
}

fn key() -> impl Strategy<Value = String> {
    prop_oneof!["[a-z_][a-z0-9_]{0,6}", "[0-9]{1,3}"]
}

proptest! {
    #[test]
    fn derived_paths_parse_back_into_their_keys(keys in prop::collection::vec(key(), 0..6)) {
        let mut path = String::new();
        let mut expected_prefixes = Vec::new();
        for k in &keys {
            path = derive_path(&path, k);
            expected_prefixes.push(path.clone());
        }
        let parsed: Vec<&str> = segments(&path).map(|(s, _)| s.key()).collect();
        prop_assert_eq!(parsed, keys.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(prefixes(&path).collect::<Vec<_>>(), expected_prefixes);
    }

    #[test]
    fn keyed_list_stays_in_lockstep(initial in prop::collection::vec(any::<u8>(), 0..6),
                                    ops in prop::collection::vec(op(), 0..24)) {
        let mut list = KeyedList::from_values(values(&initial));
        let mut shadow = values(&initial);
        let mut retired = std::collections::HashSet::new();
        for op in ops {
            let before = list.keys().to_vec();
            let edit = match op {
                Op::Append(items) => {
                    shadow.extend(values(&items));
                    list.append(values(&items))
                }
                Op::RemoveLast => {
                    shadow.pop();
                    list.remove_last().1
                }
                Op::RemoveFirst => {
                    if !shadow.is_empty() {
                        shadow.remove(0);
                    }
                    list.remove_first().1
                }
                Op::InsertFirst(items) => {
                    shadow.splice(0..0, values(&items));
                    list.insert_first(values(&items))
                }
                Op::Splice(start, count, items) => {
                    let start = start.min(shadow.len());
                    let end = count.map_or(shadow.len(), |c| (start + c).min(shadow.len()));
                    shadow.splice(start..end, values(&items));
                    list.splice_at(start, count, values(&items)).1
                }
                Op::SetItem(index, v) => {
                    if !shadow.is_empty() {
                        let index = index % shadow.len();
                        shadow[index] = Value::from(u32::from(v));
                        *list.get_mut(index).unwrap() = Value::from(u32::from(v));
                    }
                    prop_assert_eq!(list.keys(), &before[..]);
                    ListEdit::default()
                }
            };
            prop_assert_eq!(list.keys().len(), list.len());
            prop_assert_eq!(list.values(), &shadow[..]);
            // Survivors keep their keys; removed keys never come back.
            for k in &edit.removed {
                prop_assert!(before.contains(k));
                retired.insert(*k);
            }
            for k in &edit.added {
                prop_assert!(!before.contains(k));
                prop_assert!(!retired.contains(k));
            }
        }
    }

    #[test]
    fn fast_path_matches_full_rerender(initial in prop::collection::vec(any::<u8>(), 0..6),
                                       ops in prop::collection::vec(op(), 0..12),
                                       flush_each in any::<bool>()) {
        let host = Rc::new(MemoryHost::new());
        let engine = Engine::new(
            Record::new().with("items", values(&initial)),
            Rc::clone(&host) as Rc<dyn Host>,
        );
        let ul = host.build(NodeSpec::new("ul"));
        host.mount(ul, host.root()).unwrap();
        let items = engine.node("items").unwrap();
        let h = Rc::clone(&host);
        engine.reactive_list(
            move |item, _| {
                let li = h.build(item.value().to_string().as_str());
                h.mount(li, ul).unwrap();
            },
            &items,
            &[],
        );

        for op in ops {
            match op {
                Op::Append(v) => items.append(values(&v)).unwrap(),
                Op::RemoveLast => { items.remove_last().unwrap(); }
                Op::RemoveFirst => { items.remove_first().unwrap(); }
                Op::InsertFirst(v) => items.insert_first(values(&v)).unwrap(),
                Op::Splice(s, c, v) => { items.splice_at(s, c, values(&v)).unwrap(); }
                Op::SetItem(i, v) => {
                    // Later ops in the same flush may shift or drop the item.
                    let len = items.len().unwrap_or(0);
                    if len > 0 {
                        items.index(i % len).unwrap().set(u32::from(v)).unwrap();
                    }
                }
            }
            if flush_each {
                engine.flush();
            }
        }
        engine.flush();

        let expected: Vec<String> = items
            .get()
            .and_then(|v| v.as_list().map(|l| l.iter().map(ToString::to_string).collect()))
            .unwrap_or_default();
        prop_assert_eq!(host.child_texts(ul), expected);
        // Exactly one output node per item is alive under the list.
        prop_assert_eq!(host.node_count(), 2 + items.len().unwrap_or(0));
    }
}
