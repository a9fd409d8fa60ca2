#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_core::{KeyedList, Value};

#[derive(Debug, Arbitrary)]
enum Op {
    Append(Vec<u8>),
    RemoveLast,
    RemoveFirst,
    InsertFirst(Vec<u8>),
    Splice { start: u8, count: Option<u8>, items: Vec<u8> },
}

fn values(items: &[u8]) -> Vec<Value> {
    items.iter().map(|b| Value::from(u32::from(*b))).collect()
}

fuzz_target!(|input: (Vec<u8>, Vec<Op>)| {
    let (initial, ops) = input;
    let mut list = KeyedList::from_values(values(&initial));
    for op in ops.into_iter().take(256) {
        let before = list.len();
        let edit = match op {
            Op::Append(items) => list.append(values(&items)),
            Op::RemoveLast => list.remove_last().1,
            Op::RemoveFirst => list.remove_first().1,
            Op::InsertFirst(items) => list.insert_first(values(&items)),
            Op::Splice { start, count, items } => {
                list.splice_at(usize::from(start), count.map(usize::from), values(&items)).1
            }
        };
        assert_eq!(list.keys().len(), list.len());
        assert_eq!(before + edit.added.len() - edit.removed.len(), list.len());
        for key in &edit.added {
            assert!(list.position(*key).is_some());
        }
        for key in &edit.removed {
            assert!(list.position(*key).is_none());
        }
    }
});
