#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_core::path::{derive_path, is_descendant, is_valid_key, prefixes, segments, split_last};

fuzz_target!(|input: (&str, &str)| {
    let (path, key) = input;

    let mut last_end = 0;
    for (_, end) in segments(path) {
        assert!(end > last_end && end <= path.len());
        last_end = end;
    }
    for prefix in prefixes(path) {
        assert!(path.starts_with(prefix));
    }
    if let Some((parent, _)) = split_last(path) {
        assert!(parent.len() < path.len());
    }

    if is_valid_key(key) {
        let child = derive_path(path, key);
        assert!(is_descendant(&child, path));
        if last_end == path.len() {
            assert_eq!(split_last(&child).map(|(_, segment)| segment.key()), Some(key));
        }
    }
});
