#![no_main]

use firestore_rules_syntax::{load_grammar, parse};
use libfuzzer_sys::fuzz_target;

const MAX_SOURCE_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_SOURCE_BYTES)];
    let source = String::from_utf8_lossy(capped);
    let Ok(grammar) = load_grammar() else {
        return;
    };

    let tree = parse(grammar, &source);
    assert_eq!(tree.text(), source.as_ref());
    assert_eq!(tree.syntax().text().to_string(), source.as_ref());
    assert_eq!(u32::from(tree.root().byte_range().end()) as usize, source.len());
    for error in tree.errors() {
        assert!(u32::from(error.range.end()) as usize <= source.len());
    }
});
