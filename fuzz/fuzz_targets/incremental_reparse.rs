#![no_main]

use firestore_rules_syntax::{load_grammar, parse, reparse, Edit, TextRange, TextSize};
use libfuzzer_sys::fuzz_target;

const MAX_SOURCE_BYTES: usize = 4096;

fn decode_source(bytes: &[u8]) -> String {
    let capped = &bytes[..bytes.len().min(MAX_SOURCE_BYTES)];
    String::from_utf8_lossy(capped).into_owned()
}

fn char_boundary(text: &str, seed: u8) -> usize {
    if text.is_empty() {
        return 0;
    }
    let mut offset = usize::from(seed) * text.len() / 255;
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let Ok(grammar) = load_grammar() else {
        return;
    };

    // Layout: [start seed, length seed, split seed, source.., replacement..]
    let body = &data[3..];
    let split = usize::from(data[2]) % (body.len() + 1);
    let source = decode_source(&body[..split]);
    let replacement = decode_source(&body[split..]);

    let start = char_boundary(&source, data[0]);
    let rest = &source[start..];
    let end = start + char_boundary(rest, data[1]);

    let mut new_text = String::with_capacity(source.len() + replacement.len());
    new_text.push_str(&source[..start]);
    new_text.push_str(&replacement);
    new_text.push_str(&source[end..]);

    let old = parse(grammar, &source);
    let (Ok(start), Ok(end)) = (TextSize::try_from(start), TextSize::try_from(end)) else {
        return;
    };
    let edit = Edit::replace(&source, TextRange::new(start, end), &replacement);
    let incremental = reparse(grammar, &new_text, &old, &[edit]);
    let full = parse(grammar, &new_text);

    assert_eq!(incremental.text(), new_text);
    assert_eq!(incremental.dump(), full.dump());
});
