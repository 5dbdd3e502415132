//! Property-based tests for the parser.
//!
//! Inputs are stitched together from rules-language fragments, so most of
//! them are almost-valid rules files with errors in odd places.

mod common;
use common::*;

use firestore_rules_syntax::tree::read_dump;
use proptest::prelude::*;
use proptest::sample::Index;

// ============================================================================
// Strategies for generating test inputs
// ============================================================================

const FRAGMENTS: &[&str] = &[
    "service", " ", " ", "\n", "cloud.firestore", "{", "}", "{", "}", "match", "/", "users",
    "/{uid}", "/{doc=**}", "allow", "read", "write", ", ", ":", "if", "a", "b", "==", "&&",
    "||", "!", "-", "(", ")", ";", ";", "function", "f", "let", "=", "return", "1", "'s'",
    "$(", ".", "[", "]", "?", "// c\n", "/* c */", "rules_version", "'2'", "#",
];

fn arb_fragment() -> impl Strategy<Value = &'static str> {
    prop::sample::select(FRAGMENTS)
}

/// Strategy for rules-like sources
fn arb_source() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..80).prop_map(|parts| parts.concat())
}

/// Strategy for a well-formed file with a few match blocks
fn arb_rules_file() -> impl Strategy<Value = String> {
    let statement = prop_oneof![
        Just("allow read;"),
        Just("allow write: if a == b;"),
        Just("allow get, list: if request.auth != null && x[0] > 1;"),
        Just("function f(x) { let y = x + 1; return y * 2; }"),
    ];
    let block = (
        "[a-z]{1,6}",
        prop::collection::vec(statement, 1..4),
    )
        .prop_map(|(segment, statements)| {
            // The prefix keeps segments from colliding with keywords.
            format!("  match /col_{segment}/{{id}} {{\n    {}\n  }}\n", statements.join("\n    "))
        });
    prop::collection::vec(block, 1..5)
        .prop_map(|blocks| format!("service cloud.firestore {{\n{}}}\n", blocks.concat()))
}

/// Strategy for an edit of `source`: a byte range and its replacement.
fn arb_edit(source: impl Strategy<Value = String>) -> impl Strategy<Value = (String, TextRange, String)> {
    (source, any::<Index>(), any::<Index>(), arb_source()).prop_map(
        |(text, start, len, mut replacement)| {
            replacement.truncate(12);
            let start = start.index(text.len() + 1);
            let end = start + len.index(text.len() - start + 1).min(16);
            let range = TextRange::new(
                TextSize::try_from(start).unwrap(),
                TextSize::try_from(end).unwrap(),
            );
            (text, range, replacement)
        },
    )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn parse_covers_any_text(text in "\\PC{0,120}") {
        let tree = parse(grammar(), &text);
        assert_covers(&tree);
    }

    #[test]
    fn parse_covers_fragments(text in arb_source()) {
        let tree = parse(grammar(), &text);
        assert_covers(&tree);
        for error in tree.errors() {
            prop_assert!(error.range.end() <= TextSize::of(text.as_str()));
        }
    }

    #[test]
    fn parse_is_deterministic(text in arb_source()) {
        let first = parse(grammar(), &text);
        let second = parse(grammar(), &text);
        prop_assert_eq!(first.dump(), second.dump());
    }

    #[test]
    fn generated_files_are_valid(text in arb_rules_file()) {
        let tree = parse(grammar(), &text);
        prop_assert!(!tree.has_error(), "{}", tree.dump());
    }

    #[test]
    fn dump_reads_back(text in arb_source()) {
        let tree = parse(grammar(), &text);
        let shape = read_dump(&tree.dump()).unwrap();
        prop_assert_eq!(shape, tree.shape());
    }

    #[test]
    fn reparse_matches_full_parse((text, range, replacement) in arb_edit(arb_source())) {
        let old = parse(grammar(), &text);
        let (new_text, edit) = apply(&text, range, &replacement);
        let incremental = reparse(grammar(), &new_text, &old, &[edit]);
        let full = parse(grammar(), &new_text);
        prop_assert_eq!(incremental.dump(), full.dump());
        prop_assert_eq!(incremental.text(), new_text.as_str());
    }

    #[test]
    fn reparse_of_valid_files_matches_full_parse(
        (text, range, replacement) in arb_edit(arb_rules_file())
    ) {
        let old = parse(grammar(), &text);
        let (new_text, edit) = apply(&text, range, &replacement);
        let incremental = reparse(grammar(), &new_text, &old, &[edit]);
        prop_assert_eq!(incremental.dump(), parse(grammar(), &new_text).dump());

        // A second edit on top of the incremental tree.
        let (newer_text, undo) = apply(
            &new_text,
            TextRange::at(range.start(), TextSize::of(replacement.as_str())),
            &text[range],
        );
        prop_assert_eq!(newer_text.as_str(), text.as_str());
        let restored = reparse(grammar(), &newer_text, &incremental, &[undo]);
        prop_assert_eq!(restored.dump(), old.dump());
    }
}
