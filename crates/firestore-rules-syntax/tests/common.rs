//! Shared helpers for parser and incremental tests.
#![allow(dead_code, unused_imports)]

pub use firestore_rules_syntax::{
    load_grammar, parse, reparse, Edit, Grammar, Node, SyntaxKind, TokenKind, Tree,
};
pub use text_size::{TextRange, TextSize};

/// The built-in grammar.
pub fn grammar() -> &'static Grammar {
    load_grammar().expect("built-in grammar is valid")
}

/// Installs a test log subscriber; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Parses `source` and formats the tree plus its errors for snapshot testing.
pub fn snapshot_parse(source: &str) -> String {
    let tree = parse(grammar(), source);
    let mut output = tree.dump();

    if tree.has_error() {
        output.push_str("---\nErrors:\n");
        for err in tree.errors() {
            output.push_str(&format!("  - {err}\n"));
        }
    }

    output
}

/// All nodes of `kind`, in preorder.
pub fn nodes<'t>(tree: &'t Tree, kind: SyntaxKind) -> Vec<Node<'t>> {
    tree.root()
        .descendants()
        .filter(|node| node.kind() == kind)
        .collect()
}

/// The `nth` node of `kind`, in preorder.
pub fn find<'t>(tree: &'t Tree, kind: SyntaxKind, nth: usize) -> Node<'t> {
    nodes(tree, kind)
        .into_iter()
        .nth(nth)
        .unwrap_or_else(|| panic!("no {kind:?} #{nth} in\n{}", tree.dump()))
}

/// Byte offset of the first occurrence of `needle`.
pub fn offset_of(text: &str, needle: &str) -> TextSize {
    let index = text
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not in {text:?}"));
    TextSize::try_from(index).unwrap()
}

/// Replaces `range` of `text` and returns the new text with its edit.
pub fn apply(text: &str, range: TextRange, replacement: &str) -> (String, Edit) {
    let edit = Edit::replace(text, range, replacement);
    let mut new_text = String::with_capacity(text.len() + replacement.len());
    new_text.push_str(&text[..usize::from(range.start())]);
    new_text.push_str(replacement);
    new_text.push_str(&text[usize::from(range.end())..]);
    (new_text, edit)
}

/// Asserts that the tree covers its whole text, without gaps.
pub fn assert_covers(tree: &Tree) {
    assert_eq!(tree.syntax().text().to_string(), tree.text());
    assert_eq!(tree.root().kind(), SyntaxKind::SourceFile);
    assert_eq!(
        tree.root().byte_range(),
        TextRange::new(0.into(), TextSize::of(tree.text()))
    );
}
