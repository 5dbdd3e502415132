//! Parser for Firestore security rules.
//!
//! The parser is driven entirely by the compiled [`Grammar`]: it walks the
//! grammar's productions and builds a lossless concrete syntax tree (CST)
//! using the `rowan` library.
//!
//! # Design
//!
//! The parser is designed for editor use:
//!
//! - **Error-tolerant**: Every input produces a tree covering all of it
//! - **Lossless**: Preserves all source text including whitespace and comments
//! - **Incremental**: A reparse after an edit splices unaffected subtrees of
//!   the previous tree instead of rebuilding them
//!
//! # Architecture
//!
//! The parser uses a three-phase approach:
//!
//! 1. **Lexing**: Tokenize source text (see `lexer` module), or relex only
//!    the edited window when a previous tree is available
//! 2. **Parsing**: Build a flat stream of events (start node, add token,
//!    finish node, splice previous node)
//! 3. **Tree Building**: Convert events into a `rowan` green tree

mod engine;
mod event;
mod reuse;
mod sink;
mod source;

use std::sync::Arc;

use text_size::TextSize;

use crate::grammar::Grammar;
use crate::lexer::{lex, relex, Token};
use crate::tree::{ByteEdit, Edit, Tree};

use engine::Engine;
pub(crate) use reuse::{ReuseLookup, ReuseTable};
use sink::Sink;

/// A parser bound to one grammar.
#[derive(Debug, Clone, Copy)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    reuse_subtrees: bool,
}

impl<'g> Parser<'g> {
    /// Creates a parser for `grammar`.
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            reuse_subtrees: true,
        }
    }

    /// Controls whether [`Parser::reparse`] splices subtrees of the previous
    /// tree. When disabled every reparse is a full parse. The resulting
    /// trees have the same shape either way.
    #[must_use]
    pub fn reuse_subtrees(mut self, enabled: bool) -> Self {
        self.reuse_subtrees = enabled;
        self
    }

    /// The grammar this parser uses.
    #[must_use]
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Parses `source` from scratch.
    #[must_use]
    pub fn parse(&self, source: &str) -> Tree {
        let _span = tracing::debug_span!("parse", len = source.len()).entered();
        let tokens = lex(source);
        self.build(source, tokens, None)
    }

    /// Parses `source`, the text of `previous` after its pending edits and
    /// then `edits` were applied.
    ///
    /// Subtrees of `previous` that the edits cannot have affected are
    /// reused, so they are shared between the two trees. If the edits do
    /// not explain the difference between the old and new text, the edits
    /// are ignored and the text is parsed from scratch.
    #[must_use]
    pub fn reparse(&self, source: &str, previous: &Tree, edits: &[Edit]) -> Tree {
        let _span = tracing::debug_span!("reparse", len = source.len()).entered();

        let merged = ByteEdit::merge(previous.pending_edits().iter().chain(edits));
        let edit = match merged {
            Some(edit) => edit,
            None => match ByteEdit::diff(previous.text(), source) {
                Some(edit) => edit,
                None => return previous.without_pending_edits(),
            },
        };
        if !edit.explains(previous.text(), source) {
            tracing::warn!(
                start = u32::from(edit.start),
                old_end = u32::from(edit.old_end),
                new_end = u32::from(edit.new_end),
                "edits do not match the new text, parsing from scratch"
            );
            return self.parse(source);
        }
        if !self.reuse_subtrees {
            return self.parse(source);
        }

        let relexed = relex(previous.tokens(), source, edit);
        tracing::debug!(
            relexed = relexed.relexed,
            tokens = relexed.tokens.len(),
            resynced = relexed.resync_old.is_some(),
            "relexed"
        );
        let lookup = ReuseLookup {
            table: previous.reuse_table(),
            unchanged_prefix: relexed.unchanged_prefix,
            resync_old: relexed.resync_old,
            delta: edit.delta(),
        };
        self.build(source, relexed.tokens, Some(lookup))
    }

    fn build(&self, source: &str, tokens: Vec<Token>, reuse: Option<ReuseLookup<'_>>) -> Tree {
        let engine = Engine::new(self.grammar, &tokens, TextSize::of(source), reuse);
        let (events, reused) = engine.run();
        let sink = Sink::new(&tokens, source, reuse.map(|lookup| lookup.table), events);
        let (green, table) = sink.finish();

        tracing::debug!(
            events_reused = reused,
            reusable = table.len(),
            "tree built"
        );
        Tree::new(green, Arc::from(source), Arc::from(tokens), Arc::new(table))
    }
}

/// Parses `source` with `grammar`.
#[must_use]
pub fn parse(grammar: &Grammar, source: &str) -> Tree {
    Parser::new(grammar).parse(source)
}

/// Reparses `source` after `edits` were applied to the text of `previous`.
/// See [`Parser::reparse`].
#[must_use]
pub fn reparse(grammar: &Grammar, source: &str, previous: &Tree, edits: &[Edit]) -> Tree {
    Parser::new(grammar).reparse(source, previous, edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;
    use crate::syntax::SyntaxKind;

    fn kinds(tree: &Tree) -> Vec<SyntaxKind> {
        tree.root().descendants().map(|n| n.kind()).collect()
    }

    #[test]
    fn test_parse_allow() {
        let grammar = load_grammar().unwrap();
        let tree = parse(grammar, "service s { allow read; }");
        assert!(!tree.has_error());
        assert_eq!(
            kinds(&tree),
            vec![
                SyntaxKind::SourceFile,
                SyntaxKind::ServiceDecl,
                SyntaxKind::ServiceName,
                SyntaxKind::Block,
                SyntaxKind::AllowStmt,
                SyntaxKind::MethodList,
            ]
        );
    }

    #[test]
    fn test_parse_is_lossless() {
        let grammar = load_grammar().unwrap();
        let sources = [
            "",
            "  // only a comment\n",
            "service",
            "}}} service {",
            "rules_version = '2';\nservice cloud.firestore {\n  match /a/{b} { allow read: if b == 'x'; }\n}\n",
            "é ü # $",
        ];
        for source in sources {
            let tree = parse(grammar, source);
            assert_eq!(tree.syntax().text().to_string(), source);
            assert_eq!(tree.root().kind(), SyntaxKind::SourceFile);
        }
    }

    #[test]
    fn test_operator_precedence() {
        let grammar = load_grammar().unwrap();
        let tree = parse(grammar, "service s { allow read: if a || b && c == d + e * -f.g; }");
        assert!(!tree.has_error());
        let condition = tree
            .root()
            .descendants()
            .find(|n| n.kind() == SyntaxKind::AllowCondition)
            .unwrap();
        let top = condition
            .children()
            .find(|n| n.kind() == SyntaxKind::BinaryExpr)
            .unwrap();
        assert_eq!(top.text().trim(), "a || b && c == d + e * -f.g");
        let operands: Vec<_> = top.children().map(|n| n.text().trim().to_string()).collect();
        assert_eq!(operands, vec!["a", "b && c == d + e * -f.g"]);
    }

    #[test]
    fn test_left_associativity() {
        let grammar = load_grammar().unwrap();
        let tree = parse(grammar, "service s { allow read: if a - b - c; }");
        let top = tree
            .root()
            .descendants()
            .find(|n| n.kind() == SyntaxKind::BinaryExpr)
            .unwrap();
        let first = top.children().next().unwrap();
        assert_eq!(first.kind(), SyntaxKind::BinaryExpr);
        assert_eq!(first.text().trim(), "a - b");
    }

    #[test]
    fn test_reparse_without_edits_is_identity() {
        let grammar = load_grammar().unwrap();
        let source = "service s { match /a { allow read; } }";
        let tree = parse(grammar, source);
        let again = reparse(grammar, source, &tree, &[]);
        assert!(again.root().shares_structure_with(&tree.root()));
    }

    #[test]
    fn test_reuse_can_be_disabled() {
        let grammar = load_grammar().unwrap();
        let old = "service s { match /a { allow read; } match /b { allow write; } }";
        let tree = parse(grammar, old);
        let new = old.replacen("/a", "/aa", 1);
        let edit = Edit::insert(old, 20.into(), "a");

        let full = Parser::new(grammar)
            .reuse_subtrees(false)
            .reparse(&new, &tree, &[edit]);
        let incremental = Parser::new(grammar).reparse(&new, &tree, &[edit]);
        assert_eq!(full.dump(), incremental.dump());
        assert_eq!(full.dump(), parse(grammar, &new).dump());
    }
}
