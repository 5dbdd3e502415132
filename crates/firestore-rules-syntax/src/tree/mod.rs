//! The tree model.
//!
//! A [`Tree`] owns a rowan green root together with everything a later
//! incremental reparse needs: the token stream, the table of reusable
//! subtrees and the edits applied since the tree was parsed. Trees are
//! persistent values. [`Tree::edit`] returns a new tree and leaves the
//! original untouched, and both share the same green nodes.

mod dump;
mod edit;

use std::fmt;
use std::sync::Arc;

use rowan::GreenNode;
use text_size::{TextRange, TextSize};

use crate::lexer::{Token, TokenKind};
use crate::parser::ReuseTable;
use crate::syntax::{SyntaxKind, SyntaxNode};

pub(crate) use edit::ByteEdit;
pub use dump::{read_dump, DumpError, Shape};
pub use edit::{Edit, Point};

/// The result of a parse.
#[derive(Clone)]
pub struct Tree {
    green: GreenNode,
    text: Arc<str>,
    tokens: Arc<[Token]>,
    reuse: Arc<ReuseTable>,
    edits: Arc<[Edit]>,
}

impl Tree {
    pub(crate) fn new(
        green: GreenNode,
        text: Arc<str>,
        tokens: Arc<[Token]>,
        reuse: Arc<ReuseTable>,
    ) -> Self {
        Self {
            green,
            text,
            tokens,
            reuse,
            edits: Vec::new().into(),
        }
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        Node {
            raw: self.syntax(),
            tree: self,
        }
    }

    /// Returns the lossless rowan view of the tree.
    #[must_use]
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// The text the tree was parsed from. Pending edits are not applied to it.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the parsed text in bytes.
    #[must_use]
    pub fn len(&self) -> TextSize {
        TextSize::of(&*self.text)
    }

    /// Returns `true` if the parsed text was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of edits applied with [`Tree::edit`] since the tree was parsed.
    #[must_use]
    pub fn edit_depth(&self) -> usize {
        self.edits.len()
    }

    /// Edits applied since the tree was parsed, oldest first.
    #[must_use]
    pub fn pending_edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Records an edit. The returned tree shares all nodes with `self`;
    /// node ranges of the returned tree are reported in the coordinates of
    /// the edited text. Pass it to a reparse together with the new text.
    #[must_use]
    pub fn edit(&self, edit: &Edit) -> Tree {
        let edits: Arc<[Edit]> = self.edits.iter().copied().chain([*edit]).collect();
        Tree {
            edits,
            ..self.clone()
        }
    }

    pub(crate) fn without_pending_edits(&self) -> Tree {
        Tree {
            edits: Vec::new().into(),
            ..self.clone()
        }
    }

    pub(crate) fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub(crate) fn reuse_table(&self) -> &ReuseTable {
        &self.reuse
    }

    /// Maps a range of the parsed text through the pending edits.
    fn map_range(&self, range: TextRange) -> TextRange {
        self.edits
            .iter()
            .fold(range, |range, edit| edit.map_range(range))
    }

    /// Returns the smallest node that covers `range` of the parsed text.
    /// A range outside the text is clamped to it.
    #[must_use]
    pub fn covering_node(&self, range: TextRange) -> Node<'_> {
        let root = self.syntax();
        let full = root.text_range();
        let start = range.start().min(full.end());
        let end = range.end().clamp(start, full.end());
        let raw = match root.covering_element(TextRange::new(start, end)) {
            rowan::NodeOrToken::Node(node) => node,
            rowan::NodeOrToken::Token(token) => token.parent().unwrap_or(root),
        };
        Node { raw, tree: self }
    }

    /// Returns `true` if the tree contains error or missing nodes.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.root().has_error()
    }

    /// Describes every error and missing node, in source order.
    #[must_use]
    pub fn errors(&self) -> Vec<SyntaxError> {
        self.root()
            .descendants()
            .filter_map(|node| {
                let message = match node.kind() {
                    SyntaxKind::ErrorNode => {
                        let found = node
                            .raw
                            .first_token()
                            .and_then(|t| t.kind().to_token())
                            .map_or("input", TokenKind::describe);
                        format!("unexpected {found}")
                    }
                    SyntaxKind::MissingNode => match node.expected_token() {
                        Some(expected) => format!("expected {}", expected.describe()),
                        None => {
                            let context = node.parent().map_or("input", |p| p.kind().name());
                            format!("incomplete {context}")
                        }
                    },
                    _ => return None,
                };
                Some(SyntaxError {
                    message,
                    range: node.byte_range(),
                })
            })
            .collect()
    }

    /// Writes the node structure as an indented S-expression, one node per
    /// line. Tokens are left out.
    #[must_use]
    pub fn dump(&self) -> String {
        dump::write(self)
    }

    /// The node structure as a comparable value.
    #[must_use]
    pub fn shape(&self) -> Shape {
        Shape::of(self.root())
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("len", &self.len())
            .field("tokens", &self.tokens.len())
            .field("reusable", &self.reuse.len())
            .field("edit_depth", &self.edit_depth())
            .finish()
    }
}

/// A node of a [`Tree`].
#[derive(Clone)]
pub struct Node<'t> {
    raw: SyntaxNode,
    tree: &'t Tree,
}

impl<'t> Node<'t> {
    fn wrap(&self, raw: SyntaxNode) -> Node<'t> {
        Node {
            raw,
            tree: self.tree,
        }
    }

    /// The node kind.
    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        self.raw.kind()
    }

    /// The node's byte range, mapped through the tree's pending edits.
    #[must_use]
    pub fn byte_range(&self) -> TextRange {
        self.tree.map_range(self.raw.text_range())
    }

    /// Returns `true` for nodes wrapping input the parser skipped.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind() == SyntaxKind::ErrorNode
    }

    /// Returns `true` for zero-width nodes standing in for absent input.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.kind() == SyntaxKind::MissingNode
    }

    /// For a missing node, the token that was expected in its place.
    #[must_use]
    pub fn expected_token(&self) -> Option<TokenKind> {
        if !self.is_missing() {
            return None;
        }
        self.raw.first_token()?.kind().to_token()
    }

    /// Returns `true` if this node or any descendant is an error or
    /// missing node.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.raw
            .descendants()
            .any(|n| matches!(n.kind(), SyntaxKind::ErrorNode | SyntaxKind::MissingNode))
    }

    /// Returns `true` if a pending edit touches this node.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let mut range = self.raw.text_range();
        for edit in self.tree.pending_edits() {
            if edit.touches(range) {
                return true;
            }
            range = edit.map_range(range);
        }
        false
    }

    /// The parent node.
    #[must_use]
    pub fn parent(&self) -> Option<Node<'t>> {
        self.raw.parent().map(|raw| self.wrap(raw))
    }

    /// Child nodes, in order.
    pub fn children(&self) -> impl Iterator<Item = Node<'t>> {
        let tree = self.tree;
        self.raw.children().map(move |raw| Node { raw, tree })
    }

    /// The child node at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.raw.children().nth(index).map(|raw| self.wrap(raw))
    }

    /// Number of child nodes.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.raw.children().count()
    }

    /// The first child node.
    #[must_use]
    pub fn first_child(&self) -> Option<Node<'t>> {
        self.raw.first_child().map(|raw| self.wrap(raw))
    }

    /// The last child node.
    #[must_use]
    pub fn last_child(&self) -> Option<Node<'t>> {
        self.raw.last_child().map(|raw| self.wrap(raw))
    }

    /// The next sibling node.
    #[must_use]
    pub fn next_sibling(&self) -> Option<Node<'t>> {
        self.raw.next_sibling().map(|raw| self.wrap(raw))
    }

    /// The previous sibling node.
    #[must_use]
    pub fn prev_sibling(&self) -> Option<Node<'t>> {
        self.raw.prev_sibling().map(|raw| self.wrap(raw))
    }

    /// This node and all nodes below it, in preorder.
    pub fn descendants(&self) -> impl Iterator<Item = Node<'t>> {
        let tree = self.tree;
        self.raw.descendants().map(move |raw| Node { raw, tree })
    }

    /// The underlying rowan node.
    #[must_use]
    pub fn syntax(&self) -> &SyntaxNode {
        &self.raw
    }

    /// The node's text in the parsed text.
    #[must_use]
    pub fn text(&self) -> &'t str {
        let tree: &'t Tree = self.tree;
        tree.text
            .get(std::ops::Range::<usize>::from(self.raw.text_range()))
            .unwrap_or_default()
    }

    /// Returns `true` if both nodes are backed by the same green node, which
    /// is the case for subtrees a reparse reused.
    #[must_use]
    pub fn shares_structure_with(&self, other: &Node<'_>) -> bool {
        let (ours, theirs) = (self.raw.green(), other.raw.green());
        std::ptr::eq(&*ours, &*theirs)
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:?}", self.kind(), self.byte_range())
    }
}

/// A syntax error derived from an error or missing node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// The error message.
    pub message: String,
    /// The byte range where the error occurred.
    pub range: TextRange,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}..{}",
            self.message,
            u32::from(self.range.start()),
            u32::from(self.range.end())
        )
    }
}

impl std::error::Error for SyntaxError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::load_grammar;
    use crate::parser::parse;

    const SOURCE: &str = "service s {\n  match /a { allow read; }\n  match /b { allow write; }\n}";

    fn find<'t>(tree: &'t Tree, kind: SyntaxKind, nth: usize) -> Node<'t> {
        tree.root()
            .descendants()
            .filter(|n| n.kind() == kind)
            .nth(nth)
            .unwrap()
    }

    #[test]
    fn test_navigation() {
        let tree = parse(load_grammar().unwrap(), SOURCE);
        let root = tree.root();
        assert_eq!(root.byte_range(), TextRange::new(0.into(), tree.len()));
        assert_eq!(root.child_count(), 1);

        let block = find(&tree, SyntaxKind::Block, 0);
        assert_eq!(block.child_count(), 2);
        let first = block.first_child().unwrap();
        let second = block.last_child().unwrap();
        assert_eq!(first.next_sibling().unwrap().byte_range(), second.byte_range());
        assert_eq!(second.prev_sibling().unwrap().byte_range(), first.byte_range());
        assert_eq!(block.child(1).unwrap().text(), "match /b { allow write; }");
        assert_eq!(first.parent().unwrap().kind(), SyntaxKind::Block);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_edit_is_persistent() {
        let tree = parse(load_grammar().unwrap(), SOURCE);
        let offset = TextSize::try_from(SOURCE.find("/a").unwrap() + 2).unwrap();
        let edit = Edit::insert(SOURCE, offset, "bc");
        let edited = tree.edit(&edit);

        assert_eq!(tree.edit_depth(), 0);
        assert_eq!(edited.edit_depth(), 1);
        assert!(edited.root().shares_structure_with(&tree.root()));

        let second_old = find(&tree, SyntaxKind::MatchDecl, 1);
        let second_new = find(&edited, SyntaxKind::MatchDecl, 1);
        assert_eq!(
            second_new.byte_range(),
            TextRange::new(
                second_old.byte_range().start() + TextSize::from(2),
                second_old.byte_range().end() + TextSize::from(2),
            )
        );
        assert!(!second_new.has_changes());
        assert!(find(&edited, SyntaxKind::MatchDecl, 0).has_changes());
        assert!(edited.root().has_changes());
    }

    #[test]
    fn test_covering_node() {
        let tree = parse(load_grammar().unwrap(), SOURCE);
        let offset = TextSize::try_from(SOURCE.find("write").unwrap()).unwrap();
        let node = tree.covering_node(TextRange::empty(offset + TextSize::from(1)));
        assert_eq!(node.kind(), SyntaxKind::MethodList);
        let whole = tree.covering_node(TextRange::new(0.into(), 1000.into()));
        assert_eq!(whole.byte_range(), TextRange::new(0.into(), tree.len()));
    }

    #[test]
    fn test_errors_view() {
        let tree = parse(load_grammar().unwrap(), "service s { allow read }");
        assert!(tree.has_error());
        let errors = tree.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected `;`");
        assert_eq!(errors[0].to_string(), "expected `;` at 23..23");
        let missing = find(&tree, SyntaxKind::MissingNode, 0);
        assert!(missing.is_missing());
        assert_eq!(missing.expected_token(), Some(TokenKind::Semicolon));
    }

    #[test]
    fn test_tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tree>();
    }
}
