//! Sink for converting parser events into a syntax tree.
//!
//! The sink takes the flat event stream and builds a `rowan` green tree.
//! Nodes of the previous tree referenced by [`Event::Reuse`] are spliced in
//! as they are, so they stay physically shared with that tree.

use rowan::{GreenNode, GreenToken, NodeOrToken};
use text_size::TextSize;

use crate::grammar::RuleId;
use crate::lexer::Token;
use crate::parser::event::Event;
use crate::parser::reuse::{ReuseEntry, ReuseTable};
use crate::syntax::SyntaxKind;

type GreenElement = NodeOrToken<GreenNode, GreenToken>;

struct OpenNode {
    kind: SyntaxKind,
    children: Vec<GreenElement>,
    first_token: usize,
    memo: Option<(RuleId, TextSize, u32)>,
}

/// Builds a syntax tree from parser events.
pub(crate) struct Sink<'t, 'src> {
    tokens: &'t [Token],
    source: &'src str,
    previous: Option<&'t ReuseTable>,
    events: Vec<Event>,
    cursor: usize,
    stack: Vec<OpenNode>,
    root: Option<GreenNode>,
    reuse: Vec<ReuseEntry>,
}

impl<'t, 'src> Sink<'t, 'src> {
    /// Creates a new sink. `previous` is the reuse table that
    /// [`Event::Reuse`] indices refer to.
    pub(crate) fn new(
        tokens: &'t [Token],
        source: &'src str,
        previous: Option<&'t ReuseTable>,
        events: Vec<Event>,
    ) -> Self {
        Self {
            tokens,
            source,
            previous,
            events,
            cursor: 0,
            stack: Vec::new(),
            root: None,
            reuse: Vec::new(),
        }
    }

    /// Consumes the sink and returns the green tree and its reuse table.
    pub(crate) fn finish(mut self) -> (GreenNode, ReuseTable) {
        for i in 0..self.events.len() {
            match std::mem::replace(&mut self.events[i], Event::Placeholder) {
                Event::Start {
                    kind,
                    forward_parent,
                } => {
                    // Handle forward parent chain
                    let mut kinds = vec![kind];
                    let mut idx = i;
                    let mut fp = forward_parent;

                    while let Some(fp_idx) = fp {
                        idx += fp_idx as usize;
                        if let Event::Start {
                            kind,
                            forward_parent,
                        } = std::mem::replace(&mut self.events[idx], Event::Placeholder)
                        {
                            kinds.push(kind);
                            fp = forward_parent;
                        } else {
                            break;
                        }
                    }

                    if !self.stack.is_empty() {
                        self.eat_trivia();
                    }
                    for kind in kinds.into_iter().rev() {
                        if kind != SyntaxKind::Tombstone {
                            self.start_node(kind);
                        }
                    }
                }
                Event::Token { kind, n_tokens } => {
                    self.eat_trivia();
                    for _ in 0..n_tokens {
                        self.token(kind);
                    }
                }
                Event::Finish => {
                    if self.stack.len() == 1 {
                        self.eat_rest();
                    }
                    self.finish_node();
                }
                Event::Missing { expected } => {
                    self.eat_trivia();
                    let children = expected
                        .map(|kind| NodeOrToken::Token(GreenToken::new(kind.into(), "")));
                    self.push(NodeOrToken::Node(GreenNode::new(
                        SyntaxKind::MissingNode.into(),
                        children,
                    )));
                }
                Event::Reuse { entry } => {
                    self.eat_trivia();
                    self.splice(entry);
                }
                Event::Memo {
                    rule,
                    lookahead,
                    depth,
                } => {
                    if let Some(top) = self.stack.last_mut() {
                        top.memo = Some((rule, lookahead, depth));
                    }
                }
                Event::Placeholder => {}
            }
        }

        while !self.stack.is_empty() {
            self.finish_node();
        }
        let root = self
            .root
            .unwrap_or_else(|| GreenNode::new(SyntaxKind::SourceFile.into(), []));
        (root, ReuseTable::new(self.reuse))
    }

    fn offset(&self, token: usize) -> TextSize {
        self.tokens
            .get(token)
            .map_or_else(|| TextSize::of(self.source), |t| t.range.start())
    }

    fn start_node(&mut self, kind: SyntaxKind) {
        self.stack.push(OpenNode {
            kind,
            children: Vec::new(),
            first_token: self.cursor,
            memo: None,
        });
    }

    fn finish_node(&mut self) {
        let Some(node) = self.stack.pop() else {
            return;
        };
        let green = GreenNode::new(node.kind.into(), node.children);
        if let Some((rule, lookahead, depth)) = node.memo {
            self.reuse.push(ReuseEntry {
                rule,
                start: self.offset(node.first_token),
                len: green.text_len(),
                lookahead,
                depth,
                n_tokens: u32::try_from(self.cursor - node.first_token).unwrap_or(u32::MAX),
                green: green.clone(),
            });
        }
        self.push(NodeOrToken::Node(green));
    }

    fn push(&mut self, element: GreenElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if let NodeOrToken::Node(node) = element {
                    self.root = Some(node);
                }
            }
        }
    }

    /// Splices a node of the previous tree, carrying its nested reusable
    /// nodes over to the new table.
    fn splice(&mut self, index: u32) {
        let Some(entry) = self.previous.and_then(|table| table.get(index)) else {
            return;
        };
        let start = self.offset(self.cursor);
        let delta = i64::from(u32::from(start)) - i64::from(u32::from(entry.start));
        if let Some(table) = self.previous {
            self.reuse
                .extend(table.nested(entry).map(|nested| nested.shifted(delta)));
        }
        self.cursor += entry.n_tokens as usize;
        self.push(NodeOrToken::Node(entry.green.clone()));
    }

    /// Adds trivia (whitespace, comments) to the tree.
    fn eat_trivia(&mut self) {
        while let Some(token) = self.tokens.get(self.cursor) {
            if !token.kind.is_trivia() {
                break;
            }
            self.token(SyntaxKind::from(token.kind));
        }
    }

    /// Adds every remaining token to the root.
    fn eat_rest(&mut self) {
        while let Some(token) = self.tokens.get(self.cursor) {
            self.token(SyntaxKind::from(token.kind));
        }
    }

    /// Adds a token to the tree.
    fn token(&mut self, kind: SyntaxKind) {
        if let Some(token) = self.tokens.get(self.cursor) {
            let text = &self.source[token.range];
            self.push(NodeOrToken::Token(GreenToken::new(kind.into(), text)));
            self.cursor += 1;
        }
    }
}
