//! Tree queries.
//!
//! A query is one S-expression pattern:
//!
//! ```text
//! (MatchDecl (MatchPath (PathCapture (Name) @var))) @match
//! ```
//!
//! `(Kind ...)` matches a node of that kind and `(_ ...)` matches any node.
//! The child patterns must match child nodes in order, though not
//! necessarily adjacent ones. `@name` after a pattern captures the node the
//! pattern matched.

use smol_str::SmolStr;
use thiserror::Error;

use crate::syntax::SyntaxKind;
use crate::tree::{Node, Tree};

/// Patterns nested deeper than this are rejected.
const MAX_PATTERN_DEPTH: usize = 64;

/// Errors in query text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query has no pattern.
    #[error("query is empty")]
    Empty,
    /// A character that cannot appear at this point.
    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected {
        /// Byte offset in the query.
        offset: usize,
        /// The offending character.
        found: char,
    },
    /// A name that is not a node kind.
    #[error("unknown node kind `{name}` at offset {offset}")]
    UnknownKind {
        /// Byte offset in the query.
        offset: usize,
        /// The name as written.
        name: String,
    },
    /// An `@` without a name after it.
    #[error("missing capture name at offset {offset}")]
    MissingCaptureName {
        /// Byte offset in the query.
        offset: usize,
    },
    /// The query ended inside a pattern.
    #[error("unclosed pattern")]
    Unclosed,
    /// Text after the pattern.
    #[error("unexpected second pattern at offset {offset}")]
    TrailingInput {
        /// Byte offset in the query.
        offset: usize,
    },
    /// Nesting beyond the supported depth.
    #[error("pattern nested deeper than {MAX_PATTERN_DEPTH} levels")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    kind: Option<SyntaxKind>,
    children: Vec<Pattern>,
    capture: Option<SmolStr>,
}

/// A compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pattern: Pattern,
    capture_names: Vec<SmolStr>,
}

impl Query {
    /// Parses query text.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] for malformed patterns and unknown kinds.
    pub fn new(source: &str) -> Result<Self, QueryError> {
        let pattern = parse_pattern(source)?;
        let mut capture_names = Vec::new();
        let mut pending = vec![&pattern];
        while let Some(pattern) = pending.pop() {
            if let Some(name) = &pattern.capture {
                if !capture_names.contains(name) {
                    capture_names.push(name.clone());
                }
            }
            pending.extend(pattern.children.iter().rev());
        }
        Ok(Self {
            pattern,
            capture_names,
        })
    }

    /// Capture names, outer patterns first.
    #[must_use]
    pub fn capture_names(&self) -> &[SmolStr] {
        &self.capture_names
    }

    /// Matches the query against every node of `tree`, in preorder.
    #[must_use]
    pub fn matches<'q, 't>(&'q self, tree: &'t Tree) -> QueryMatches<'q, 't> {
        QueryMatches {
            query: self,
            tree,
            stack: vec![tree.root()],
        }
    }
}

/// A named node captured by a match.
#[derive(Debug, Clone)]
pub struct Capture<'t> {
    /// The capture name, without `@`.
    pub name: SmolStr,
    /// The captured node.
    pub node: Node<'t>,
}

/// One match of a query.
#[derive(Debug, Clone)]
pub struct QueryMatch<'t> {
    node: Node<'t>,
    captures: Vec<Capture<'t>>,
}

impl<'t> QueryMatch<'t> {
    /// The node the outermost pattern matched.
    #[must_use]
    pub fn node(&self) -> &Node<'t> {
        &self.node
    }

    /// All captures, outer patterns first.
    #[must_use]
    pub fn captures(&self) -> &[Capture<'t>] {
        &self.captures
    }

    /// The first node captured under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Node<'t>> {
        self.captures
            .iter()
            .find(|capture| capture.name == name)
            .map(|capture| &capture.node)
    }
}

/// Lazy iterator over the matches of a query.
pub struct QueryMatches<'q, 't> {
    query: &'q Query,
    tree: &'t Tree,
    stack: Vec<Node<'t>>,
}

impl QueryMatches<'_, '_> {
    /// Starts over from the root.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(self.tree.root());
    }
}

impl<'t> Iterator for QueryMatches<'_, 't> {
    type Item = QueryMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            let children: Vec<_> = node.children().collect();
            self.stack.extend(children.into_iter().rev());

            let mut captures = Vec::new();
            if match_node(&self.query.pattern, &node, &mut captures) {
                return Some(QueryMatch { node, captures });
            }
        }
        None
    }
}

fn match_node<'t>(pattern: &Pattern, node: &Node<'t>, captures: &mut Vec<Capture<'t>>) -> bool {
    if pattern.kind.is_some_and(|kind| kind != node.kind()) {
        return false;
    }
    let mark = captures.len();
    if let Some(name) = &pattern.capture {
        captures.push(Capture {
            name: name.clone(),
            node: node.clone(),
        });
    }
    if pattern.children.is_empty() {
        return true;
    }
    let children: Vec<_> = node.children().collect();
    if match_children(&pattern.children, &children, captures) {
        true
    } else {
        captures.truncate(mark);
        false
    }
}

/// Matches `patterns` against an ordered subsequence of `nodes`.
fn match_children<'t>(
    patterns: &[Pattern],
    nodes: &[Node<'t>],
    captures: &mut Vec<Capture<'t>>,
) -> bool {
    let Some((first, rest)) = patterns.split_first() else {
        return true;
    };
    for (index, node) in nodes.iter().enumerate() {
        let mark = captures.len();
        if match_node(first, node, captures) {
            if match_children(rest, &nodes[index + 1..], captures) {
                return true;
            }
            captures.truncate(mark);
        }
    }
    false
}

// =============================================================================
// Pattern syntax
// =============================================================================

fn parse_pattern(source: &str) -> Result<Pattern, QueryError> {
    let mut pos = 0;
    let mut stack: Vec<Pattern> = Vec::new();
    let mut root = None;

    loop {
        pos += whitespace_len(&source[pos..]);
        let offset = pos;
        let Some(found) = source[pos..].chars().next() else {
            break;
        };
        match found {
            '(' => {
                if root.is_some() {
                    return Err(QueryError::TrailingInput { offset });
                }
                if stack.len() >= MAX_PATTERN_DEPTH {
                    return Err(QueryError::TooDeep);
                }
                pos += 1;
                pos += whitespace_len(&source[pos..]);
                let name = identifier(&source[pos..]);
                if name.is_empty() {
                    return Err(unexpected(source, pos));
                }
                let kind = if name == "_" {
                    None
                } else {
                    let kind = SyntaxKind::from_name(name)
                        .filter(|kind| kind.is_node())
                        .ok_or_else(|| QueryError::UnknownKind {
                            offset: pos,
                            name: name.to_owned(),
                        })?;
                    Some(kind)
                };
                pos += name.len();
                stack.push(Pattern {
                    kind,
                    children: Vec::new(),
                    capture: None,
                });
            }
            ')' => {
                pos += 1;
                let mut done = stack.pop().ok_or(QueryError::Unexpected { offset, found })?;
                let after = pos + whitespace_len(&source[pos..]);
                if source[after..].starts_with('@') {
                    let name = identifier(&source[after + 1..]);
                    if name.is_empty() {
                        return Err(QueryError::MissingCaptureName { offset: after });
                    }
                    done.capture = Some(SmolStr::new(name));
                    pos = after + 1 + name.len();
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => root = Some(done),
                }
            }
            _ => return Err(QueryError::Unexpected { offset, found }),
        }
    }

    if !stack.is_empty() {
        return Err(QueryError::Unclosed);
    }
    root.ok_or(QueryError::Empty)
}

fn whitespace_len(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

fn identifier(text: &str) -> &str {
    let len = text
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(text.len(), |(index, _)| index);
    &text[..len]
}

fn unexpected(source: &str, offset: usize) -> QueryError {
    match source[offset..].chars().next() {
        Some(found) => QueryError::Unexpected { offset, found },
        None => QueryError::Unclosed,
    }
}
