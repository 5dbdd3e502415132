//! S-expression dumps of trees.
//!
//! ```text
//! (SourceFile 0..25
//!   (ServiceDecl 0..25
//!     (ServiceName 8..9)
//!     (Block 10..25
//!       (AllowStmt 12..23
//!         (MethodList 18..22)))))
//! ```

use std::fmt::Write as _;

use text_size::{TextRange, TextSize};
use thiserror::Error;

use super::{Node, Tree};
use crate::syntax::SyntaxKind;

/// Kind, range and children of a node, without tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Node kind.
    pub kind: SyntaxKind,
    /// Byte range.
    pub range: TextRange,
    /// Child nodes.
    pub children: Vec<Shape>,
}

impl Shape {
    pub(super) fn of(root: Node<'_>) -> Shape {
        let mut stack: Vec<Shape> = Vec::new();
        let mut cursor = vec![(root, false)];
        // Explicit stack: deeply nested input must not overflow.
        while let Some((node, visited)) = cursor.pop() {
            if visited {
                let Some(done) = stack.pop() else { break };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return done,
                }
                continue;
            }
            stack.push(Shape {
                kind: node.kind(),
                range: node.byte_range(),
                children: Vec::new(),
            });
            let children: Vec<_> = node.children().collect();
            cursor.push((node, true));
            cursor.extend(children.into_iter().rev().map(|child| (child, false)));
        }
        stack.pop().unwrap_or(Shape {
            kind: SyntaxKind::SourceFile,
            range: TextRange::default(),
            children: Vec::new(),
        })
    }
}

pub(super) fn write(tree: &Tree) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for event in tree.syntax().preorder() {
        match event {
            rowan::WalkEvent::Enter(raw) => {
                if !out.is_empty() {
                    out.push('\n');
                }
                let range = tree.map_range(raw.text_range());
                let _ = write!(
                    out,
                    "{:indent$}({} {}..{}",
                    "",
                    raw.kind().name(),
                    u32::from(range.start()),
                    u32::from(range.end()),
                    indent = depth * 2
                );
                depth += 1;
            }
            rowan::WalkEvent::Leave(_) => {
                depth -= 1;
                out.push(')');
            }
        }
    }
    out.push('\n');
    out
}

/// Errors reading a dump back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    /// The dump contains no node.
    #[error("dump is empty")]
    Empty,
    /// A character that cannot appear at this point.
    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected {
        /// Byte offset in the dump.
        offset: usize,
        /// The offending character.
        found: char,
    },
    /// A node name that is not a node kind.
    #[error("unknown node kind `{name}` at offset {offset}")]
    UnknownKind {
        /// Byte offset in the dump.
        offset: usize,
        /// The name as written.
        name: String,
    },
    /// A range that is not `start..end` with `start <= end`.
    #[error("invalid range at offset {offset}")]
    InvalidRange {
        /// Byte offset in the dump.
        offset: usize,
    },
    /// A `)` without an open node.
    #[error("unbalanced `)` at offset {offset}")]
    Unbalanced {
        /// Byte offset in the dump.
        offset: usize,
    },
    /// The dump ended inside a node.
    #[error("unclosed `{kind}` node")]
    Unclosed {
        /// Name of the innermost open node.
        kind: &'static str,
    },
    /// More than one top-level node.
    #[error("second root node at offset {offset}")]
    SecondRoot {
        /// Byte offset in the dump.
        offset: usize,
    },
}

/// Reads a dump written by [`Tree::dump`] back into a [`Shape`].
///
/// # Errors
///
/// Returns a [`DumpError`] for text that is not a well formed dump.
pub fn read_dump(text: &str) -> Result<Shape, DumpError> {
    let mut reader = Reader { text, pos: 0 };
    let mut stack: Vec<Shape> = Vec::new();
    let mut root = None;

    loop {
        reader.skip_whitespace();
        let offset = reader.pos;
        match reader.peek() {
            None => break,
            Some('(') => {
                if root.is_some() {
                    return Err(DumpError::SecondRoot { offset });
                }
                reader.pos += 1;
                let name = reader.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                let kind = SyntaxKind::from_name(name)
                    .filter(|kind| kind.is_node())
                    .ok_or_else(|| DumpError::UnknownKind {
                        offset,
                        name: name.to_owned(),
                    })?;
                reader.skip_whitespace();
                let range = reader.range()?;
                stack.push(Shape {
                    kind,
                    range,
                    children: Vec::new(),
                });
            }
            Some(')') => {
                reader.pos += 1;
                let done = stack.pop().ok_or(DumpError::Unbalanced { offset })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => root = Some(done),
                }
            }
            Some(found) => return Err(DumpError::Unexpected { offset, found }),
        }
    }

    if let Some(open) = stack.last() {
        return Err(DumpError::Unclosed {
            kind: open.kind.name(),
        });
    }
    root.ok_or(DumpError::Empty)
}

struct Reader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let rest = &self.text[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(_, c)| !predicate(c))
            .map_or(rest.len(), |(index, _)| index);
        self.pos += len;
        &rest[..len]
    }

    fn number(&mut self) -> Option<TextSize> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits.parse::<u32>().ok().map(TextSize::from)
    }

    fn range(&mut self) -> Result<TextRange, DumpError> {
        let offset = self.pos;
        let invalid = DumpError::InvalidRange { offset };
        let start = self.number().ok_or_else(|| invalid.clone())?;
        if !self.text[self.pos..].starts_with("..") {
            return Err(invalid);
        }
        self.pos += 2;
        let end = self.number().ok_or_else(|| invalid.clone())?;
        if start > end {
            return Err(invalid);
        }
        Ok(TextRange::new(start, end))
    }
}
