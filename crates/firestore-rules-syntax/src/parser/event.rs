//! Parser events.
//!
//! The engine produces a flat stream of events that the sink later turns
//! into a green tree. Backtracking is a truncation of this stream.

use text_size::TextSize;

use crate::grammar::RuleId;
use crate::syntax::SyntaxKind;

/// An event produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    /// Opens a node.
    Start {
        /// Kind of the opened node.
        kind: SyntaxKind,
        /// Forward parent, used to wrap an already parsed left operand.
        forward_parent: Option<u32>,
    },
    /// Moves the next raw tokens into the open node.
    Token {
        /// Kind given to the tokens.
        kind: SyntaxKind,
        /// How many non-trivia tokens to take.
        n_tokens: u8,
    },
    /// Closes the innermost open node.
    Finish,
    /// A slot reserved for a [`Event::Start`] that is not yet known, or a
    /// start already consumed by the sink.
    Placeholder,
    /// A zero-width node standing in for input that should have been there.
    Missing {
        /// The token that was expected, if a single one was.
        expected: Option<SyntaxKind>,
    },
    /// Splice a node of the previous tree, by index into its reuse table.
    Reuse {
        /// Index into the previous tree's reuse table.
        entry: u32,
    },
    /// Records that the current node is reusable. Emitted right before the
    /// node's [`Event::Finish`].
    Memo {
        /// The rule that produced the node.
        rule: RuleId,
        /// Furthest offset the rule inspected while matching.
        lookahead: TextSize,
        /// Number of nodes enclosing the node when it was started.
        depth: u32,
    },
}

impl Event {
    /// A start that is not wrapped by a later node.
    #[must_use]
    pub(crate) fn start(kind: SyntaxKind) -> Self {
        Self::Start {
            kind,
            forward_parent: None,
        }
    }

    /// A single token.
    #[must_use]
    pub(crate) fn token(kind: SyntaxKind) -> Self {
        Self::Token { kind, n_tokens: 1 }
    }
}
