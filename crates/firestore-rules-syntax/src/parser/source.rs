//! Token source for the parser.
//!
//! Wraps the token stream with trivia-skipping lookahead. Every peek is
//! recorded as a lookahead offset so the parser knows how far each node's
//! match depended on the input.

use text_size::TextSize;

use crate::lexer::{Token, TokenKind};

/// A token source that provides tokens to the parser.
pub(crate) struct Source<'t> {
    tokens: &'t [Token],
    cursor: usize,
    /// Lookahead recorded for a peek at end of input. One past the text so
    /// it is never inside an unchanged prefix.
    eof_lookahead: TextSize,
    lookahead: TextSize,
}

impl<'t> Source<'t> {
    /// Creates a new source from tokens of a text of length `text_len`.
    pub(crate) fn new(tokens: &'t [Token], text_len: TextSize) -> Self {
        Self {
            tokens,
            cursor: 0,
            eof_lookahead: text_len + TextSize::from(1),
            lookahead: TextSize::from(0),
        }
    }

    pub(crate) fn tokens(&self) -> &'t [Token] {
        self.tokens
    }

    /// Index of the first non-trivia token at or after `from`.
    fn significant(&self, from: usize) -> usize {
        let mut index = from;
        while self.tokens.get(index).is_some_and(|t| t.kind.is_trivia()) {
            index += 1;
        }
        index
    }

    fn note(&mut self, index: usize) {
        let end = self
            .tokens
            .get(index)
            .map_or(self.eof_lookahead, |t| t.range.end());
        self.lookahead = self.lookahead.max(end);
    }

    /// Returns the current token kind, or `Eof` if at end.
    pub(crate) fn current(&mut self) -> TokenKind {
        self.nth(0)
    }

    /// Peeks at the nth non-trivia token ahead.
    pub(crate) fn nth(&mut self, n: usize) -> TokenKind {
        let mut index = self.significant(self.cursor);
        for _ in 0..n {
            if index >= self.tokens.len() {
                break;
            }
            index = self.significant(index + 1);
        }
        self.note(index);
        self.tokens.get(index).map_or(TokenKind::Eof, |t| t.kind)
    }

    /// Raw index of the current non-trivia token.
    pub(crate) fn current_index(&mut self) -> usize {
        let index = self.significant(self.cursor);
        self.note(index);
        index
    }

    /// Returns `true` if the current token directly follows the previous
    /// one, with no trivia in between.
    pub(crate) fn at_immediate(&mut self) -> bool {
        let index = self.current_index();
        index == self.cursor
    }

    /// Returns `true` if at end of input.
    pub(crate) fn at_end(&mut self) -> bool {
        self.current() == TokenKind::Eof
    }

    /// Advances past the current non-trivia token and returns its kind.
    pub(crate) fn bump(&mut self) -> Option<TokenKind> {
        let index = self.significant(self.cursor);
        let token = self.tokens.get(index)?;
        self.note(index);
        self.cursor = index + 1;
        Some(token.kind)
    }

    /// Raw position in the token stream, trivia included.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.tokens.len());
    }

    /// Furthest offset inspected since the last [`Source::take_lookahead`].
    pub(crate) fn lookahead(&self) -> TextSize {
        self.lookahead
    }

    /// Starts a fresh lookahead measurement and returns the previous one.
    pub(crate) fn take_lookahead(&mut self) -> TextSize {
        std::mem::replace(&mut self.lookahead, TextSize::from(0))
    }

    /// Folds `offset` into the current lookahead measurement.
    pub(crate) fn extend_lookahead(&mut self, offset: TextSize) {
        self.lookahead = self.lookahead.max(offset);
    }
}
