//! Lexer for the Firestore security rules language.
//!
//! This module provides a lexer that tokenizes rules source into a stream
//! of tokens with their positions in the source text. Lexing can start at any
//! token boundary, which is what incremental relexing (see [`relex`]) relies on.

mod relex;
mod tokens;

pub(crate) use relex::relex;
pub use tokens::TokenKind;

use logos::Logos;
use text_size::{TextRange, TextSize};

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The byte range of the token in the source text.
    pub range: TextRange,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, range: TextRange) -> Self {
        Self { kind, range }
    }

    /// Returns the length of the token in bytes.
    #[must_use]
    pub fn len(&self) -> TextSize {
        self.range.len()
    }

    /// Returns true if the token has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Returns the text of this token within `source`.
    #[must_use]
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.range]
    }

    pub(crate) fn shifted(self, delta: i64) -> Self {
        Self {
            kind: self.kind,
            range: TextRange::new(
                shift(self.range.start(), delta),
                shift(self.range.end(), delta),
            ),
        }
    }
}

pub(crate) fn shift(offset: TextSize, delta: i64) -> TextSize {
    let moved = i64::from(u32::from(offset)) + delta;
    TextSize::from(u32::try_from(moved.max(0)).unwrap_or(u32::MAX))
}

/// Lexer for rules source code.
///
/// The lexer is an iterator over tokens. It handles all error recovery
/// internally - any unrecognized characters are returned as `TokenKind::Error`.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    source: &'src str,
    offset: usize,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source text.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self::with_offset(source, TextSize::from(0))
    }

    /// Creates a lexer that starts at `offset`, which must be a token
    /// boundary of a previous lex of `source` (or any char boundary whose
    /// preceding text does not influence the next token).
    ///
    /// An offset that is out of range or splits a character yields an
    /// empty lexer.
    #[must_use]
    pub fn with_offset(source: &'src str, offset: TextSize) -> Self {
        let offset = usize::from(offset);
        let rest = source.get(offset..).unwrap_or("");
        Self {
            inner: TokenKind::lexer(rest),
            source,
            offset: offset.min(source.len()),
        }
    }

    /// Returns the source text being lexed.
    #[must_use]
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Returns the text of the current token.
    #[must_use]
    pub fn slice(&self) -> &'src str {
        self.inner.slice()
    }

    fn to_size(&self, local: usize) -> TextSize {
        TextSize::try_from(self.offset + local).unwrap_or(TextSize::from(u32::MAX))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.inner.next()?.unwrap_or(TokenKind::Error);

        if kind == TokenKind::Error {
            // Keep whole code points together so token text is always a `str`.
            let rest = self.inner.source();
            let mut end = self.inner.span().end;
            while end < rest.len() && !rest.is_char_boundary(end) {
                end += 1;
            }
            let extra = end - self.inner.span().end;
            if extra > 0 {
                self.inner.bump(extra);
            }
        }

        let span = self.inner.span();
        let range = TextRange::new(self.to_size(span.start), self.to_size(span.end));
        Some(Token::new(kind, range))
    }
}

/// Lex the entire source and return all tokens.
///
/// This is a convenience function for testing and simple use cases.
/// For the parser, use the `Lexer` iterator directly.
#[must_use]
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

/// Lex source and return tokens paired with their text.
///
/// Useful for debugging and testing.
#[must_use]
pub fn lex_with_text(source: &str) -> Vec<(Token, &str)> {
    Lexer::new(source)
        .map(|token| (token, token.text(source)))
        .collect()
}
