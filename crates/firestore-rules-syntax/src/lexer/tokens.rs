//! Token definitions for the Firestore security rules language.
//!
//! The token kinds are designed to work with both the `logos` lexer generator
//! and the `rowan` lossless syntax tree library. Every variant listed here must
//! also appear, in the same order, in `for_each_token_kind!`.

use logos::Logos;

fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0usize;

    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            lex.bump(i + 2);
            return true;
        }
        i += 1;
    }

    // Unterminated: swallow the rest of the input as a single error token.
    lex.bump(bytes.len());
    false
}

fn lex_double_string(lex: &mut logos::Lexer<TokenKind>) -> bool {
    lex_quoted(lex, b'"')
}

fn lex_single_string(lex: &mut logos::Lexer<TokenKind>) -> bool {
    lex_quoted(lex, b'\'')
}

fn lex_quoted(lex: &mut logos::Lexer<TokenKind>, quote: u8) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                lex.bump(i + 1);
                return true;
            }
            _ => i += 1,
        }
    }

    lex.bump(bytes.len());
    false
}

fn lex_number(lex: &mut logos::Lexer<TokenKind>) {
    let bytes = lex.remainder().as_bytes();
    let mut len = 0;
    if bytes.len() >= 2 && bytes[0] == b'.' && bytes[1].is_ascii_digit() {
        len = 1 + digits(&bytes[1..]);
    }
    // Exponent: `e`, an optional sign, then at least one digit.
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(len + 1), Some(b'+' | b'-')));
        let exponent = digits(&bytes[len + 1 + sign..]);
        if exponent > 0 {
            len += 1 + sign + exponent;
        }
    }
    lex.bump(len);
}

fn digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// All token kinds of the rules language.
///
/// Token kinds are divided into categories:
/// - Trivia (whitespace, comments) - preserved but not semantically significant
/// - Punctuation and operators
/// - Keywords (reserved words)
/// - Literals (numbers, strings) and identifiers
/// - Special tokens (errors, EOF)
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u16)]
pub enum TokenKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    /// Whitespace (spaces, tabs, newlines)
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    /// Single-line comment: // ...
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    /// Block comment: /* ... */
    #[token("/*", lex_block_comment)]
    BlockComment,

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    /// `;`
    #[token(";")]
    Semicolon,

    /// `:`
    #[token(":")]
    Colon,

    /// `,`
    #[token(",")]
    Comma,

    /// `.`
    #[token(".")]
    Dot,

    /// `(`
    #[token("(")]
    LParen,

    /// `)`
    #[token(")")]
    RParen,

    /// `[`
    #[token("[")]
    LBracket,

    /// `]`
    #[token("]")]
    RBracket,

    /// `{`
    #[token("{")]
    LBrace,

    /// `}`
    #[token("}")]
    RBrace,

    /// `/` - path separator and division
    #[token("/")]
    Slash,

    /// `$(` - opens a path interpolation
    #[token("$(")]
    DollarParen,

    /// `?`
    #[token("?")]
    Question,

    // =========================================================================
    // OPERATORS
    // =========================================================================
    /// `=`
    #[token("=")]
    Eq,

    /// `==`
    #[token("==")]
    EqEq,

    /// `!=`
    #[token("!=")]
    Neq,

    /// `!`
    #[token("!")]
    Bang,

    /// `<`
    #[token("<")]
    Lt,

    /// `<=`
    #[token("<=")]
    LtEq,

    /// `>`
    #[token(">")]
    Gt,

    /// `>=`
    #[token(">=")]
    GtEq,

    /// `&&`
    #[token("&&")]
    AndAnd,

    /// `||`
    #[token("||")]
    OrOr,

    /// `+`
    #[token("+")]
    Plus,

    /// `-`
    #[token("-")]
    Minus,

    /// `*`
    #[token("*")]
    Star,

    /// `**` - recursive wildcard in match paths
    #[token("**")]
    StarStar,

    /// `%`
    #[token("%")]
    Percent,

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    /// `rules_version`
    #[token("rules_version")]
    KwRulesVersion,

    /// `service`
    #[token("service")]
    KwService,

    /// `match`
    #[token("match")]
    KwMatch,

    /// `allow`
    #[token("allow")]
    KwAllow,

    /// `if`
    #[token("if")]
    KwIf,

    /// `function`
    #[token("function")]
    KwFunction,

    /// `let`
    #[token("let")]
    KwLet,

    /// `return`
    #[token("return")]
    KwReturn,

    /// `true`
    #[token("true")]
    KwTrue,

    /// `false`
    #[token("false")]
    KwFalse,

    /// `null`
    #[token("null")]
    KwNull,

    /// `in`
    #[token("in")]
    KwIn,

    /// `is`
    #[token("is")]
    KwIs,

    // Methods. These are contextual: outside `allow` they behave as names.
    /// `read`
    #[token("read")]
    KwRead,

    /// `write`
    #[token("write")]
    KwWrite,

    /// `get`
    #[token("get")]
    KwGet,

    /// `list`
    #[token("list")]
    KwList,

    /// `create`
    #[token("create")]
    KwCreate,

    /// `update`
    #[token("update")]
    KwUpdate,

    /// `delete`
    #[token("delete")]
    KwDelete,

    // =========================================================================
    // LITERALS AND NAMES
    // =========================================================================
    /// Number literal: `42`, `3.14`, `1e-3`
    #[regex(r"[0-9]+", lex_number)]
    Number,

    /// String literal with backslash escapes: `"abc"`, `'abc'`
    #[token("\"", lex_double_string)]
    #[token("'", lex_single_string)]
    String,

    /// Identifier
    #[regex(r"[_a-zA-Z][_a-zA-Z0-9]*")]
    Ident,

    // =========================================================================
    // SPECIAL
    // =========================================================================
    /// Unrecognized input, unterminated string or unterminated comment
    #[default]
    Error,

    /// End of file marker (not produced by lexer, reported by the parser)
    Eof,
}

impl TokenKind {
    /// Returns `true` if this token is trivia (whitespace or comment).
    #[inline]
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Self::Whitespace | Self::LineComment | Self::BlockComment
        )
    }

    /// Returns `true` if this token is a keyword.
    #[must_use]
    pub fn is_keyword(self) -> bool {
        (self as u16) >= (Self::KwRulesVersion as u16) && (self as u16) <= (Self::KwDelete as u16)
    }

    /// Returns `true` if this token names an `allow` method.
    #[must_use]
    pub fn is_method(self) -> bool {
        matches!(
            self,
            Self::KwRead
                | Self::KwWrite
                | Self::KwGet
                | Self::KwList
                | Self::KwCreate
                | Self::KwUpdate
                | Self::KwDelete
        )
    }

    /// A short human readable description, used in diagnostics.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::LineComment | Self::BlockComment => "comment",
            Self::Semicolon => "`;`",
            Self::Colon => "`:`",
            Self::Comma => "`,`",
            Self::Dot => "`.`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::LBrace => "`{`",
            Self::RBrace => "`}`",
            Self::Slash => "`/`",
            Self::DollarParen => "`$(`",
            Self::Question => "`?`",
            Self::Eq => "`=`",
            Self::EqEq => "`==`",
            Self::Neq => "`!=`",
            Self::Bang => "`!`",
            Self::Lt => "`<`",
            Self::LtEq => "`<=`",
            Self::Gt => "`>`",
            Self::GtEq => "`>=`",
            Self::AndAnd => "`&&`",
            Self::OrOr => "`||`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::StarStar => "`**`",
            Self::Percent => "`%`",
            Self::KwRulesVersion => "`rules_version`",
            Self::KwService => "`service`",
            Self::KwMatch => "`match`",
            Self::KwAllow => "`allow`",
            Self::KwIf => "`if`",
            Self::KwFunction => "`function`",
            Self::KwLet => "`let`",
            Self::KwReturn => "`return`",
            Self::KwTrue => "`true`",
            Self::KwFalse => "`false`",
            Self::KwNull => "`null`",
            Self::KwIn => "`in`",
            Self::KwIs => "`is`",
            Self::KwRead => "`read`",
            Self::KwWrite => "`write`",
            Self::KwGet => "`get`",
            Self::KwList => "`list`",
            Self::KwCreate => "`create`",
            Self::KwUpdate => "`update`",
            Self::KwDelete => "`delete`",
            Self::Number => "number",
            Self::String => "string",
            Self::Ident => "identifier",
            Self::Error => "invalid input",
            Self::Eof => "end of file",
        }
    }
}

impl From<TokenKind> for rowan::SyntaxKind {
    fn from(kind: TokenKind) -> Self {
        Self(kind as u16)
    }
}
