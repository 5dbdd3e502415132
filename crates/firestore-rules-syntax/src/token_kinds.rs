//! Shared list of token kinds.
//!
//! `TokenKind` (lexer) and `SyntaxKind` (tree) must agree on the order and
//! names of every token variant. The list lives here once and is expanded
//! into both enums' conversion tables.

macro_rules! for_each_token_kind {
    ($m:ident) => {
        $m! {
            // Trivia
            Whitespace,
            LineComment,
            BlockComment,
            // Punctuation
            Semicolon,
            Colon,
            Comma,
            Dot,
            LParen,
            RParen,
            LBracket,
            RBracket,
            LBrace,
            RBrace,
            Slash,
            DollarParen,
            Question,
            // Operators
            Eq,
            EqEq,
            Neq,
            Bang,
            Lt,
            LtEq,
            Gt,
            GtEq,
            AndAnd,
            OrOr,
            Plus,
            Minus,
            Star,
            StarStar,
            Percent,
            // Keywords
            KwRulesVersion,
            KwService,
            KwMatch,
            KwAllow,
            KwIf,
            KwFunction,
            KwLet,
            KwReturn,
            KwTrue,
            KwFalse,
            KwNull,
            KwIn,
            KwIs,
            KwRead,
            KwWrite,
            KwGet,
            KwList,
            KwCreate,
            KwUpdate,
            KwDelete,
            // Literals and names
            Number,
            String,
            Ident,
            // Special
            Error,
            Eof,
        }
    };
}

pub(crate) use for_each_token_kind;
