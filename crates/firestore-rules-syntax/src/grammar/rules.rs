//! The Firestore security rules grammar.

use smol_str::SmolStr;

use super::dsl::{
    capture, choice, cut, immediate, one_of, optional, repeat, repeat1, rule, separated, seq,
    token, GrammarDefinition, GrammarRule,
};
use crate::lexer::TokenKind as T;
use crate::syntax::SyntaxKind as K;

/// Version label of the built-in grammar.
pub const GRAMMAR_VERSION: &str = "firestore-rules-2";

const METHODS: [T; 7] = [
    T::KwRead,
    T::KwWrite,
    T::KwGet,
    T::KwList,
    T::KwCreate,
    T::KwUpdate,
    T::KwDelete,
];

/// Builds the definition of the Firestore security rules grammar.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn firestore_rules() -> GrammarDefinition {
    let rules = vec![
        // ---------------------------------------------------------------------
        // File structure
        // ---------------------------------------------------------------------
        GrammarRule::node(
            "source_file",
            K::SourceFile,
            seq([cut(), optional(rule("rules_version")), repeat(rule("service_decl"))]),
        ),
        GrammarRule::node(
            "rules_version",
            K::RulesVersion,
            seq([
                token(T::KwRulesVersion),
                cut(),
                token(T::Eq),
                token(T::String),
                token(T::Semicolon),
            ]),
        )
        .reusable(),
        GrammarRule::node(
            "service_decl",
            K::ServiceDecl,
            seq([token(T::KwService), cut(), rule("service_name"), rule("block")]),
        )
        .reusable(),
        GrammarRule::node(
            "service_name",
            K::ServiceName,
            separated(rule("name_token"), T::Dot),
        ),
        GrammarRule::hidden(
            "name_token",
            choice(std::iter::once(token(T::Ident)).chain(METHODS.map(token))),
        ),
        GrammarRule::node(
            "block",
            K::Block,
            seq([token(T::LBrace), cut(), repeat(rule("block_item")), token(T::RBrace)]),
        ),
        GrammarRule::hidden(
            "block_item",
            choice([rule("match_decl"), rule("allow_stmt"), rule("function_decl")]),
        ),
        // ---------------------------------------------------------------------
        // Match blocks and path patterns
        // ---------------------------------------------------------------------
        GrammarRule::node(
            "match_decl",
            K::MatchDecl,
            seq([token(T::KwMatch), cut(), rule("match_path"), rule("block")]),
        )
        .reusable(),
        GrammarRule::node("match_path", K::MatchPath, repeat1(rule("match_segment"))),
        GrammarRule::hidden(
            "match_segment",
            choice([rule("path_capture"), rule("path_wildcard"), rule("path_segment")]),
        ),
        GrammarRule::node(
            "path_capture",
            K::PathCapture,
            seq([
                token(T::Slash),
                immediate(token(T::LBrace)),
                immediate(capture(K::Name, rule("name_token"))),
                immediate(token(T::RBrace)),
            ]),
        ),
        GrammarRule::node(
            "path_wildcard",
            K::PathWildcard,
            seq([
                token(T::Slash),
                immediate(token(T::LBrace)),
                immediate(capture(K::Name, rule("name_token"))),
                immediate(token(T::Eq)),
                immediate(token(T::StarStar)),
                immediate(token(T::RBrace)),
            ]),
        ),
        GrammarRule::node(
            "path_segment",
            K::PathSegment,
            seq([
                token(T::Slash),
                immediate(capture(K::Name, rule("name_token"))),
            ]),
        ),
        // ---------------------------------------------------------------------
        // Allow statements
        // ---------------------------------------------------------------------
        GrammarRule::node(
            "allow_stmt",
            K::AllowStmt,
            seq([
                token(T::KwAllow),
                cut(),
                rule("method_list"),
                optional(rule("allow_condition")),
                token(T::Semicolon),
            ]),
        )
        .reusable(),
        GrammarRule::node(
            "method_list",
            K::MethodList,
            separated(one_of(METHODS), T::Comma),
        ),
        GrammarRule::node(
            "allow_condition",
            K::AllowCondition,
            seq([token(T::Colon), cut(), token(T::KwIf), rule("expr")]),
        ),
        // ---------------------------------------------------------------------
        // Functions
        // ---------------------------------------------------------------------
        GrammarRule::node(
            "function_decl",
            K::FunctionDecl,
            seq([
                token(T::KwFunction),
                cut(),
                capture(K::Name, rule("name_token")),
                rule("param_list"),
                rule("function_body"),
            ]),
        )
        .reusable(),
        GrammarRule::node(
            "param_list",
            K::ParamList,
            seq([
                token(T::LParen),
                cut(),
                optional(separated(rule("param"), T::Comma)),
                token(T::RParen),
            ]),
        ),
        GrammarRule::node("param", K::Param, rule("name_token")),
        GrammarRule::node(
            "function_body",
            K::FunctionBody,
            seq([
                token(T::LBrace),
                cut(),
                repeat(rule("let_stmt")),
                rule("return_stmt"),
                token(T::RBrace),
            ]),
        ),
        GrammarRule::node(
            "let_stmt",
            K::LetStmt,
            seq([
                token(T::KwLet),
                cut(),
                capture(K::Name, rule("name_token")),
                token(T::Eq),
                rule("expr"),
                token(T::Semicolon),
            ]),
        )
        .reusable(),
        GrammarRule::node(
            "return_stmt",
            K::ReturnStmt,
            seq([token(T::KwReturn), cut(), rule("expr"), token(T::Semicolon)]),
        )
        .reusable(),
        // ---------------------------------------------------------------------
        // Expressions, loosest binding first
        // ---------------------------------------------------------------------
        GrammarRule::hidden(
            "expr",
            choice([
                rule("ternary"),
                rule("or"),
                rule("and"),
                rule("relation"),
                rule("addition"),
                rule("multiplication"),
                rule("unary"),
                rule("member"),
                rule("index"),
                rule("primary"),
            ]),
        ),
        GrammarRule::node(
            "ternary",
            K::TernaryExpr,
            seq([
                rule("expr"),
                token(T::Question),
                rule("expr"),
                token(T::Colon),
                rule("expr"),
            ]),
        )
        .prec_right(1),
        GrammarRule::node(
            "or",
            K::BinaryExpr,
            seq([rule("expr"), token(T::OrOr), rule("expr")]),
        )
        .prec_left(2),
        GrammarRule::node(
            "and",
            K::BinaryExpr,
            seq([rule("expr"), token(T::AndAnd), rule("expr")]),
        )
        .prec_left(3),
        GrammarRule::node(
            "relation",
            K::BinaryExpr,
            seq([
                rule("expr"),
                one_of([T::Lt, T::LtEq, T::GtEq, T::Gt, T::EqEq, T::Neq, T::KwIn, T::KwIs]),
                rule("expr"),
            ]),
        )
        .prec_left(4),
        GrammarRule::node(
            "addition",
            K::BinaryExpr,
            seq([rule("expr"), one_of([T::Plus, T::Minus]), rule("expr")]),
        )
        .prec_left(5),
        GrammarRule::node(
            "multiplication",
            K::BinaryExpr,
            seq([rule("expr"), one_of([T::Star, T::Slash, T::Percent]), rule("expr")]),
        )
        .prec_left(6),
        GrammarRule::node(
            "unary",
            K::UnaryExpr,
            seq([one_of([T::Bang, T::Minus]), rule("expr")]),
        )
        .prec_right(7),
        GrammarRule::node(
            "member",
            K::MemberExpr,
            seq([
                rule("expr"),
                token(T::Dot),
                choice([rule("call"), rule("name_ref")]),
            ]),
        )
        .prec_left(8),
        GrammarRule::node(
            "index",
            K::IndexExpr,
            seq([
                rule("expr"),
                token(T::LBracket),
                cut(),
                rule("expr"),
                token(T::RBracket),
            ]),
        )
        .prec_left(8),
        GrammarRule::hidden(
            "primary",
            choice([
                rule("literal"),
                rule("call"),
                rule("name_ref"),
                rule("paren"),
                rule("list"),
            ]),
        ),
        GrammarRule::node(
            "literal",
            K::Literal,
            one_of([T::Number, T::String, T::KwTrue, T::KwFalse, T::KwNull]),
        ),
        GrammarRule::node(
            "call",
            K::CallExpr,
            seq([capture(K::NameRef, rule("name_token")), rule("arg_list")]),
        ),
        GrammarRule::node(
            "arg_list",
            K::ArgList,
            seq([
                immediate(token(T::LParen)),
                cut(),
                optional(separated(rule("argument"), T::Comma)),
                token(T::RParen),
            ]),
        ),
        GrammarRule::hidden("argument", choice([rule("path_expr"), rule("expr")])),
        GrammarRule::node("name_ref", K::NameRef, rule("name_token")),
        GrammarRule::node(
            "paren",
            K::ParenExpr,
            seq([token(T::LParen), cut(), rule("expr"), token(T::RParen)]),
        ),
        GrammarRule::node(
            "list",
            K::ListExpr,
            seq([
                token(T::LBracket),
                cut(),
                optional(separated(rule("expr"), T::Comma)),
                token(T::RBracket),
            ]),
        ),
        // ---------------------------------------------------------------------
        // Document paths in call arguments
        // ---------------------------------------------------------------------
        GrammarRule::node("path_expr", K::PathExpr, repeat1(rule("path_expr_segment"))),
        GrammarRule::hidden(
            "path_expr_segment",
            choice([rule("path_interpolation"), rule("path_segment")]),
        ),
        GrammarRule::node(
            "path_interpolation",
            K::PathInterpolation,
            seq([
                token(T::Slash),
                immediate(token(T::DollarParen)),
                cut(),
                rule("expr"),
                token(T::RParen),
            ]),
        ),
    ];

    GrammarDefinition {
        version: SmolStr::new(GRAMMAR_VERSION),
        entry: SmolStr::new("source_file"),
        rules,
        sync: vec![
            T::RBrace,
            T::Semicolon,
            T::KwMatch,
            T::KwAllow,
            T::KwFunction,
            T::KwService,
            T::KwLet,
            T::KwReturn,
        ],
        terminators: vec![T::Semicolon],
        closers: vec![T::RBrace],
    }
}
