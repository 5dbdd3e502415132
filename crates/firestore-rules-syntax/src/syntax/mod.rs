//! Syntax tree types for the Firestore security rules language.
//!
//! This module provides the `rowan`-based syntax tree implementation,
//! including the `SyntaxKind` enum that covers both tokens and composite nodes.

use crate::lexer::TokenKind;
use crate::token_kinds::for_each_token_kind;

macro_rules! define_syntax_kind {
    (@nodes [$($token:ident),*] $($(#[$meta:meta])* $node:ident,)*) => {
        /// All syntax node and token kinds of the rules language.
        ///
        /// This enum includes both token kinds (from the lexer) and composite
        /// node kinds (produced by the parser).
        // Variants mirror lexer/token names; documenting each would be noisy.
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u16)]
        pub enum SyntaxKind {
            // =========================================================================
            // TOKEN KINDS (mirrors TokenKind)
            // =========================================================================
            $($token,)*

            // =========================================================================
            // COMPOSITE NODE KINDS (produced by parser)
            // =========================================================================
            $($(#[$meta])* $node,)*
        }

        const SYNTAX_KINDS: &[SyntaxKind] = &[
            $(SyntaxKind::$token,)*
            $(SyntaxKind::$node,)*
        ];

        impl SyntaxKind {
            /// The variant name, as used by tree dumps and queries.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$token => stringify!($token),)*
                    $(Self::$node => stringify!($node),)*
                }
            }
        }
    };
    ($($token:ident),* $(,)?) => {
        define_syntax_kind! {
            @nodes [$($token),*]
            /// Root node of a rules file
            SourceFile,
            /// `rules_version = '2';`
            RulesVersion,
            /// `service cloud.firestore { ... }`
            ServiceDecl,
            /// Dotted service name: `cloud.firestore`
            ServiceName,
            /// Braced list of match, allow and function items
            Block,
            /// `match /path { ... }`
            MatchDecl,
            /// The path pattern of a match declaration
            MatchPath,
            /// Static path segment: `/users`
            PathSegment,
            /// Single segment capture: `/{uid}`
            PathCapture,
            /// Recursive wildcard capture: `/{document=**}`
            PathWildcard,
            /// `allow read, write: if cond;`
            AllowStmt,
            /// Comma separated methods of an allow statement
            MethodList,
            /// `: if cond` part of an allow statement
            AllowCondition,
            /// `function name(params) { ... }`
            FunctionDecl,
            /// Parenthesised parameter list
            ParamList,
            /// One function parameter
            Param,
            /// Function body: `{ let ...; return ...; }`
            FunctionBody,
            /// `let name = expr;`
            LetStmt,
            /// `return expr;`
            ReturnStmt,
            /// A declared name (capture variable, function, binding)
            Name,
            /// A name used in an expression
            NameRef,
            /// Literal value
            Literal,
            /// Parenthesised expression
            ParenExpr,
            /// List literal: `[a, b]`
            ListExpr,
            /// Function call: `exists(/path)`
            CallExpr,
            /// Call argument list
            ArgList,
            /// Member access: `request.auth`
            MemberExpr,
            /// Indexing: `data['key']`
            IndexExpr,
            /// Prefix operation: `!a`, `-a`
            UnaryExpr,
            /// Binary operation: `a && b`
            BinaryExpr,
            /// Conditional: `a ? b : c`
            TernaryExpr,
            /// Document path argument: `/databases/$(database)/documents`
            PathExpr,
            /// Interpolated path segment: `/$(expr)`
            PathInterpolation,
            /// Tokens that could not be matched by the grammar
            ErrorNode,
            /// Placeholder for required syntax that is absent
            MissingNode,
            /// Internal anchor for operator wrapping; never part of a tree
            Tombstone,
        }
    };
}

for_each_token_kind!(define_syntax_kind);

impl SyntaxKind {
    /// Returns `true` if this is a trivia kind.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Self::Whitespace | Self::LineComment | Self::BlockComment
        )
    }

    /// Returns `true` if this is a token kind (not a composite node).
    #[must_use]
    pub fn is_token(self) -> bool {
        (self as u16) <= (Self::Eof as u16)
    }

    /// Returns `true` if this is a composite node kind.
    #[must_use]
    pub fn is_node(self) -> bool {
        !self.is_token()
    }

    /// Looks a kind up by its variant name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        SYNTAX_KINDS.iter().copied().find(|kind| kind.name() == name)
    }

    /// Returns the lexer kind if this is a token kind.
    #[must_use]
    pub fn to_token(self) -> Option<TokenKind> {
        TOKEN_KINDS.get(self as usize).copied()
    }
}

macro_rules! map_token_kinds {
    ($($name:ident),* $(,)?) => {
        impl From<TokenKind> for SyntaxKind {
            fn from(kind: TokenKind) -> Self {
                match kind {
                    $(TokenKind::$name => SyntaxKind::$name,)*
                }
            }
        }

        const TOKEN_KINDS: &[TokenKind] = &[$(TokenKind::$name,)*];
    };
}

for_each_token_kind!(map_token_kinds);

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

/// The language type for Firestore security rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RulesLanguage {}

impl rowan::Language for RulesLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        SYNTAX_KINDS
            .get(raw.0 as usize)
            .copied()
            .unwrap_or(SyntaxKind::Error)
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// A syntax node in the rules syntax tree.
pub type SyntaxNode = rowan::SyntaxNode<RulesLanguage>;

/// A syntax token in the rules syntax tree.
pub type SyntaxToken = rowan::SyntaxToken<RulesLanguage>;

/// A syntax element (either node or token) in the rules syntax tree.
pub type SyntaxElement = rowan::SyntaxElement<RulesLanguage>;
