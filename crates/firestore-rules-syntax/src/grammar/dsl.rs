//! Building blocks for grammar definitions.
//!
//! A grammar is a list of [`GrammarRule`]s whose right-hand sides are
//! [`Production`] trees. The free functions below keep definitions close to
//! the way grammars are usually written down:
//!
//! ```
//! use firestore_rules_syntax::grammar::dsl::{cut, rule, seq, token};
//! use firestore_rules_syntax::grammar::GrammarRule;
//! use firestore_rules_syntax::{SyntaxKind, TokenKind};
//!
//! let paren = GrammarRule::node(
//!     "paren",
//!     SyntaxKind::ParenExpr,
//!     seq([token(TokenKind::LParen), cut(), rule("expr"), token(TokenKind::RParen)]),
//! );
//! assert_eq!(paren.name, "paren");
//! ```

use smol_str::SmolStr;

use crate::lexer::TokenKind;
use crate::syntax::SyntaxKind;

/// The right-hand side of a grammar rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Production {
    /// Match a single token.
    Token(TokenKind),
    /// Match the inner production only if no trivia precedes it.
    Immediate(Box<Production>),
    /// Match another rule by name.
    Rule(SmolStr),
    /// Match every item in order.
    Seq(Vec<Production>),
    /// Ordered choice: the first alternative that matches wins.
    Choice(Vec<Production>),
    /// Zero or more repetitions.
    Repeat(Box<Production>),
    /// Zero or one occurrence.
    Optional(Box<Production>),
    /// Named capture: wrap whatever the inner production matched in a node.
    Capture(SyntaxKind, Box<Production>),
    /// Commit the enclosing sequence. Once passed, a failing item is
    /// recovered in place instead of backtracking out of the sequence.
    Cut,
}

/// How operators of equal precedence group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Associativity {
    /// `a - b - c` groups as `(a - b) - c`.
    #[default]
    Left,
    /// `a ? b : c ? d : e` groups as `a ? b : (c ? d : e)`.
    Right,
    /// No preference; treated like `Left` by the parser.
    None,
}

/// One named rule of a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarRule {
    /// Rule name, referenced by [`Production::Rule`].
    pub name: SmolStr,
    /// Node kind produced by the rule. `None` makes the rule hidden: its
    /// children are spliced into the parent.
    pub kind: Option<SyntaxKind>,
    /// The rule's right-hand side.
    pub production: Production,
    /// Binding strength for operator rules; higher binds tighter.
    pub precedence: u8,
    /// Grouping of operators with equal precedence.
    pub associativity: Associativity,
    /// Whether nodes of this rule may be reused by incremental reparsing.
    pub reusable: bool,
}

impl GrammarRule {
    /// A rule that produces a node of `kind`.
    pub fn node(name: &str, kind: SyntaxKind, production: Production) -> Self {
        Self {
            name: SmolStr::new(name),
            kind: Some(kind),
            production,
            precedence: 0,
            associativity: Associativity::Left,
            reusable: false,
        }
    }

    /// A rule that produces no node of its own.
    pub fn hidden(name: &str, production: Production) -> Self {
        Self {
            name: SmolStr::new(name),
            kind: None,
            production,
            precedence: 0,
            associativity: Associativity::Left,
            reusable: false,
        }
    }

    /// Tags the rule with a left-associative precedence level.
    #[must_use]
    pub fn prec_left(mut self, precedence: u8) -> Self {
        self.precedence = precedence;
        self.associativity = Associativity::Left;
        self
    }

    /// Tags the rule with a right-associative precedence level.
    #[must_use]
    pub fn prec_right(mut self, precedence: u8) -> Self {
        self.precedence = precedence;
        self.associativity = Associativity::Right;
        self
    }

    /// Tags the rule with a non-associative precedence level.
    #[must_use]
    pub fn prec(mut self, precedence: u8) -> Self {
        self.precedence = precedence;
        self.associativity = Associativity::None;
        self
    }

    /// Marks nodes of this rule as reusable across incremental reparses.
    #[must_use]
    pub fn reusable(mut self) -> Self {
        self.reusable = true;
        self
    }
}

/// A complete grammar, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarDefinition {
    /// Version label reported by the loaded grammar.
    pub version: SmolStr,
    /// Name of the rule that covers a whole file.
    pub entry: SmolStr,
    /// All rules, in declaration order.
    pub rules: Vec<GrammarRule>,
    /// Tokens at which error recovery stops skipping input.
    pub sync: Vec<TokenKind>,
    /// Tokens that end a run of skipped input and are skipped with it.
    pub terminators: Vec<TokenKind>,
    /// Tokens that close a nested construct. A nested list of items stops
    /// at them instead of skipping them as junk.
    pub closers: Vec<TokenKind>,
}

/// Matches one token.
pub fn token(kind: TokenKind) -> Production {
    Production::Token(kind)
}

/// Matches `production` only when no trivia separates it from the previous token.
pub fn immediate(production: Production) -> Production {
    Production::Immediate(Box::new(production))
}

/// References another rule.
pub fn rule(name: &str) -> Production {
    Production::Rule(SmolStr::new(name))
}

/// Matches all items in order.
pub fn seq(items: impl IntoIterator<Item = Production>) -> Production {
    Production::Seq(items.into_iter().collect())
}

/// Ordered choice.
pub fn choice(alternatives: impl IntoIterator<Item = Production>) -> Production {
    Production::Choice(alternatives.into_iter().collect())
}

/// Choice between single tokens.
pub fn one_of(kinds: impl IntoIterator<Item = TokenKind>) -> Production {
    choice(kinds.into_iter().map(token))
}

/// Zero or more repetitions.
pub fn repeat(production: Production) -> Production {
    Production::Repeat(Box::new(production))
}

/// One or more repetitions.
pub fn repeat1(production: Production) -> Production {
    seq([production.clone(), repeat(production)])
}

/// Zero or one occurrence.
pub fn optional(production: Production) -> Production {
    Production::Optional(Box::new(production))
}

/// Wraps the match in a node of `kind`.
pub fn capture(kind: SyntaxKind, production: Production) -> Production {
    Production::Capture(kind, Box::new(production))
}

/// Commits the enclosing sequence.
pub fn cut() -> Production {
    Production::Cut
}

/// `item (separator item)*`
pub fn separated(item: Production, separator: TokenKind) -> Production {
    seq([item.clone(), repeat(seq([token(separator), item]))])
}
