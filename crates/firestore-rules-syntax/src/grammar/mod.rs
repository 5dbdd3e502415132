//! Grammar table for the rules language.
//!
//! A [`GrammarDefinition`] (see [`dsl`]) is validated and compiled into an
//! immutable [`Grammar`] once. The parser only ever reads the compiled form:
//! resolved rule references, FIRST sets, nullability and, for operator hosts,
//! the primaries and operators used by precedence climbing.
//!
//! # Operator hosts
//!
//! Left recursion is accepted in exactly one shape: a hidden rule `H` whose
//! production is a choice listing operator rules, where each operator rule's
//! production is a sequence starting with `H` itself:
//!
//! ```text
//! expr     = choice(addition, ..., primary)    (hidden host)
//! addition = seq(expr, '+', expr)              (prec_left 5)
//! ```
//!
//! The non-operator alternatives of `H` are its primaries. Everything else
//! that is left-recursive is rejected when the grammar is loaded.

mod compile;
pub mod dsl;
mod rules;
mod validate;

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::lexer::TokenKind;
use crate::syntax::SyntaxKind;

pub(crate) use compile::{Expr, ExprNode, Host};
pub use dsl::{Associativity, GrammarDefinition, GrammarRule, Production};
pub use rules::{firestore_rules, GRAMMAR_VERSION};
pub use validate::ConfigurationError;

const _: () = assert!((TokenKind::Eof as u16) < 128);

/// Index of a rule inside its grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RuleId(pub(crate) u16);

impl RuleId {
    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// A set of token kinds.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TokenSet(u128);

impl TokenSet {
    /// The empty set.
    pub const EMPTY: TokenSet = TokenSet(0);

    /// Creates a set from a list of kinds.
    #[must_use]
    pub const fn new(kinds: &[TokenKind]) -> TokenSet {
        let mut bits = 0u128;
        let mut i = 0;
        while i < kinds.len() {
            bits |= mask(kinds[i]);
            i += 1;
        }
        TokenSet(bits)
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }

    /// Returns `true` if `kind` is in the set.
    #[must_use]
    pub const fn contains(&self, kind: TokenKind) -> bool {
        self.0 & mask(kind) != 0
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use rowan::Language;

        let mut set = f.debug_set();
        for raw in 0..=(TokenKind::Eof as u16) {
            if self.0 & (1u128 << raw) != 0 {
                set.entry(&crate::syntax::RulesLanguage::kind_from_raw(rowan::SyntaxKind(raw)));
            }
        }
        set.finish()
    }
}

const fn mask(kind: TokenKind) -> u128 {
    1u128 << (kind as u16)
}

/// A rule after validation, with references resolved.
#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub(crate) kind: Option<SyntaxKind>,
    pub(crate) body: Expr,
    pub(crate) first: TokenSet,
    pub(crate) nullable: bool,
    pub(crate) reusable: bool,
    pub(crate) host: Option<Host>,
}

/// A validated, compiled grammar.
///
/// Immutable after construction; share it freely between threads.
#[derive(Debug)]
pub struct Grammar {
    version: SmolStr,
    definitions: Vec<GrammarRule>,
    rules: Vec<CompiledRule>,
    by_name: FxHashMap<SmolStr, RuleId>,
    entry: RuleId,
    sync: TokenSet,
    terminators: TokenSet,
    closers: TokenSet,
}

impl Grammar {
    /// Validates and compiles a grammar definition.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for unresolved references, duplicate
    /// rules, left recursion outside the operator-host shape, conflicting
    /// precedence declarations and similar inconsistencies. No partially
    /// built grammar is ever returned.
    pub fn new(definition: GrammarDefinition) -> Result<Self, ConfigurationError> {
        let analysis = validate::validate(&definition)?;
        let rules = compile::compile(&definition, &analysis);

        tracing::debug!(
            version = %definition.version,
            rules = rules.len(),
            "grammar compiled"
        );

        Ok(Self {
            version: definition.version,
            definitions: definition.rules,
            rules,
            by_name: analysis.ids,
            entry: analysis.entry,
            sync: TokenSet::new(&definition.sync),
            terminators: TokenSet::new(&definition.terminators),
            closers: TokenSet::new(&definition.closers),
        })
    }

    /// The grammar's version label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Looks up a rule definition by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&GrammarRule> {
        let id = self.by_name.get(name)?;
        self.definitions.get(id.index())
    }

    /// All rule definitions in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &GrammarRule> + '_ {
        self.definitions.iter()
    }

    /// The entry rule.
    #[must_use]
    pub fn entry(&self) -> &GrammarRule {
        &self.definitions[self.entry.index()]
    }

    /// Tokens that can begin a match of the named rule.
    #[must_use]
    pub fn first_set(&self, name: &str) -> Option<TokenSet> {
        let id = self.by_name.get(name)?;
        Some(self.rules[id.index()].first)
    }

    /// Returns `true` if the named rule can match empty input.
    #[must_use]
    pub fn is_nullable(&self, name: &str) -> Option<bool> {
        let id = self.by_name.get(name)?;
        Some(self.rules[id.index()].nullable)
    }

    /// Tokens where error recovery stops skipping.
    #[must_use]
    pub fn sync_tokens(&self) -> TokenSet {
        self.sync
    }

    pub(crate) fn terminators(&self) -> TokenSet {
        self.terminators
    }

    pub(crate) fn closers(&self) -> TokenSet {
        self.closers
    }

    pub(crate) fn entry_id(&self) -> RuleId {
        self.entry
    }

    pub(crate) fn compiled(&self, id: RuleId) -> &CompiledRule {
        &self.rules[id.index()]
    }

    pub(crate) fn rule_name(&self, id: RuleId) -> &str {
        &self.definitions[id.index()].name
    }
}

static FIRESTORE_RULES: OnceCell<Grammar> = OnceCell::new();

/// Loads the built-in Firestore rules grammar.
///
/// The grammar is validated and compiled on the first call; every later
/// call returns the same handle.
///
/// # Errors
///
/// Returns the [`ConfigurationError`] raised by validation. A failed load
/// is not cached, so no partially initialised grammar is ever observable.
pub fn load_grammar() -> Result<&'static Grammar, ConfigurationError> {
    FIRESTORE_RULES.get_or_try_init(|| Grammar::new(firestore_rules()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_grammar_is_cached() {
        let first = load_grammar().expect("built-in grammar is valid");
        let second = load_grammar().expect("built-in grammar is valid");
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.version(), GRAMMAR_VERSION);
    }

    #[test]
    fn test_rule_lookup() {
        let grammar = load_grammar().unwrap();
        let allow = grammar.rule("allow_stmt").unwrap();
        assert_eq!(allow.kind, Some(SyntaxKind::AllowStmt));
        assert!(allow.reusable);

        let ternary = grammar.rule("ternary").unwrap();
        assert_eq!(ternary.precedence, 1);
        assert_eq!(ternary.associativity, Associativity::Right);

        assert!(grammar.rule("no_such_rule").is_none());
        assert_eq!(grammar.entry().name, "source_file");
    }

    #[test]
    fn test_first_sets() {
        let grammar = load_grammar().unwrap();
        let block_item = grammar.first_set("block_item").unwrap();
        assert!(block_item.contains(TokenKind::KwMatch));
        assert!(block_item.contains(TokenKind::KwAllow));
        assert!(block_item.contains(TokenKind::KwFunction));
        assert!(!block_item.contains(TokenKind::RBrace));

        let expr = grammar.first_set("expr").unwrap();
        assert!(expr.contains(TokenKind::Bang));
        assert!(expr.contains(TokenKind::Ident));
        assert!(expr.contains(TokenKind::KwGet));
        assert!(!expr.contains(TokenKind::Slash));

        assert_eq!(grammar.is_nullable("source_file"), Some(true));
        assert_eq!(grammar.is_nullable("expr"), Some(false));
    }

    #[test]
    fn test_token_set() {
        let set = TokenSet::new(&[TokenKind::Semicolon, TokenKind::RBrace]);
        assert!(set.contains(TokenKind::Semicolon));
        assert!(!set.contains(TokenKind::Eof));
        let set = set.union(TokenSet::new(&[TokenKind::Eof]));
        assert!(set.contains(TokenKind::Eof));
        assert!(TokenSet::EMPTY.is_empty());
        assert_eq!(
            TokenSet::EMPTY.union(TokenSet::new(&[TokenKind::Comma])),
            TokenSet::new(&[TokenKind::Comma])
        );
    }
}
