//! Compilation of validated definitions into the parser's working form.

use super::dsl::{Associativity, GrammarDefinition, GrammarRule, Production};
use super::validate::Analysis;
use super::{CompiledRule, RuleId, TokenSet};
use crate::lexer::TokenKind;
use crate::syntax::SyntaxKind;

/// A production with resolved references and precomputed FIRST data.
#[derive(Debug)]
pub(crate) struct Expr {
    pub(crate) node: ExprNode,
    pub(crate) first: TokenSet,
    pub(crate) nullable: bool,
}

#[derive(Debug)]
pub(crate) enum ExprNode {
    Token(TokenKind),
    Immediate(Box<Expr>),
    /// `min_prec` is the lowest operator precedence the referenced host may
    /// absorb; it is only non-zero for the trailing operand of a
    /// precedence-tagged rule.
    Rule { rule: RuleId, min_prec: u8 },
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat(Box<Expr>),
    Optional(Box<Expr>),
    Capture(SyntaxKind, Box<Expr>),
    Cut,
}

/// Precedence climbing data of an operator host.
#[derive(Debug)]
pub(crate) struct Host {
    pub(crate) primaries: Vec<Expr>,
    pub(crate) operators: Vec<Operator>,
}

#[derive(Debug)]
pub(crate) struct Operator {
    pub(crate) kind: SyntaxKind,
    pub(crate) precedence: u8,
    /// Everything after the left operand.
    pub(crate) rest: Expr,
}

struct Compiler<'a> {
    analysis: &'a Analysis,
}

pub(crate) fn compile(definition: &GrammarDefinition, analysis: &Analysis) -> Vec<CompiledRule> {
    let compiler = Compiler { analysis };

    definition
        .rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            let id = RuleId(u16::try_from(index).unwrap_or(u16::MAX));
            let host = analysis.operators.get(&id).map(|operators| Host {
                primaries: compiler.primaries(rule, operators),
                operators: operators
                    .iter()
                    .map(|op| compiler.operator(&definition.rules[op.index()]))
                    .collect(),
            });
            CompiledRule {
                kind: rule.kind,
                body: compiler.body(rule),
                first: analysis.first[index],
                nullable: analysis.nullable[index],
                reusable: rule.reusable,
                host,
            }
        })
        .collect()
}

impl Compiler<'_> {
    fn tail_prec(rule: &GrammarRule) -> Option<u8> {
        if rule.precedence == 0 {
            return None;
        }
        Some(match rule.associativity {
            Associativity::Right => rule.precedence,
            Associativity::Left | Associativity::None => rule.precedence.saturating_add(1),
        })
    }

    fn body(&self, rule: &GrammarRule) -> Expr {
        match &rule.production {
            Production::Seq(items) => self.seq(items, Self::tail_prec(rule)),
            production => self.expr(production),
        }
    }

    fn primaries(&self, host: &GrammarRule, operators: &[RuleId]) -> Vec<Expr> {
        let Production::Choice(alternatives) = &host.production else {
            return Vec::new();
        };
        alternatives
            .iter()
            .filter(|alternative| {
                !matches!(alternative, Production::Rule(name)
                    if self.analysis.id(name).is_some_and(|id| operators.contains(&id)))
            })
            .map(|alternative| self.expr(alternative))
            .collect()
    }

    fn operator(&self, rule: &GrammarRule) -> Operator {
        let rest = match &rule.production {
            Production::Seq(items) => self.seq(&items[1..], Self::tail_prec(rule)),
            production => self.expr(production),
        };
        Operator {
            kind: rule.kind.unwrap_or(SyntaxKind::ErrorNode),
            precedence: rule.precedence,
            rest,
        }
    }

    fn seq(&self, items: &[Production], tail_prec: Option<u8>) -> Expr {
        let last = items.len().saturating_sub(1);
        let compiled = items
            .iter()
            .enumerate()
            .map(|(index, item)| match (item, tail_prec) {
                (Production::Rule(name), Some(min_prec)) if index == last => {
                    self.rule_ref(name, min_prec)
                }
                _ => self.expr(item),
            })
            .collect();
        Self::finish(ExprNode::Seq(compiled))
    }

    fn rule_ref(&self, name: &str, min_prec: u8) -> Expr {
        let rule = self.analysis.id(name).unwrap_or(RuleId(0));
        let min_prec = if self.analysis.is_host(rule) { min_prec } else { 0 };
        Expr {
            node: ExprNode::Rule { rule, min_prec },
            first: self.analysis.first[rule.index()],
            nullable: self.analysis.nullable[rule.index()],
        }
    }

    fn expr(&self, production: &Production) -> Expr {
        match production {
            Production::Token(kind) => Expr {
                node: ExprNode::Token(*kind),
                first: TokenSet::new(&[*kind]),
                nullable: false,
            },
            Production::Rule(name) => self.rule_ref(name, 0),
            Production::Seq(items) => self.seq(items, None),
            Production::Choice(items) => {
                Self::finish(ExprNode::Choice(items.iter().map(|i| self.expr(i)).collect()))
            }
            Production::Immediate(inner) => {
                Self::finish(ExprNode::Immediate(Box::new(self.expr(inner))))
            }
            Production::Repeat(inner) => Self::finish(ExprNode::Repeat(Box::new(self.expr(inner)))),
            Production::Optional(inner) => {
                Self::finish(ExprNode::Optional(Box::new(self.expr(inner))))
            }
            Production::Capture(kind, inner) => {
                Self::finish(ExprNode::Capture(*kind, Box::new(self.expr(inner))))
            }
            Production::Cut => Expr {
                node: ExprNode::Cut,
                first: TokenSet::EMPTY,
                nullable: true,
            },
        }
    }

    /// Derives FIRST data of a composite node from its children.
    fn finish(node: ExprNode) -> Expr {
        let (first, nullable) = match &node {
            ExprNode::Token(kind) => (TokenSet::new(&[*kind]), false),
            ExprNode::Cut => (TokenSet::EMPTY, true),
            ExprNode::Rule { .. } => (TokenSet::EMPTY, false),
            ExprNode::Seq(items) => {
                let mut first = TokenSet::EMPTY;
                let mut nullable = true;
                for item in items {
                    first = first.union(item.first);
                    if !item.nullable {
                        nullable = false;
                        break;
                    }
                }
                (first, nullable)
            }
            ExprNode::Choice(items) => items.iter().fold((TokenSet::EMPTY, false), |acc, item| {
                (acc.0.union(item.first), acc.1 || item.nullable)
            }),
            ExprNode::Repeat(inner) | ExprNode::Optional(inner) => (inner.first, true),
            ExprNode::Immediate(inner) | ExprNode::Capture(_, inner) => {
                (inner.first, inner.nullable)
            }
        };
        Expr {
            node,
            first,
            nullable,
        }
    }
}
