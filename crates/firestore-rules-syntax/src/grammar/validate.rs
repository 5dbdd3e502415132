//! Load-time validation of grammar definitions.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use thiserror::Error;

use super::dsl::{Associativity, GrammarDefinition, Production};
use super::{RuleId, TokenSet};

/// A grammar definition that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The definition has no rules.
    #[error("grammar defines no rules")]
    Empty,
    /// Two rules share a name.
    #[error("rule `{name}` is defined more than once")]
    DuplicateRule {
        /// The duplicated name.
        name: SmolStr,
    },
    /// The entry rule does not exist.
    #[error("entry rule `{entry}` is not defined")]
    UndefinedEntry {
        /// The missing entry name.
        entry: SmolStr,
    },
    /// The entry rule produces no node, so the tree would have no root.
    #[error("entry rule `{entry}` must produce a node")]
    HiddenEntry {
        /// The entry name.
        entry: SmolStr,
    },
    /// A rule references a name that is not defined.
    #[error("rule `{rule}` references undefined rule `{reference}`")]
    UnresolvedRule {
        /// The referencing rule.
        rule: SmolStr,
        /// The unresolved name.
        reference: SmolStr,
    },
    /// A node kind slot holds a token kind.
    #[error("rule `{rule}` uses token kind `{kind}` as a node kind")]
    TokenKindAsNode {
        /// The offending rule.
        rule: SmolStr,
        /// Name of the kind.
        kind: &'static str,
    },
    /// A cut appears somewhere other than directly inside a sequence.
    #[error("rule `{rule}` has a cut outside of a sequence")]
    MisplacedCut {
        /// The offending rule.
        rule: SmolStr,
    },
    /// A repetition whose body can match empty input would never terminate.
    #[error("rule `{rule}` repeats a production that can match empty input")]
    NullableRepeat {
        /// The offending rule.
        rule: SmolStr,
    },
    /// Left recursion without a token-consuming way out.
    #[error("left recursion: {cycle}")]
    LeftRecursion {
        /// The cycle, as `a -> b -> a`.
        cycle: String,
    },
    /// An operator rule is used outside of its host, produces no node, or
    /// does not consume input after its left operand.
    #[error("operator rule `{operator}` is misplaced: {reason}")]
    MisplacedOperator {
        /// The operator rule.
        operator: SmolStr,
        /// What is wrong with it.
        reason: String,
    },
    /// Two operators of one host share a precedence level but disagree on
    /// associativity.
    #[error(
        "operators `{first}` and `{second}` of `{host}` share precedence {precedence} with different associativity"
    )]
    PrecedenceConflict {
        /// The host rule.
        host: SmolStr,
        /// The shared level.
        precedence: u8,
        /// First operator rule.
        first: SmolStr,
        /// Second operator rule.
        second: SmolStr,
    },
}

/// Facts established by validation, consumed by compilation.
#[derive(Debug)]
pub(crate) struct Analysis {
    pub(crate) ids: FxHashMap<SmolStr, RuleId>,
    pub(crate) entry: RuleId,
    pub(crate) first: Vec<TokenSet>,
    pub(crate) nullable: Vec<bool>,
    /// Operator rules of each host, in the host's declaration order.
    pub(crate) operators: FxHashMap<RuleId, Vec<RuleId>>,
}

impl Analysis {
    pub(crate) fn is_host(&self, id: RuleId) -> bool {
        self.operators.contains_key(&id)
    }

    pub(crate) fn id(&self, name: &str) -> Option<RuleId> {
        self.ids.get(name).copied()
    }
}

pub(crate) fn validate(definition: &GrammarDefinition) -> Result<Analysis, ConfigurationError> {
    if definition.rules.is_empty() {
        return Err(ConfigurationError::Empty);
    }

    let mut ids = FxHashMap::default();
    for (index, rule) in definition.rules.iter().enumerate() {
        let id = RuleId(u16::try_from(index).unwrap_or(u16::MAX));
        if ids.insert(rule.name.clone(), id).is_some() {
            return Err(ConfigurationError::DuplicateRule {
                name: rule.name.clone(),
            });
        }
    }

    let entry = *ids
        .get(&definition.entry)
        .ok_or_else(|| ConfigurationError::UndefinedEntry {
            entry: definition.entry.clone(),
        })?;
    if definition.rules[entry.index()].kind.is_none() {
        return Err(ConfigurationError::HiddenEntry {
            entry: definition.entry.clone(),
        });
    }

    for rule in &definition.rules {
        if let Some(kind) = rule.kind {
            if kind.is_token() {
                return Err(ConfigurationError::TokenKindAsNode {
                    rule: rule.name.clone(),
                    kind: kind.name(),
                });
            }
        }
        check_structure(&rule.name, &rule.production, false, &ids)?;
    }

    let (first, nullable) = first_sets(definition, &ids);
    let analysis = Analysis {
        ids,
        entry,
        first,
        nullable,
        operators: FxHashMap::default(),
    };

    for rule in &definition.rules {
        check_repeats(&rule.name, &rule.production, &analysis)?;
    }

    let operators = find_operators(definition, &analysis)?;
    let analysis = Analysis {
        operators,
        ..analysis
    };

    check_operator_references(definition, &analysis)?;
    check_left_recursion(definition, &analysis)?;

    Ok(analysis)
}

/// Resolves references, and checks cut placement and capture kinds.
fn check_structure(
    rule: &SmolStr,
    production: &Production,
    in_seq: bool,
    ids: &FxHashMap<SmolStr, RuleId>,
) -> Result<(), ConfigurationError> {
    match production {
        Production::Token(_) => Ok(()),
        Production::Cut if in_seq => Ok(()),
        Production::Cut => Err(ConfigurationError::MisplacedCut { rule: rule.clone() }),
        Production::Rule(name) => {
            if ids.contains_key(name) {
                Ok(())
            } else {
                Err(ConfigurationError::UnresolvedRule {
                    rule: rule.clone(),
                    reference: name.clone(),
                })
            }
        }
        Production::Seq(items) => items
            .iter()
            .try_for_each(|item| check_structure(rule, item, true, ids)),
        Production::Choice(items) => items
            .iter()
            .try_for_each(|item| check_structure(rule, item, false, ids)),
        Production::Capture(kind, inner) => {
            if kind.is_token() {
                return Err(ConfigurationError::TokenKindAsNode {
                    rule: rule.clone(),
                    kind: kind.name(),
                });
            }
            check_structure(rule, inner, false, ids)
        }
        Production::Immediate(inner) | Production::Repeat(inner) | Production::Optional(inner) => {
            check_structure(rule, inner, false, ids)
        }
    }
}

/// Computes FIRST sets and nullability of every rule by fixpoint iteration.
fn first_sets(
    definition: &GrammarDefinition,
    ids: &FxHashMap<SmolStr, RuleId>,
) -> (Vec<TokenSet>, Vec<bool>) {
    let count = definition.rules.len();
    let mut first = vec![TokenSet::EMPTY; count];
    let mut nullable = vec![false; count];

    loop {
        let mut changed = false;
        for (index, rule) in definition.rules.iter().enumerate() {
            let (set, empty) = production_first(&rule.production, ids, &first, &nullable);
            let merged = first[index].union(set);
            let merged_nullable = nullable[index] || empty;
            if merged != first[index] || merged_nullable != nullable[index] {
                first[index] = merged;
                nullable[index] = merged_nullable;
                changed = true;
            }
        }
        if !changed {
            return (first, nullable);
        }
    }
}

pub(crate) fn production_first(
    production: &Production,
    ids: &FxHashMap<SmolStr, RuleId>,
    first: &[TokenSet],
    nullable: &[bool],
) -> (TokenSet, bool) {
    match production {
        Production::Token(kind) => (TokenSet::new(&[*kind]), false),
        Production::Cut => (TokenSet::EMPTY, true),
        Production::Rule(name) => ids.get(name).map_or((TokenSet::EMPTY, false), |id| {
            (first[id.index()], nullable[id.index()])
        }),
        Production::Seq(items) => {
            let mut set = TokenSet::EMPTY;
            for item in items {
                let (item_set, item_nullable) = production_first(item, ids, first, nullable);
                set = set.union(item_set);
                if !item_nullable {
                    return (set, false);
                }
            }
            (set, true)
        }
        Production::Choice(items) => items.iter().fold((TokenSet::EMPTY, false), |acc, item| {
            let (item_set, item_nullable) = production_first(item, ids, first, nullable);
            (acc.0.union(item_set), acc.1 || item_nullable)
        }),
        Production::Repeat(inner) | Production::Optional(inner) => {
            (production_first(inner, ids, first, nullable).0, true)
        }
        Production::Immediate(inner) | Production::Capture(_, inner) => {
            production_first(inner, ids, first, nullable)
        }
    }
}

fn check_repeats(
    rule: &SmolStr,
    production: &Production,
    analysis: &Analysis,
) -> Result<(), ConfigurationError> {
    match production {
        Production::Token(_) | Production::Cut | Production::Rule(_) => Ok(()),
        Production::Repeat(inner) => {
            let (_, empty) =
                production_first(inner, &analysis.ids, &analysis.first, &analysis.nullable);
            if empty {
                return Err(ConfigurationError::NullableRepeat { rule: rule.clone() });
            }
            check_repeats(rule, inner, analysis)
        }
        Production::Seq(items) | Production::Choice(items) => items
            .iter()
            .try_for_each(|item| check_repeats(rule, item, analysis)),
        Production::Immediate(inner)
        | Production::Optional(inner)
        | Production::Capture(_, inner) => check_repeats(rule, inner, analysis),
    }
}

/// Identifies operator hosts and checks their operators.
fn find_operators(
    definition: &GrammarDefinition,
    analysis: &Analysis,
) -> Result<FxHashMap<RuleId, Vec<RuleId>>, ConfigurationError> {
    let mut hosts = FxHashMap::default();

    for (index, host) in definition.rules.iter().enumerate() {
        let Production::Choice(alternatives) = &host.production else {
            continue;
        };
        let mut operators = Vec::new();
        let mut primaries = 0usize;
        for alternative in alternatives {
            match alternative {
                Production::Rule(name) if is_operator_of(definition, analysis, name, &host.name) => {
                    operators.extend(analysis.id(name));
                }
                _ => primaries += 1,
            }
        }
        if operators.is_empty() {
            continue;
        }

        if host.kind.is_some() {
            return Err(ConfigurationError::MisplacedOperator {
                operator: definition.rules[operators[0].index()].name.clone(),
                reason: format!("its host `{}` must be a hidden rule", host.name),
            });
        }
        if primaries == 0 {
            return Err(ConfigurationError::LeftRecursion {
                cycle: format!(
                    "{} -> {} -> {} (no operand alternative)",
                    host.name,
                    definition.rules[operators[0].index()].name,
                    host.name
                ),
            });
        }

        let mut levels: FxHashMap<u8, (SmolStr, Associativity)> = FxHashMap::default();
        for operator in &operators {
            let rule = &definition.rules[operator.index()];
            if rule.kind.is_none() {
                return Err(ConfigurationError::MisplacedOperator {
                    operator: rule.name.clone(),
                    reason: "operator rules must produce a node".to_owned(),
                });
            }
            if let Production::Seq(items) = &rule.production {
                let rest = Production::Seq(items[1..].to_vec());
                let (_, empty) =
                    production_first(&rest, &analysis.ids, &analysis.first, &analysis.nullable);
                if empty {
                    return Err(ConfigurationError::MisplacedOperator {
                        operator: rule.name.clone(),
                        reason: "nothing after the left operand consumes input".to_owned(),
                    });
                }
            }
            let associativity = normalize(rule.associativity);
            match levels.get(&rule.precedence) {
                Some((other, other_associativity)) if *other_associativity != associativity => {
                    return Err(ConfigurationError::PrecedenceConflict {
                        host: host.name.clone(),
                        precedence: rule.precedence,
                        first: other.clone(),
                        second: rule.name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    levels.insert(rule.precedence, (rule.name.clone(), associativity));
                }
            }
        }

        let id = RuleId(u16::try_from(index).unwrap_or(u16::MAX));
        hosts.insert(id, operators);
    }

    Ok(hosts)
}

fn normalize(associativity: Associativity) -> Associativity {
    match associativity {
        Associativity::Right => Associativity::Right,
        Associativity::Left | Associativity::None => Associativity::Left,
    }
}

fn is_operator_of(
    definition: &GrammarDefinition,
    analysis: &Analysis,
    name: &str,
    host: &str,
) -> bool {
    let Some(id) = analysis.id(name) else {
        return false;
    };
    matches!(
        &definition.rules[id.index()].production,
        Production::Seq(items) if matches!(items.first(), Some(Production::Rule(first)) if first == host)
    )
}

/// Operator rules may only be referenced from their host's choice.
fn check_operator_references(
    definition: &GrammarDefinition,
    analysis: &Analysis,
) -> Result<(), ConfigurationError> {
    let operators: FxHashSet<RuleId> = analysis.operators.values().flatten().copied().collect();

    for (index, rule) in definition.rules.iter().enumerate() {
        let id = RuleId(u16::try_from(index).unwrap_or(u16::MAX));
        if analysis.is_host(id) {
            continue;
        }
        let mut references = Vec::new();
        collect_references(&rule.production, &mut references);
        for reference in references {
            if analysis.id(reference).is_some_and(|r| operators.contains(&r)) {
                return Err(ConfigurationError::MisplacedOperator {
                    operator: SmolStr::new(reference),
                    reason: format!("referenced from `{}` instead of its host", rule.name),
                });
            }
        }
    }
    Ok(())
}

fn collect_references<'p>(production: &'p Production, out: &mut Vec<&'p str>) {
    match production {
        Production::Token(_) | Production::Cut => {}
        Production::Rule(name) => out.push(name),
        Production::Seq(items) | Production::Choice(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Production::Immediate(inner)
        | Production::Repeat(inner)
        | Production::Optional(inner)
        | Production::Capture(_, inner) => collect_references(inner, out),
    }
}

/// Collects rules reachable at the left edge of `production`, returning
/// whether the production can match empty input.
fn left_references<'p>(
    production: &'p Production,
    analysis: &Analysis,
    out: &mut Vec<&'p str>,
) -> bool {
    match production {
        Production::Token(_) => false,
        Production::Cut => true,
        Production::Rule(name) => {
            out.push(name);
            analysis.id(name).is_some_and(|id| analysis.nullable[id.index()])
        }
        Production::Seq(items) => {
            for item in items {
                if !left_references(item, analysis, out) {
                    return false;
                }
            }
            true
        }
        Production::Choice(items) => items
            .iter()
            .fold(false, |empty, item| left_references(item, analysis, out) || empty),
        Production::Repeat(inner) | Production::Optional(inner) => {
            left_references(inner, analysis, out);
            true
        }
        Production::Immediate(inner) | Production::Capture(_, inner) => {
            left_references(inner, analysis, out)
        }
    }
}

fn check_left_recursion(
    definition: &GrammarDefinition,
    analysis: &Analysis,
) -> Result<(), ConfigurationError> {
    let operators: FxHashSet<RuleId> = analysis.operators.values().flatten().copied().collect();
    let count = definition.rules.len();

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (index, rule) in definition.rules.iter().enumerate() {
        let id = RuleId(u16::try_from(index).unwrap_or(u16::MAX));
        let mut names = Vec::new();
        match &rule.production {
            // The left operand of an operator is parsed by its host.
            Production::Seq(items) if operators.contains(&id) => {
                for item in &items[1..] {
                    if !left_references(item, analysis, &mut names) {
                        break;
                    }
                }
            }
            // Hosts reach their operators only after an operand.
            Production::Choice(items) if analysis.is_host(id) => {
                for item in items {
                    if let Production::Rule(name) = item {
                        if analysis.id(name).is_some_and(|r| operators.contains(&r)) {
                            continue;
                        }
                    }
                    left_references(item, analysis, &mut names);
                }
            }
            production => {
                left_references(production, analysis, &mut names);
            }
        }
        edges[index] = names
            .into_iter()
            .filter_map(|name| analysis.id(name).map(RuleId::index))
            .collect();
    }

    // Iterative depth-first search for a cycle.
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;
    let mut color = vec![WHITE; count];

    for root in 0..count {
        if color[root] != WHITE {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = GREY;
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&target) = edges[node].get(top.1) {
                top.1 += 1;
                match color[target] {
                    WHITE => {
                        color[target] = GREY;
                        stack.push((target, 0));
                    }
                    GREY => {
                        let from = stack.iter().position(|(n, _)| *n == target).unwrap_or(0);
                        let mut cycle: Vec<&str> = stack[from..]
                            .iter()
                            .map(|(n, _)| definition.rules[*n].name.as_str())
                            .collect();
                        cycle.push(definition.rules[target].name.as_str());
                        return Err(ConfigurationError::LeftRecursion {
                            cycle: cycle.join(" -> "),
                        });
                    }
                    _ => {}
                }
            } else {
                color[node] = BLACK;
                stack.pop();
            }
        }
    }

    Ok(())
}
