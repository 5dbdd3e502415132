//! Reusable subtrees of a finished parse.
//!
//! Every node produced by a rule marked reusable is recorded together with
//! the furthest offset its match inspected. A later parse of an edited text
//! may splice such a node back in when neither the node nor its lookahead
//! overlaps the edit.

use rowan::GreenNode;
use text_size::TextSize;

use crate::grammar::RuleId;
use crate::lexer::shift;

/// A node that a later parse may splice in unchanged.
#[derive(Debug, Clone)]
pub(crate) struct ReuseEntry {
    pub(crate) rule: RuleId,
    pub(crate) start: TextSize,
    pub(crate) len: TextSize,
    pub(crate) lookahead: TextSize,
    /// Nesting depth the node was parsed at. Parsing near the nesting limit
    /// depends on it.
    pub(crate) depth: u32,
    /// Raw tokens covered by the node, trivia inside it included.
    pub(crate) n_tokens: u32,
    pub(crate) green: GreenNode,
}

impl ReuseEntry {
    pub(crate) fn end(&self) -> TextSize {
        self.start + self.len
    }

    pub(crate) fn shifted(&self, delta: i64) -> Self {
        Self {
            start: shift(self.start, delta),
            lookahead: shift(self.lookahead, delta),
            ..self.clone()
        }
    }
}

/// Reusable nodes of one tree, ordered by start offset then rule.
#[derive(Debug, Default)]
pub(crate) struct ReuseTable {
    entries: Vec<ReuseEntry>,
}

impl ReuseTable {
    pub(crate) fn new(mut entries: Vec<ReuseEntry>) -> Self {
        entries.sort_by_key(|e| (e.start, e.rule));
        entries.dedup_by_key(|e| (e.start, e.rule));
        Self { entries }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, index: u32) -> Option<&ReuseEntry> {
        self.entries.get(usize::try_from(index).ok()?)
    }

    /// Finds the node `rule` produced at `start`.
    pub(crate) fn find(&self, rule: RuleId, start: TextSize) -> Option<(u32, &ReuseEntry)> {
        let index = self
            .entries
            .binary_search_by_key(&(start, rule), |e| (e.start, e.rule))
            .ok()?;
        Some((u32::try_from(index).ok()?, &self.entries[index]))
    }

    /// Entries nested inside `outer`, `outer` included.
    pub(crate) fn nested<'a>(&'a self, outer: &'a ReuseEntry) -> impl Iterator<Item = &'a ReuseEntry> + 'a {
        let from = self.entries.partition_point(|e| e.start < outer.start);
        let to = self.entries.partition_point(|e| e.start < outer.end());
        self.entries[from..to]
            .iter()
            .filter(move |e| e.end() <= outer.end())
    }
}

/// How positions of the new token stream relate to a previous tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReuseLookup<'p> {
    pub(crate) table: &'p ReuseTable,
    /// New and old texts and tokens agree before this offset.
    pub(crate) unchanged_prefix: TextSize,
    /// Old offset from which old tokens were kept, shifted by `delta`.
    pub(crate) resync_old: Option<TextSize>,
    pub(crate) delta: i64,
}

impl<'p> ReuseLookup<'p> {
    /// Finds a node of `rule` that can be spliced at new offset `start`.
    /// Returns its table index, the entry, and its lookahead in new
    /// coordinates.
    pub(crate) fn find(
        &self,
        rule: RuleId,
        start: TextSize,
    ) -> Option<(u32, &'p ReuseEntry, TextSize)> {
        if start < self.unchanged_prefix {
            let (index, entry) = self.table.find(rule, start)?;
            return (entry.lookahead <= self.unchanged_prefix).then_some((
                index,
                entry,
                entry.lookahead,
            ));
        }
        let resync_old = self.resync_old?;
        let old_start = i64::from(u32::from(start)) - self.delta;
        if old_start < i64::from(u32::from(resync_old)) {
            return None;
        }
        let (index, entry) = self.table.find(rule, shift(start, -self.delta))?;
        Some((index, entry, shift(entry.lookahead, self.delta)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxKind;

    fn entry(rule: u16, start: u32, len: u32) -> ReuseEntry {
        ReuseEntry {
            rule: RuleId(rule),
            start: start.into(),
            len: len.into(),
            lookahead: (start + len + 1).into(),
            depth: 1,
            n_tokens: 1,
            green: GreenNode::new(SyntaxKind::ErrorNode.into(), []),
        }
    }

    #[test]
    fn test_find_and_nested() {
        let table = ReuseTable::new(vec![
            entry(2, 10, 5),
            entry(1, 0, 20),
            entry(2, 2, 4),
            entry(2, 25, 3),
            entry(2, 10, 5),
        ]);
        assert_eq!(table.len(), 4);
        let (_, outer) = table.find(RuleId(1), 0.into()).unwrap();
        let nested: Vec<u32> = table.nested(outer).map(|e| e.start.into()).collect();
        assert_eq!(nested, vec![0, 2, 10]);
        assert!(table.find(RuleId(1), 2.into()).is_none());
    }

    #[test]
    fn test_lookup_respects_edit() {
        let table = ReuseTable::new(vec![entry(1, 0, 4), entry(1, 4, 4), entry(1, 20, 4)]);
        let lookup = ReuseLookup {
            table: &table,
            unchanged_prefix: 6.into(),
            resync_old: Some(18.into()),
            delta: 3,
        };
        // Lookahead 5 stays in the unchanged prefix, lookahead 9 does not.
        assert!(lookup.find(RuleId(1), 0.into()).is_some());
        assert!(lookup.find(RuleId(1), 4.into()).is_none());
        let (_, entry, lookahead) = lookup.find(RuleId(1), 23.into()).unwrap();
        assert_eq!(entry.start, TextSize::from(20));
        assert_eq!(lookahead, TextSize::from(28));
        assert!(lookup.find(RuleId(1), 20.into()).is_none());
    }
}
