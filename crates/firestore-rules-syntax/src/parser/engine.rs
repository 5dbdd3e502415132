//! The grammar-driven parsing engine.
//!
//! The engine walks the compiled grammar with an explicit stack of frames
//! instead of recursing, so deeply nested input cannot exhaust the call
//! stack. Every frame that may backtrack remembers a [`Checkpoint`]: the
//! token cursor and the length of the event stream. Restoring one is a
//! truncation.
//!
//! # Error recovery
//!
//! Recovery only happens in sequences that passed a cut. A failing item of
//! such a sequence is either reported as missing (when the next token can
//! continue the sequence) or preceded by an error node holding the tokens
//! skipped to reach a point where parsing can go on. Lists of items inside
//! a committed sequence skip input they cannot parse as junk, one statement
//! at a time.

use text_size::TextSize;

use crate::grammar::{Expr, ExprNode, Grammar, Host, RuleId, TokenSet};
use crate::lexer::{Token, TokenKind};
use crate::parser::event::Event;
use crate::parser::reuse::ReuseLookup;
use crate::parser::source::Source;
use crate::syntax::SyntaxKind;
use drop_bomb::DropBomb;

/// Nodes nest at most this deep. A construct reached past the limit becomes
/// one flat error node.
const MAX_DEPTH: u32 = 1024;

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    cursor: usize,
    events: usize,
}

enum Step<'g> {
    Enter(&'g Expr),
    Return(bool),
}

struct Marker {
    pos: usize,
    bomb: DropBomb,
}

impl Marker {
    fn new(pos: usize) -> Self {
        Self {
            pos,
            bomb: DropBomb::new("uncompleted marker"),
        }
    }

    fn complete(mut self, events: &mut Vec<Event>, kind: SyntaxKind) -> CompletedMarker {
        self.bomb.defuse();
        if let Some(event) = events.get_mut(self.pos) {
            if matches!(event, Event::Placeholder) {
                *event = Event::start(kind);
            }
        }
        events.push(Event::Finish);
        CompletedMarker { pos: self.pos }
    }

    /// Drops the marker after its events were discarded by a restore.
    fn abandon(mut self) {
        self.bomb.defuse();
    }
}

#[derive(Clone, Copy)]
struct CompletedMarker {
    pos: usize,
}

impl CompletedMarker {
    fn precede(self, events: &mut Vec<Event>) -> Marker {
        let new_pos = events.len();
        events.push(Event::Placeholder);
        set_forward_parent(events, self.pos, new_pos);
        Marker::new(new_pos)
    }
}

fn set_forward_parent(events: &mut [Event], from: usize, to: usize) {
    let mut current = from;
    loop {
        match &mut events[current] {
            Event::Start {
                forward_parent: Some(fp),
                ..
            } => {
                current += *fp as usize;
            }
            Event::Start { forward_parent, .. } => {
                *forward_parent = Some(u32::try_from(to - current).unwrap_or(u32::MAX));
                break;
            }
            _ => break,
        }
    }
}

#[derive(Clone, Copy)]
enum HostPhase {
    Primary { next: usize },
    Operator { next: usize, active: usize },
}

enum Frame<'g> {
    Rule {
        rule: RuleId,
        marker: Option<Marker>,
        outer_lookahead: TextSize,
        depth: u32,
    },
    Seq {
        items: &'g [Expr],
        current: usize,
        committed: bool,
        item_start: Checkpoint,
    },
    Choice {
        alternatives: &'g [Expr],
        next: usize,
        checkpoint: Checkpoint,
    },
    Repeat {
        body: &'g Expr,
        checkpoint: Checkpoint,
    },
    Optional {
        checkpoint: Checkpoint,
    },
    Capture {
        kind: SyntaxKind,
        marker: Marker,
    },
    Host(HostFrame<'g>),
}

struct HostFrame<'g> {
    host: &'g Host,
    min_prec: u8,
    lhs: CompletedMarker,
    phase: HostPhase,
    checkpoint: Checkpoint,
    /// Operator nodes wrapped around the left operand so far.
    wraps: u32,
}

pub(crate) struct Engine<'g, 't> {
    grammar: &'g Grammar,
    source: Source<'t>,
    events: Vec<Event>,
    stack: Vec<Frame<'g>>,
    reuse: Option<ReuseLookup<'t>>,
    reused: usize,
    /// Nodes open at the current position, operator nodes being tried
    /// included.
    depth: u32,
}

impl<'g, 't> Engine<'g, 't> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        tokens: &'t [Token],
        text_len: TextSize,
        reuse: Option<ReuseLookup<'t>>,
    ) -> Self {
        Self {
            grammar,
            source: Source::new(tokens, text_len),
            events: Vec::new(),
            stack: Vec::new(),
            reuse,
            reused: 0,
            depth: 0,
        }
    }

    /// Runs the entry rule over the whole input. Returns the events and the
    /// number of spliced nodes.
    pub(crate) fn run(mut self) -> (Vec<Event>, usize) {
        let start = self.checkpoint();
        let entry = self.grammar.entry_id();
        let mut step = self.enter_rule(entry, 0);
        loop {
            step = match step {
                Step::Enter(expr) => self.enter(expr),
                Step::Return(ok) => {
                    let Some(frame) = self.stack.pop() else {
                        if !ok {
                            self.wrap_everything(start, entry);
                        }
                        break;
                    };
                    self.resume(frame, ok)
                }
            };
        }
        (self.events, self.reused)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cursor: self.source.cursor(),
            events: self.events.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.source.set_cursor(checkpoint.cursor);
        self.events.truncate(checkpoint.events);
    }

    fn bump(&mut self) {
        if let Some(kind) = self.source.bump() {
            self.events.push(Event::token(SyntaxKind::from(kind)));
        }
    }

    fn missing(&mut self, expected: Option<TokenKind>) {
        self.events.push(Event::Missing {
            expected: expected.map(SyntaxKind::from),
        });
    }

    fn start_error(&mut self) -> Marker {
        let pos = self.events.len();
        self.events.push(Event::Placeholder);
        Marker::new(pos)
    }

    /// Skips at least one token, then everything up to a member of `stop`.
    fn skip_until(&mut self, stop: TokenSet) {
        let marker = self.start_error();
        self.bump();
        while !self.source.at_end() && !stop.contains(self.source.current()) {
            self.bump();
        }
        marker.complete(&mut self.events, SyntaxKind::ErrorNode);
    }

    /// Skips one run of junk: through the next terminator, or up to a
    /// boundary token.
    fn skip_junk(&mut self, boundary: TokenSet) {
        let terminators = self.grammar.terminators();
        let marker = self.start_error();
        loop {
            let kind = self.source.current();
            self.bump();
            if terminators.contains(kind) {
                break;
            }
            let next = self.source.current();
            if next == TokenKind::Eof || (boundary.contains(next) && !terminators.contains(next)) {
                break;
            }
        }
        marker.complete(&mut self.events, SyntaxKind::ErrorNode);
    }

    fn wrap_rest(&mut self) {
        if self.source.at_end() {
            return;
        }
        let marker = self.start_error();
        while !self.source.at_end() {
            self.bump();
        }
        marker.complete(&mut self.events, SyntaxKind::ErrorNode);
    }

    /// Wraps a construct past the nesting limit in one error node: its
    /// balanced brackets, up to a `;` or closing bracket outside them.
    fn skip_nested(&mut self) -> Step<'g> {
        tracing::trace!(depth = self.depth, "nesting limit reached");
        let marker = self.start_error();
        let mut open = 0usize;
        loop {
            match self.source.current() {
                TokenKind::Eof => break,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace | TokenKind::DollarParen => {
                    open += 1;
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if open == 0 {
                        break;
                    }
                    open -= 1;
                }
                TokenKind::Semicolon if open == 0 => break,
                _ => {}
            }
            self.bump();
        }
        if self.events.len() == marker.pos + 1 {
            self.events.pop();
            marker.abandon();
            return Step::Return(false);
        }
        marker.complete(&mut self.events, SyntaxKind::ErrorNode);
        Step::Return(true)
    }

    /// Fallback when the entry rule cannot match at all.
    fn wrap_everything(&mut self, start: Checkpoint, entry: RuleId) {
        self.restore(start);
        let kind = self
            .grammar
            .compiled(entry)
            .kind
            .unwrap_or(SyntaxKind::SourceFile);
        let root = Marker::new(self.events.len());
        self.events.push(Event::Placeholder);
        self.wrap_rest();
        root.complete(&mut self.events, kind);
    }

    /// Tokens that may follow once `items` are done: FIRST of the items up
    /// to the first one that cannot be empty, plus the sync tokens.
    fn continuation(&self, items: &[Expr]) -> TokenSet {
        let mut set = self.grammar.sync_tokens();
        for item in items {
            set = set.union(item.first);
            if !item.nullable {
                break;
            }
        }
        set
    }

    /// Returns `true` if the innermost rule frame is the entry rule.
    fn in_entry_rule(&self) -> bool {
        self.stack
            .iter()
            .rposition(|frame| matches!(frame, Frame::Rule { .. }))
            .is_some_and(|index| index == 0)
    }

    // =========================================================================
    // Entering expressions
    // =========================================================================

    fn enter(&mut self, expr: &'g Expr) -> Step<'g> {
        match &expr.node {
            ExprNode::Token(kind) => {
                if self.source.current() == *kind {
                    self.bump();
                    Step::Return(true)
                } else {
                    Step::Return(false)
                }
            }
            ExprNode::Immediate(inner) => {
                if self.source.at_immediate() {
                    Step::Enter(inner)
                } else {
                    Step::Return(false)
                }
            }
            ExprNode::Rule { rule, min_prec } => self.enter_rule(*rule, *min_prec),
            ExprNode::Seq(items) => {
                let item_start = self.checkpoint();
                self.stack.push(Frame::Seq {
                    items,
                    current: 0,
                    committed: false,
                    item_start,
                });
                self.advance_seq()
            }
            ExprNode::Choice(alternatives) => {
                let checkpoint = self.checkpoint();
                self.stack.push(Frame::Choice {
                    alternatives,
                    next: 0,
                    checkpoint,
                });
                self.next_alternative()
            }
            ExprNode::Repeat(body) => {
                let checkpoint = self.checkpoint();
                self.stack.push(Frame::Repeat { body, checkpoint });
                self.next_iteration()
            }
            ExprNode::Optional(body) => {
                if !body.nullable && !body.first.contains(self.source.current()) {
                    return Step::Return(true);
                }
                let checkpoint = self.checkpoint();
                self.stack.push(Frame::Optional { checkpoint });
                Step::Enter(body)
            }
            ExprNode::Capture(kind, body) => {
                if !body.nullable && !body.first.contains(self.source.current()) {
                    return Step::Return(false);
                }
                let marker = Marker::new(self.events.len());
                self.events.push(Event::Placeholder);
                self.depth += 1;
                self.stack.push(Frame::Capture {
                    kind: *kind,
                    marker,
                });
                Step::Enter(body)
            }
            ExprNode::Cut => Step::Return(true),
        }
    }

    fn enter_rule(&mut self, rule: RuleId, min_prec: u8) -> Step<'g> {
        let compiled = self.grammar.compiled(rule);
        if !compiled.nullable && !compiled.first.contains(self.source.current()) {
            return Step::Return(false);
        }
        if self.depth >= MAX_DEPTH {
            return self.skip_nested();
        }
        if let Some(host) = &compiled.host {
            return self.enter_host(host, min_prec);
        }
        if compiled.reusable && self.try_reuse(rule) {
            return Step::Return(true);
        }

        let outer_lookahead = self.source.take_lookahead();
        self.source.current();
        let depth = self.depth;
        let marker = compiled.kind.map(|_| {
            let pos = self.events.len();
            self.events.push(Event::Placeholder);
            Marker::new(pos)
        });
        if marker.is_some() {
            self.depth += 1;
        }
        self.stack.push(Frame::Rule {
            rule,
            marker,
            outer_lookahead,
            depth,
        });
        Step::Enter(&compiled.body)
    }

    /// Splices the node `rule` produced at this position in the previous
    /// tree, if the edit cannot have changed it.
    fn try_reuse(&mut self, rule: RuleId) -> bool {
        let Some(lookup) = self.reuse else {
            return false;
        };
        let index = self.source.current_index();
        let tokens = self.source.tokens();
        let Some(token) = tokens.get(index) else {
            return false;
        };
        let Some((entry_index, entry, lookahead)) = lookup.find(rule, token.range.start()) else {
            return false;
        };
        if entry.depth != self.depth {
            return false;
        }
        let end = index + entry.n_tokens as usize;
        let lines_up = end > index
            && tokens
                .get(end - 1)
                .is_some_and(|last| last.range.end() == token.range.start() + entry.len);
        if !lines_up {
            return false;
        }

        tracing::trace!(rule = self.grammar.rule_name(rule), start = ?token.range.start(), "reusing node");
        self.events.push(Event::Reuse { entry: entry_index });
        self.source.set_cursor(end);
        self.source.extend_lookahead(lookahead);
        self.reused += 1;
        true
    }

    fn enter_host(&mut self, host: &'g Host, min_prec: u8) -> Step<'g> {
        let pos = self.events.len();
        self.events.push(Event::start(SyntaxKind::Tombstone));
        let checkpoint = self.checkpoint();
        self.stack.push(Frame::Host(HostFrame {
            host,
            min_prec,
            lhs: CompletedMarker { pos },
            phase: HostPhase::Primary { next: 0 },
            checkpoint,
            wraps: 0,
        }));
        self.next_primary()
    }

    // =========================================================================
    // Resuming frames
    // =========================================================================

    fn resume(&mut self, frame: Frame<'g>, ok: bool) -> Step<'g> {
        match frame {
            Frame::Rule {
                rule,
                marker,
                outer_lookahead,
                depth,
            } => self.finish_rule(rule, marker, outer_lookahead, depth, ok),
            Frame::Seq {
                items,
                current,
                committed,
                item_start,
            } => {
                if ok {
                    self.stack.push(Frame::Seq {
                        items,
                        current: current + 1,
                        committed,
                        item_start,
                    });
                    return self.advance_seq();
                }
                if !committed {
                    return Step::Return(false);
                }
                self.restore(item_start);
                self.recover_item(items, current)
            }
            Frame::Choice {
                alternatives,
                next,
                checkpoint,
            } => {
                if ok {
                    return Step::Return(true);
                }
                self.restore(checkpoint);
                self.stack.push(Frame::Choice {
                    alternatives,
                    next,
                    checkpoint,
                });
                self.next_alternative()
            }
            Frame::Repeat { body, checkpoint } => {
                if ok && self.source.cursor() > checkpoint.cursor {
                    self.stack.push(Frame::Repeat { body, checkpoint });
                    return self.next_iteration();
                }
                if !ok {
                    self.restore(checkpoint);
                }
                self.end_repeat(body, checkpoint)
            }
            Frame::Optional { checkpoint } => {
                if !ok {
                    self.restore(checkpoint);
                }
                Step::Return(true)
            }
            Frame::Capture { kind, marker } => {
                self.depth = self.depth.saturating_sub(1);
                if ok {
                    marker.complete(&mut self.events, kind);
                } else {
                    marker.abandon();
                }
                Step::Return(ok)
            }
            Frame::Host(frame) => self.resume_host(frame, ok),
        }
    }

    fn finish_rule(
        &mut self,
        rule: RuleId,
        marker: Option<Marker>,
        outer_lookahead: TextSize,
        depth: u32,
        ok: bool,
    ) -> Step<'g> {
        self.depth = depth;
        let lookahead = self.source.lookahead();
        let compiled = self.grammar.compiled(rule);
        match marker {
            Some(marker) if ok => {
                if self.stack.is_empty() {
                    self.wrap_rest();
                }
                if compiled.reusable {
                    self.events.push(Event::Memo {
                        rule,
                        lookahead,
                        depth,
                    });
                }
                marker.complete(&mut self.events, compiled.kind.unwrap_or(SyntaxKind::ErrorNode));
            }
            Some(marker) => marker.abandon(),
            None => {}
        }
        self.source.take_lookahead();
        self.source.extend_lookahead(outer_lookahead.max(lookahead));
        if !ok {
            tracing::trace!(rule = self.grammar.rule_name(rule), "rule failed");
        }
        Step::Return(ok)
    }

    fn advance_seq(&mut self) -> Step<'g> {
        loop {
            let checkpoint = self.checkpoint();
            let Some(Frame::Seq {
                items,
                current,
                committed,
                item_start,
            }) = self.stack.last_mut()
            else {
                return Step::Return(false);
            };
            let items: &'g [Expr] = *items;
            let Some(item) = items.get(*current) else {
                self.stack.pop();
                return Step::Return(true);
            };
            if matches!(item.node, ExprNode::Cut) {
                *committed = true;
                *current += 1;
                continue;
            }
            *item_start = checkpoint;
            return Step::Enter(item);
        }
    }

    fn next_alternative(&mut self) -> Step<'g> {
        let kind = self.source.current();
        let Some(Frame::Choice {
            alternatives, next, ..
        }) = self.stack.last_mut()
        else {
            return Step::Return(false);
        };
        let alternatives: &'g [Expr] = *alternatives;
        while let Some(alternative) = alternatives.get(*next) {
            *next += 1;
            if alternative.nullable || alternative.first.contains(kind) {
                return Step::Enter(alternative);
            }
        }
        self.stack.pop();
        Step::Return(false)
    }

    fn next_iteration(&mut self) -> Step<'g> {
        let checkpoint = self.checkpoint();
        let kind = self.source.current();
        let Some(Frame::Repeat {
            body,
            checkpoint: saved,
        }) = self.stack.last_mut()
        else {
            return Step::Return(false);
        };
        let body: &'g Expr = *body;
        *saved = checkpoint;
        if body.first.contains(kind) {
            return Step::Enter(body);
        }
        self.stack.pop();
        self.end_repeat(body, checkpoint)
    }

    /// Called when a repetition cannot start another iteration. Inside a
    /// committed sequence, input that neither continues the list nor ends it
    /// is skipped as junk and the repetition goes on.
    fn end_repeat(&mut self, body: &'g Expr, checkpoint: Checkpoint) -> Step<'g> {
        let follow = match self.stack.last() {
            Some(Frame::Seq {
                items,
                current,
                committed: true,
                ..
            }) => items.get(current + 1..).unwrap_or_default(),
            _ => return Step::Return(true),
        };
        let mut stop = TokenSet::EMPTY;
        for item in follow {
            stop = stop.union(item.first);
            if !item.nullable {
                break;
            }
        }
        if !self.in_entry_rule() {
            stop = stop.union(self.grammar.closers());
        }

        let kind = self.source.current();
        if kind == TokenKind::Eof || stop.contains(kind) {
            return Step::Return(true);
        }

        tracing::trace!(token = kind.describe(), "skipping junk");
        let boundary = stop.union(body.first).union(self.grammar.sync_tokens());
        self.skip_junk(boundary);
        self.stack.push(Frame::Repeat { body, checkpoint });
        self.next_iteration()
    }

    /// Recovers from a failed item of a committed sequence. The failed
    /// attempt was already rolled back.
    fn recover_item(&mut self, items: &'g [Expr], current: usize) -> Step<'g> {
        let item = &items[current];
        let rest = items.get(current + 1..).unwrap_or_default();
        let follow = self.continuation(rest);
        let kind = self.source.current();
        let at_end = kind == TokenKind::Eof;

        if let Some(expected) = expected_token(item) {
            tracing::trace!(expected = expected.describe(), found = kind.describe(), "recovering");
            if kind == expected {
                // Present, but not adjacent to the previous token.
                let marker = self.start_error();
                self.bump();
                marker.complete(&mut self.events, SyntaxKind::ErrorNode);
            } else if !at_end
                && self.source.nth(1) == expected
                && !self.grammar.sync_tokens().contains(kind)
            {
                let marker = self.start_error();
                self.bump();
                marker.complete(&mut self.events, SyntaxKind::ErrorNode);
                self.bump();
            } else if at_end || follow.contains(kind) {
                self.missing(Some(expected));
            } else {
                self.skip_until(follow.union(TokenSet::new(&[expected])));
                if self.source.current() == expected {
                    self.bump();
                } else {
                    self.missing(Some(expected));
                }
            }
            return self.continue_seq(items, current + 1);
        }

        tracing::trace!(found = kind.describe(), "recovering");
        if at_end || follow.contains(kind) {
            self.missing(None);
            return self.continue_seq(items, current + 1);
        }
        self.skip_until(follow.union(item.first));
        let next = self.source.current();
        if next != TokenKind::Eof && item.first.contains(next) {
            return self.continue_seq(items, current);
        }
        self.missing(None);
        self.continue_seq(items, current + 1)
    }

    fn continue_seq(&mut self, items: &'g [Expr], current: usize) -> Step<'g> {
        let item_start = self.checkpoint();
        self.stack.push(Frame::Seq {
            items,
            current,
            committed: true,
            item_start,
        });
        self.advance_seq()
    }

    // =========================================================================
    // Operator hosts
    // =========================================================================

    fn next_primary(&mut self) -> Step<'g> {
        let kind = self.source.current();
        let Some(Frame::Host(HostFrame {
            host,
            phase: HostPhase::Primary { next },
            ..
        })) = self.stack.last_mut()
        else {
            return Step::Return(false);
        };
        let host: &'g Host = *host;
        while let Some(primary) = host.primaries.get(*next) {
            *next += 1;
            if primary.nullable || primary.first.contains(kind) {
                return Step::Enter(primary);
            }
        }
        self.stack.pop();
        Step::Return(false)
    }

    fn next_operator(&mut self) -> Step<'g> {
        let checkpoint = self.checkpoint();
        let kind = self.source.current();
        let at_limit = self.depth >= MAX_DEPTH;
        let Some(Frame::Host(frame)) = self.stack.last_mut() else {
            return Step::Return(false);
        };
        let host: &'g Host = frame.host;
        if let HostPhase::Operator { next, active } = &mut frame.phase {
            while !at_limit {
                let Some(operator) = host.operators.get(*next) else {
                    break;
                };
                let index = *next;
                *next += 1;
                if operator.precedence >= frame.min_prec && operator.rest.first.contains(kind) {
                    *active = index;
                    frame.checkpoint = checkpoint;
                    // The node that wraps the left operand if the rest matches.
                    self.depth += 1;
                    return Step::Enter(&operator.rest);
                }
            }
        }
        let wraps = frame.wraps;
        self.stack.pop();
        self.depth = self.depth.saturating_sub(wraps);
        Step::Return(true)
    }

    fn resume_host(&mut self, mut frame: HostFrame<'g>, ok: bool) -> Step<'g> {
        match frame.phase {
            HostPhase::Primary { .. } => {
                if !ok {
                    self.restore(frame.checkpoint);
                    self.stack.push(Frame::Host(frame));
                    return self.next_primary();
                }
                frame.phase = HostPhase::Operator { next: 0, active: 0 };
            }
            HostPhase::Operator { active, .. } => {
                if ok {
                    let operator = &frame.host.operators[active];
                    let marker = frame.lhs.precede(&mut self.events);
                    marker.complete(&mut self.events, operator.kind);
                    frame.wraps += 1;
                    frame.phase = HostPhase::Operator { next: 0, active: 0 };
                } else {
                    self.restore(frame.checkpoint);
                    self.depth = self.depth.saturating_sub(1);
                }
            }
        }
        self.stack.push(Frame::Host(frame));
        self.next_operator()
    }
}

/// The single token an item stands for, if it is one.
fn expected_token(item: &Expr) -> Option<TokenKind> {
    match &item.node {
        ExprNode::Token(kind) => Some(*kind),
        ExprNode::Immediate(inner) => match inner.node {
            ExprNode::Token(kind) => Some(kind),
            _ => None,
        },
        _ => None,
    }
}
