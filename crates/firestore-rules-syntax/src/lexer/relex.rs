//! Incremental relexing.
//!
//! Given the tokens of the previous text and one merged byte edit, only the
//! window around the edit is lexed again. Tokens before the window are kept
//! as they are; tokens after it are shifted by the edit's length delta once
//! the fresh lexer lands on a boundary the old stream also had.

use text_size::TextSize;

use super::{Lexer, Token};
use crate::tree::ByteEdit;

/// Longest distance any token pattern looks past its own end.
const LEXER_LOOKAHEAD: u32 = 3;

/// The result of relexing an edited text.
#[derive(Debug)]
pub(crate) struct Relexed {
    /// Complete token stream of the new text.
    pub(crate) tokens: Vec<Token>,
    /// Byte offset where relexing started. Text and tokens before it are
    /// identical in the old and new streams.
    pub(crate) unchanged_prefix: TextSize,
    /// Old byte offset from which the old tokens were reused, shifted.
    /// `None` if the relexed window ran to the end of the input.
    pub(crate) resync_old: Option<TextSize>,
    /// Number of tokens that had to be lexed again.
    pub(crate) relexed: usize,
}

pub(crate) fn relex(old: &[Token], new_text: &str, edit: ByteEdit) -> Relexed {
    let delta = edit.delta();
    let restart = old.partition_point(|t| u32::from(t.range.end()) + LEXER_LOOKAHEAD <= u32::from(edit.start));
    let unchanged_prefix = old
        .get(restart)
        .map_or_else(|| old.last().map_or(TextSize::from(0), |t| t.range.end()), |t| t.range.start());

    let mut tokens: Vec<Token> = old[..restart].to_vec();
    let mut old_index = old.partition_point(|t| t.range.start() < edit.old_end);
    let mut resync = None;
    let mut relexed = 0usize;

    for token in Lexer::with_offset(new_text, unchanged_prefix) {
        let start = token.range.start();
        if start >= edit.new_end {
            let old_start = super::shift(start, -delta);
            while old.get(old_index).is_some_and(|t| t.range.start() < old_start) {
                old_index += 1;
            }
            if old.get(old_index).is_some_and(|t| t.range.start() == old_start) {
                resync = Some(old_index);
                break;
            }
        }
        tokens.push(token);
        relexed += 1;
    }

    let resync_old = resync.map(|index| {
        tokens.extend(old[index..].iter().map(|t| t.shifted(delta)));
        old[index].range.start()
    });

    Relexed {
        tokens,
        unchanged_prefix,
        resync_old,
        relexed,
    }
}
