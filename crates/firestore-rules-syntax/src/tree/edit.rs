//! Text edits and offset mapping.

use text_size::{TextRange, TextSize};

use crate::lexer::shift;

/// A position as row and byte column, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    /// Zero-based line.
    pub row: u32,
    /// Zero-based byte offset within the line.
    pub column: u32,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// The point of `offset` within `text`.
    #[must_use]
    pub fn of(text: &str, offset: TextSize) -> Self {
        let end = usize::from(offset).min(text.len());
        Self::default().advance(&text.as_bytes()[..end])
    }

    fn advance(self, bytes: &[u8]) -> Self {
        bytes.iter().fold(self, |point, byte| {
            if *byte == b'\n' {
                Self::new(point.row + 1, 0)
            } else {
                Self::new(point.row, point.column + 1)
            }
        })
    }
}

/// One text mutation: the bytes `start_byte..old_end_byte` of the old text
/// were replaced by the bytes `start_byte..new_end_byte` of the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edit {
    /// Where the change begins, in both texts.
    pub start_byte: TextSize,
    /// End of the replaced span in the old text.
    pub old_end_byte: TextSize,
    /// End of the inserted span in the new text.
    pub new_end_byte: TextSize,
    /// `start_byte` as a point.
    pub start_point: Point,
    /// `old_end_byte` as a point in the old text.
    pub old_end_point: Point,
    /// `new_end_byte` as a point in the new text.
    pub new_end_point: Point,
}

impl Edit {
    /// Describes replacing `range` of `old_text` with `replacement`.
    #[must_use]
    pub fn replace(old_text: &str, range: TextRange, replacement: &str) -> Self {
        let start_point = Point::of(old_text, range.start());
        let old_end_point = Point::of(old_text, range.end());
        let new_end_point = start_point.advance(replacement.as_bytes());
        Self {
            start_byte: range.start(),
            old_end_byte: range.end(),
            new_end_byte: range.start() + TextSize::of(replacement),
            start_point,
            old_end_point,
            new_end_point,
        }
    }

    /// Describes inserting `text` at `offset`.
    #[must_use]
    pub fn insert(old_text: &str, offset: TextSize, text: &str) -> Self {
        Self::replace(old_text, TextRange::empty(offset), text)
    }

    /// Describes deleting `range`.
    #[must_use]
    pub fn delete(old_text: &str, range: TextRange) -> Self {
        Self::replace(old_text, range, "")
    }

    /// Change in text length caused by the edit.
    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_end_byte)) - i64::from(u32::from(self.old_end_byte))
    }

    /// Maps the start of a range through the edit. Offsets inside the
    /// replaced span move to the start of the edit.
    pub(crate) fn map_start(&self, offset: TextSize) -> TextSize {
        if offset < self.start_byte {
            offset
        } else if offset >= self.old_end_byte {
            shift(offset, self.delta())
        } else {
            self.start_byte
        }
    }

    /// Maps the end of a range through the edit. Offsets inside the replaced
    /// span move to the end of the inserted text.
    pub(crate) fn map_end(&self, offset: TextSize) -> TextSize {
        if offset <= self.start_byte {
            offset
        } else if offset >= self.old_end_byte {
            shift(offset, self.delta())
        } else {
            self.new_end_byte
        }
    }

    pub(crate) fn map_range(&self, range: TextRange) -> TextRange {
        let start = self.map_start(range.start());
        let end = self.map_end(range.end()).max(start);
        TextRange::new(start, end)
    }

    /// Whether the edit touches `range`, adjacency included.
    pub(crate) fn touches(&self, range: TextRange) -> bool {
        self.start_byte <= range.end() && range.start() <= self.old_end_byte
    }
}

/// Byte-only edit used internally; several [`Edit`]s merge into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteEdit {
    pub(crate) start: TextSize,
    pub(crate) old_end: TextSize,
    pub(crate) new_end: TextSize,
}

impl ByteEdit {
    pub(crate) fn new(start: TextSize, old_end: TextSize, new_end: TextSize) -> Self {
        Self {
            start,
            old_end,
            new_end,
        }
    }

    pub(crate) fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_end)) - i64::from(u32::from(self.old_end))
    }

    /// Combines `self` with an edit `next` expressed in the coordinates of
    /// the text after `self`. The result spans both changes in the
    /// coordinates of the text before `self`.
    pub(crate) fn then(self, next: ByteEdit) -> ByteEdit {
        let start = self.start.min(next.start);
        let (old_end, union_end) = if next.old_end > self.new_end {
            (shift(next.old_end, -self.delta()), next.old_end)
        } else {
            (self.old_end, self.new_end)
        };
        let new_end = shift(union_end, next.delta());
        ByteEdit::new(start, old_end, new_end.max(start))
    }

    /// Merges a sequence of edits, each relative to the text left by the
    /// previous one.
    pub(crate) fn merge<'e>(edits: impl IntoIterator<Item = &'e Edit>) -> Option<ByteEdit> {
        edits
            .into_iter()
            .map(ByteEdit::from)
            .reduce(ByteEdit::then)
    }

    /// The smallest edit turning `old` into `new`, or `None` if they are equal.
    pub(crate) fn diff(old: &str, new: &str) -> Option<ByteEdit> {
        if old == new {
            return None;
        }
        let (old_bytes, new_bytes) = (old.as_bytes(), new.as_bytes());
        let mut prefix = old_bytes
            .iter()
            .zip(new_bytes)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(prefix) || !new.is_char_boundary(prefix) {
            prefix -= 1;
        }
        let max_suffix = old.len().min(new.len()) - prefix;
        let mut suffix = old_bytes
            .iter()
            .rev()
            .zip(new_bytes.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(old.len() - suffix) || !new.is_char_boundary(new.len() - suffix)
        {
            suffix -= 1;
        }
        let size = |n: usize| TextSize::try_from(n).unwrap_or(TextSize::from(u32::MAX));
        Some(ByteEdit::new(
            size(prefix),
            size(old.len() - suffix),
            size(new.len() - suffix),
        ))
    }

    /// Checks that the edit explains the difference between the texts:
    /// everything outside the edited span is unchanged.
    pub(crate) fn explains(&self, old: &str, new: &str) -> bool {
        let (start, old_end, new_end) = (
            usize::from(self.start),
            usize::from(self.old_end),
            usize::from(self.new_end),
        );
        if start > old_end || start > new_end || old.len() - old_end.min(old.len()) != new.len() - new_end.min(new.len()) {
            return false;
        }
        match (
            old.get(..start),
            new.get(..start),
            old.get(old_end..),
            new.get(new_end..),
        ) {
            (Some(old_prefix), Some(new_prefix), Some(old_suffix), Some(new_suffix)) => {
                old_prefix == new_prefix && old_suffix == new_suffix
            }
            _ => false,
        }
    }
}

impl From<&Edit> for ByteEdit {
    fn from(edit: &Edit) -> Self {
        ByteEdit::new(edit.start_byte, edit.old_end_byte, edit.new_end_byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn test_points() {
        let text = "ab\ncd\nef";
        assert_eq!(Point::of(text, 0.into()), Point::new(0, 0));
        assert_eq!(Point::of(text, 4.into()), Point::new(1, 1));
        assert_eq!(Point::of(text, 8.into()), Point::new(2, 2));

        let edit = Edit::replace(text, range(3, 5), "x\ny");
        assert_eq!(edit.start_point, Point::new(1, 0));
        assert_eq!(edit.old_end_point, Point::new(1, 2));
        assert_eq!(edit.new_end_point, Point::new(2, 1));
        assert_eq!(edit.new_end_byte, TextSize::from(6));
        assert_eq!(edit.delta(), 1);
    }

    #[test]
    fn test_offset_mapping() {
        let edit = Edit::replace("0123456789", range(3, 5), "abcd");
        assert_eq!(edit.map_start(2.into()), TextSize::from(2));
        assert_eq!(edit.map_start(4.into()), TextSize::from(3));
        assert_eq!(edit.map_end(4.into()), TextSize::from(7));
        assert_eq!(edit.map_start(5.into()), TextSize::from(7));
        assert_eq!(edit.map_end(9.into()), TextSize::from(11));
        assert_eq!(edit.map_range(range(0, 3)), range(0, 3));
        assert!(edit.touches(range(0, 3)));
        assert!(!edit.touches(range(6, 8)));
    }

    #[test]
    fn test_merge_sequential_edits() {
        // "hello world" -> "hello, world" -> "hello, big world"
        let first = Edit::insert("hello world", 5.into(), ",");
        let second = Edit::insert("hello, world", 7.into(), "big ");
        let merged = ByteEdit::merge([&first, &second]).unwrap();
        // The merged span covers the space between the two insertions.
        assert_eq!(merged, ByteEdit::new(5.into(), 6.into(), 11.into()));
        assert!(merged.explains("hello world", "hello, big world"));
    }

    #[test]
    fn test_merge_overlapping_edits() {
        // "abcdef" -> "abXYZef" -> "aQZef"
        let first = Edit::replace("abcdef", range(2, 4), "XYZ");
        let second = Edit::replace("abXYZef", range(1, 4), "Q");
        let merged = ByteEdit::merge([&first, &second]).unwrap();
        assert_eq!(merged, ByteEdit::new(1.into(), 4.into(), 3.into()));
        assert!(merged.explains("abcdef", "aQZef"));
    }

    #[test]
    fn test_diff() {
        assert_eq!(ByteEdit::diff("same", "same"), None);
        let edit = ByteEdit::diff("allow read;", "allow write;").unwrap();
        assert!(edit.explains("allow read;", "allow write;"));
        assert_eq!(edit.start, TextSize::from(6));

        let edit = ByteEdit::diff("aaa", "aaaa").unwrap();
        assert!(edit.explains("aaa", "aaaa"));
    }

    #[test]
    fn test_explains_rejects_wrong_edits() {
        let edit = ByteEdit::new(0.into(), 1.into(), 1.into());
        assert!(!edit.explains("abc", "xbz"));
        assert!(!edit.explains("abc", "abcd"));
    }
}
