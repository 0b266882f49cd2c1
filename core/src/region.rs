//! Half-open character spans and how they follow document edits.

use serde::{Deserialize, Serialize};

/// A half-open character span `[start, end)` in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Empty region at `point`.
    pub fn caret(point: usize) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Closed containment: `other` lies within `self`, endpoints included.
    pub fn contains(&self, other: Region) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_point(&self, point: usize) -> bool {
        self.start <= point && point <= self.end
    }

    /// Where this region ends up after `change` is applied to the document.
    ///
    /// An edit that ends at or before the start shifts the region, an edit
    /// that starts at or after the end leaves it alone, and an overlapping
    /// edit is absorbed into the region.
    pub fn map_through(&self, change: &TextChange) -> Region {
        let edit_start = change.position;
        let edit_end = change.position + change.old_len;

        if edit_end <= self.start {
            return Region {
                start: shift(self.start, change.delta()),
                end: shift(self.end, change.delta()),
            };
        }
        if edit_start >= self.end {
            return *self;
        }

        let start = self.start.min(edit_start);
        let end = if edit_end <= self.end {
            shift(self.end, change.delta())
        } else {
            edit_start + change.new_len
        };
        Region::new(start, end.max(start))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A single document edit in character offsets: `old_len` characters at
/// `position` were replaced by `new_len` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChange {
    pub position: usize,
    pub old_len: usize,
    pub new_len: usize,
}

impl TextChange {
    pub fn new(position: usize, old_len: usize, new_len: usize) -> Self {
        Self {
            position,
            old_len,
            new_len,
        }
    }

    pub fn insert(position: usize, len: usize) -> Self {
        Self::new(position, 0, len)
    }

    pub fn delete(region: Region) -> Self {
        Self::new(region.start, region.len(), 0)
    }

    /// Net length change of the edit.
    pub fn delta(&self) -> isize {
        self.new_len as isize - self.old_len as isize
    }
}

pub(crate) fn shift(value: usize, delta: isize) -> usize {
    value.saturating_add_signed(delta)
}

/// Character count of `text`, the unit every offset in this crate uses.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `char_offset`-th character, clamped to the text end.
pub fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Character offset reached after `units` UTF-16 code units of `text`,
/// clamped to the text end. A count that falls inside a surrogate pair
/// stops before that character.
pub fn char_offset_of_utf16(text: &str, units: usize) -> usize {
    let mut seen = 0;
    for (offset, ch) in text.chars().enumerate() {
        seen += ch.len_utf16();
        if seen > units {
            return offset;
        }
    }
    char_len(text)
}

/// Substring covering `region`, clamped to the text.
pub fn slice(text: &str, region: Region) -> &str {
    let start = byte_index(text, region.start);
    let end = byte_index(text, region.end);
    &text[start..end.max(start)]
}
