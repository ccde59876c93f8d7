//! Byte offset to line/column conversion.
//!
//! Every range the syntax tree hands out is a byte range into the raw file
//! text. Editors want zero-based `(line, column)` pairs, so this module keeps
//! the line-start table for a text and converts in both directions.
//!
//! [`LineCol`] columns count bytes. LSP positions count UTF-16 code units;
//! [`LineIndex::to_lsp`] and [`LineIndex::offset_from_lsp`] convert at that
//! boundary.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Position;

/// A zero-based line and (byte) column.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    pub fn new(line: u32, col: u32) -> LineCol {
        LineCol { line, col }
    }
}

/// Offsets at which each line of `text` begins. Always starts with `0`.
pub fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(i, _)| i + 1),
        )
        .collect()
}

/// Resolve `offset` against a precomputed line-start table.
///
/// `len` is the byte length of the text the table was built from; offsets
/// beyond it yield `None`. An offset equal to `len` is the end-of-file
/// position and resolves normally. An offset sitting exactly on a line start
/// resolves to column 0 of that line.
pub fn resolve(offset: usize, line_starts: &[usize], len: usize) -> Option<LineCol> {
    if offset > len || line_starts.is_empty() {
        return None;
    }

    let line = line_starts
        .partition_point(|start| *start <= offset)
        .checked_sub(1)?;
    let col = offset - line_starts[line];

    Some(LineCol {
        line: u32::try_from(line).ok()?,
        col: u32::try_from(col).ok()?,
    })
}

/// Line-start table bundled with the length of its text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> LineIndex {
        LineIndex {
            starts: line_starts(text),
            len: text.len(),
        }
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.starts
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn resolve(&self, offset: usize) -> Option<LineCol> {
        resolve(offset, &self.starts, self.len)
    }

    /// The byte offset of `position`, clamped to the end of its line.
    pub fn offset(&self, position: LineCol) -> Option<usize> {
        let line = position.line as usize;
        let start = *self.starts.get(line)?;
        let end = self
            .starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);

        Some((start + position.col as usize).min(end))
    }

    /// Byte range of `line` without its newline.
    fn line_span(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.starts.get(line)?;
        let end = self
            .starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);
        Some((start, end))
    }

    /// The LSP position of `position` in `text`, with the column counted in
    /// UTF-16 code units.
    pub fn to_lsp(&self, text: &str, position: LineCol) -> Position {
        let character = self
            .line_span(position.line as usize)
            .and_then(|(start, end)| {
                let mut column = (start + position.col as usize).min(end);
                while column > start && !text.is_char_boundary(column) {
                    column -= 1;
                }
                text.get(start..column)
            })
            .map(|head| head.encode_utf16().count())
            .unwrap_or(position.col as usize);

        Position {
            line: position.line,
            character: u32::try_from(character).unwrap_or(u32::MAX),
        }
    }

    /// The byte offset in `text` of an LSP position, clamped to the end of
    /// its line. A column inside a surrogate pair lands on the character.
    pub fn offset_from_lsp(&self, text: &str, position: Position) -> Option<usize> {
        let (start, end) = self.line_span(position.line as usize)?;
        let line = text.get(start..end)?;

        let mut units = 0;
        for (i, c) in line.char_indices() {
            if units >= position.character as usize {
                return Some(start + i);
            }
            units += c.len_utf16();
        }
        Some(end)
    }
}
