//! Source positions attached to AST nodes and diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifies one source module of a compilation unit
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Wraps a raw module index
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A byte offset span inside one module's source text
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset, inclusive
    pub start: u32,
    /// End offset, exclusive
    pub end: u32,
}

impl Span {
    /// Span used for synthesized nodes (default constructors, builtins)
    pub const DUMMY: Self = Self { start: 0, end: 0 };

    /// Creates a span from two offsets
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Byte range usable for slicing the source text
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for zero-width spans
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A span together with the module it belongs to
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileSpan {
    /// Owning module
    pub file: FileId,
    /// Offsets inside that module
    pub span: Span,
}

impl FileSpan {
    /// Creates a file span
    #[must_use]
    pub const fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }

    /// Byte range inside the owning module
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.span.range()
    }
}

impl fmt::Display for FileSpan {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "module#{}@{}..{}", self.file.0, self.span.start, self.span.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_covers_both() {
        let merged = Span::new(4, 9).merge(Span::new(2, 6));
        assert_eq!(merged, Span::new(2, 9));
        assert_eq!(merged.len(), 7);
        assert!(Span::DUMMY.is_empty());
    }

    #[test]
    fn test_file_span_display() {
        let span = FileSpan::new(FileId::new(3), Span::new(10, 12));
        assert_eq!(span.to_string(), "module#3@10..12");
    }
}
