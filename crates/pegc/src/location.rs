//! Source locations carried on every AST node and diagnostic.

use facet::Facet;

/// A single point in the original grammar source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
pub struct Position {
    /// Zero-based byte offset from the start of the source.
    pub offset: usize,
    /// One-based line number.
    pub line: usize,
    /// One-based column number.
    pub column: usize,
}

impl Position {
    /// Builds a position from its three coordinates.
    #[must_use]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

/// A half-open span `[start, end)` in the original grammar source.
///
/// Established by the bootstrap parser and preserved verbatim through every
/// pass; no pass in this crate synthesizes a `Location` from scratch except
/// when it must point at a rewritten subtree, in which case it reuses the
/// location of the node that was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
pub struct Location {
    /// Start of the span, inclusive.
    pub start: Position,
    /// End of the span, exclusive.
    pub end: Position,
}

impl Location {
    /// Builds a location from explicit start/end positions.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width sentinel location, used only where the grammar
    /// genuinely has no corresponding source span (synthesized nodes).
    #[must_use]
    pub fn synthetic() -> Self {
        let p = Position::new(0, 1, 1);
        Self::new(p, p)
    }
}
