//! Source positions attached to AST nodes and diagnostics.

use std::fmt;

/// Position of a node in its source text.
///
/// Both front ends (the Algol-style reader and the s-expression reader)
/// stamp every node with the line and column where it starts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    /// Line number (1-indexed, 0 when unknown).
    pub line: u32,
    /// Column number (1-indexed, 0 when unknown).
    pub col: u32,
}

impl Span {
    /// Create a span at the given position.
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Position used for compiler-synthesized nodes.
    #[inline]
    pub const fn synthetic() -> Self {
        Self { line: 0, col: 0 }
    }

    /// Whether this span points at real source text.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
