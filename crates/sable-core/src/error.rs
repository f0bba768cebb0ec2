//! Error types for the Sable compiler core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CompilationError
//! ├── Syntax       - produced by the front ends, passed through unchanged
//! ├── semantic     - undefined symbols, redefinitions, arity, constants, limits...
//! ├── Unsupported  - valid syntax the core does not implement yet
//! └── Internal     - invariant violation inside the core itself
//! ```
//!
//! Every variant except `Internal` and `CodeTooLarge` carries the [`Span`] of
//! the offending node. [`CompilationError::kind`] gives the coarse
//! classification reported to drivers.

use std::fmt;

use thiserror::Error;

use crate::Span;

// ============================================================================
// Error kinds
// ============================================================================

/// Coarse classification of a [`CompilationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed token stream (front-end error).
    Syntax,
    /// The program is well-formed but meaningless.
    Semantics,
    /// A valid construct the core does not implement.
    Unsupported,
    /// A defect in the compiler itself.
    Internal,
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Semantics => "semantic error",
            ErrorKind::Unsupported => "unsupported feature",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Syntax errors
// ============================================================================

/// An error reported by one of the front-end parsers.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {span}")]
pub struct SyntaxError {
    /// A detailed error message.
    pub message: String,
    /// The source location where the error occurred.
    pub span: Span,
}

impl SyntaxError {
    /// Create a new syntax error.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

// ============================================================================
// Compilation errors
// ============================================================================

/// Errors raised while binding, generating or analyzing a compilation unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// Passed through from a front end.
    #[error("at {span}: {message}")]
    Syntax {
        /// The parser's message.
        message: String,
        /// Where the parser stopped.
        span: Span,
    },

    /// A name could not be resolved in any scope nor by the host.
    #[error("at {span}: undefined symbol '{name}'")]
    UndefinedSymbol {
        /// The unresolved name.
        name: String,
        /// Where the name was referenced.
        span: Span,
    },

    /// A name was defined twice in the same scope.
    #[error("at {span}: redefinition of '{name}'")]
    Redefinition {
        /// The duplicated name.
        name: String,
        /// Where the second definition occurred.
        span: Span,
    },

    /// A direct call passes the wrong number of arguments.
    #[error("at {span}: '{name}' expects {expected} argument(s), got {got}")]
    ArgumentCountMismatch {
        /// The called function.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Arguments at the call site.
        got: usize,
        /// Where the call occurred.
        span: Span,
    },

    /// A definition disagrees with its earlier forward declaration.
    #[error("at {span}: '{name}' was forward declared with {expected} parameter(s), defined with {got}")]
    ForwardMismatch {
        /// The function name.
        name: String,
        /// Parameter count of the forward declaration.
        expected: usize,
        /// Parameter count of the definition.
        got: usize,
        /// Where the definition occurred.
        span: Span,
    },

    /// A constant was required but the expression does not fold.
    #[error("at {span}: expression is not a constant")]
    NotConstant {
        /// The offending expression.
        span: Span,
    },

    /// An array size folded to zero or a negative value.
    #[error("at {span}: array size must be positive, got {size}")]
    InvalidArraySize {
        /// The folded size.
        size: i64,
        /// Where the size expression occurred.
        span: Span,
    },

    /// A literal or folded value does not fit in a value cell.
    #[error("at {span}: value {value} does not fit in a 32-bit cell")]
    ValueOutOfRange {
        /// The offending value.
        value: i64,
        /// Where it occurred.
        span: Span,
    },

    /// Host-managed cells reach into the cells the module owns.
    #[error("at {span}: host globals up to cell {host_end} overlap module globals starting at {module_base}")]
    GlobalOverlap {
        /// One past the last host cell.
        host_end: u64,
        /// First cell owned by the module.
        module_base: u32,
        /// Where the host global was referenced, or the unit.
        span: Span,
    },

    /// Address-of applied to something that is not a bytecode function.
    #[error("at {span}: cannot take the address of '{name}'")]
    NotAddressable {
        /// The name whose address was requested.
        name: String,
        /// Where the address-of occurred.
        span: Span,
    },

    /// Call syntax applied to a constant.
    #[error("at {span}: '{name}' is not callable")]
    NotCallable {
        /// The name that was called.
        name: String,
        /// Where the call occurred.
        span: Span,
    },

    /// The left side of an assignment is not storage.
    #[error("at {span}: expression is not assignable")]
    NotAssignable {
        /// The assignment target.
        span: Span,
    },

    /// A function declares more parameters than the VM supports.
    #[error("at {span}: '{name}' has {count} arguments, limit is {limit}")]
    TooManyArguments {
        /// The function name.
        name: String,
        /// Declared parameter count.
        count: usize,
        /// Configured limit.
        limit: usize,
        /// Where the function was declared.
        span: Span,
    },

    /// A function needs more simultaneously live locals than the VM supports.
    #[error("at {span}: '{name}' needs {count} local slots, limit is {limit}")]
    TooManyLocals {
        /// The function name.
        name: String,
        /// Local high-water mark.
        count: usize,
        /// Configured limit.
        limit: usize,
        /// Where the function was declared.
        span: Span,
    },

    /// A forward-declared function never received a body.
    #[error("at {span}: forward declared function '{name}' is never defined")]
    UnresolvedForward {
        /// The function name.
        name: String,
        /// Where the forward declaration occurred.
        span: Span,
    },

    /// Comparisons combine exactly two operands (`a = b = c` is rejected).
    #[error("at {span}: comparison operators cannot be chained")]
    ChainedComparison {
        /// The outer comparison.
        span: Span,
    },

    /// `break` or `next` used outside of any loop.
    #[error("at {span}: '{keyword}' outside of a loop")]
    OutsideLoop {
        /// The loop-control keyword.
        keyword: &'static str,
        /// Where it occurred.
        span: Span,
    },

    /// Two case clauses select the same constant key.
    #[error("at {span}: duplicate case key {value}")]
    DuplicateCaseKey {
        /// The repeated key.
        value: i32,
        /// Where the second occurrence is.
        span: Span,
    },

    /// A data initializer does not match its declaration.
    #[error("at {span}: invalid initializer for '{name}': {message}")]
    InvalidInitializer {
        /// The declared name.
        name: String,
        /// What is wrong with it.
        message: String,
        /// Where the initializer occurred.
        span: Span,
    },

    /// A function is recursive and the options forbid recursion.
    #[error("at {span}: '{name}' is recursive; its stack usage cannot be bounded")]
    RecursionRejected {
        /// The recursive function.
        name: String,
        /// Where it was declared.
        span: Span,
    },

    /// Worst-case stack usage is unknown or above the configured limit.
    #[error("at {span}: stack usage of '{name}' {usage} exceeds limit {limit}")]
    StackLimitExceeded {
        /// The function whose usage is too high.
        name: String,
        /// Computed usage (or "unbounded").
        usage: String,
        /// Configured limit.
        limit: u32,
        /// Where it was declared.
        span: Span,
    },

    /// Emitted code no longer fits the addressable range.
    #[error("code size {size} exceeds addressable limit {limit}")]
    CodeTooLarge {
        /// Bytes written so far.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A syntactically valid feature that is not implemented.
    #[error("at {span}: {feature} is not supported")]
    Unsupported {
        /// The feature.
        feature: String,
        /// Where it was used.
        span: Span,
    },

    /// Internal compiler error.
    #[error("internal error: {message}")]
    Internal {
        /// The error message.
        message: String,
    },
}

impl CompilationError {
    /// Shorthand for an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        CompilationError::Internal {
            message: message.into(),
        }
    }

    /// Get the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompilationError::Syntax { .. } => ErrorKind::Syntax,
            CompilationError::Unsupported { .. } => ErrorKind::Unsupported,
            CompilationError::Internal { .. } => ErrorKind::Internal,
            _ => ErrorKind::Semantics,
        }
    }

    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            CompilationError::Syntax { span, .. } => *span,
            CompilationError::UndefinedSymbol { span, .. } => *span,
            CompilationError::Redefinition { span, .. } => *span,
            CompilationError::ArgumentCountMismatch { span, .. } => *span,
            CompilationError::ForwardMismatch { span, .. } => *span,
            CompilationError::NotConstant { span } => *span,
            CompilationError::InvalidArraySize { span, .. } => *span,
            CompilationError::ValueOutOfRange { span, .. } => *span,
            CompilationError::GlobalOverlap { span, .. } => *span,
            CompilationError::NotAddressable { span, .. } => *span,
            CompilationError::NotCallable { span, .. } => *span,
            CompilationError::NotAssignable { span } => *span,
            CompilationError::TooManyArguments { span, .. } => *span,
            CompilationError::TooManyLocals { span, .. } => *span,
            CompilationError::UnresolvedForward { span, .. } => *span,
            CompilationError::ChainedComparison { span } => *span,
            CompilationError::OutsideLoop { span, .. } => *span,
            CompilationError::DuplicateCaseKey { span, .. } => *span,
            CompilationError::InvalidInitializer { span, .. } => *span,
            CompilationError::RecursionRejected { span, .. } => *span,
            CompilationError::StackLimitExceeded { span, .. } => *span,
            CompilationError::Unsupported { span, .. } => *span,
            CompilationError::CodeTooLarge { .. } => Span::synthetic(),
            CompilationError::Internal { .. } => Span::synthetic(),
        }
    }
}

impl From<SyntaxError> for CompilationError {
    fn from(err: SyntaxError) -> Self {
        CompilationError::Syntax {
            message: err.message,
            span: err.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_display() {
        let err = CompilationError::UndefinedSymbol {
            name: "foo".to_string(),
            span: Span::new(10, 5),
        };
        assert_eq!(format!("{err}"), "at 10:5: undefined symbol 'foo'");
    }

    #[test]
    fn compilation_error_span() {
        let span = Span::new(5, 10);
        let err = CompilationError::NotAssignable { span };
        assert_eq!(err.span(), span);
    }

    #[test]
    fn error_kinds() {
        let semantic = CompilationError::Redefinition {
            name: "f".to_string(),
            span: Span::new(1, 1),
        };
        assert_eq!(semantic.kind(), ErrorKind::Semantics);

        let unsupported = CompilationError::Unsupported {
            feature: "typed parameters".to_string(),
            span: Span::new(1, 1),
        };
        assert_eq!(unsupported.kind(), ErrorKind::Unsupported);

        assert_eq!(
            CompilationError::internal("broken").kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn global_overlap_display() {
        let err = CompilationError::GlobalOverlap {
            host_end: 3,
            module_base: 2,
            span: Span::new(4, 1),
        };
        assert_eq!(err.kind(), ErrorKind::Semantics);
        assert_eq!(
            format!("{err}"),
            "at 4:1: host globals up to cell 3 overlap module globals starting at 2"
        );
    }

    #[test]
    fn syntax_error_converts() {
        let err: CompilationError = SyntaxError::new(Span::new(2, 3), "expected ')'").into();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.span(), Span::new(2, 3));
        assert_eq!(format!("{err}"), "at 2:3: expected ')'");
    }

    #[test]
    fn internal_error_has_no_position() {
        let err = CompilationError::internal("patch chain left open");
        assert!(!err.span().is_known());
        assert_eq!(format!("{err}"), "internal error: patch chain left open");
    }
}
