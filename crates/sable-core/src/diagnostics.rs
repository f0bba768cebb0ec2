//! Diagnostics reported while compiling a unit.
//!
//! The compiler never prints. Every error is handed to a [`DiagnosticSink`]
//! with its severity and source position before it is returned, so a driver
//! can collect messages ([`Diagnostics`]), forward them to the `log` crate
//! ([`LogSink`]), or do both.

use std::collections::VecDeque;
use std::fmt;

use crate::{CompilationError, Span};

/// The severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Compilation of the unit stops.
    Error,
    /// The program compiles but something is suspicious (e.g. recursion).
    Warning,
    /// Informational note.
    Info,
}

impl Severity {
    /// Lower-case label used when rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    fn log_level(&self) -> log::Level {
        match self {
            Severity::Error => log::Level::Error,
            Severity::Warning => log::Level::Warn,
            Severity::Info => log::Level::Info,
        }
    }
}

/// A single message with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The diagnostic message text.
    pub message: String,
    /// Line of the offending node (1-based, 0 if unknown).
    pub line: u32,
    /// Column of the offending node (1-based, 0 if unknown).
    pub col: u32,
}

impl Diagnostic {
    /// Create a diagnostic at a span.
    pub fn new(severity: Severity, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    /// Build the error diagnostic for a compilation error.
    pub fn from_error(err: &CompilationError) -> Self {
        Self::new(
            Severity::Error,
            err.span(),
            format!("{}: {}", err.kind(), err),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.line,
            self.col,
            self.severity.as_str(),
            self.message
        )
    }
}

/// Receiver of compiler diagnostics.
pub trait DiagnosticSink {
    /// Record one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collects diagnostics in emission order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: VecDeque<Diagnostic>,
    has_errors: bool,
}

impl Diagnostics {
    /// Creates a new, empty diagnostics collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if any error was recorded.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Returns `true` if any warning was recorded.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Drop all recorded diagnostics.
    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.has_errors = false;
    }

    /// Iterate over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Iterate over error diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warning diagnostics only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Number of recorded diagnostics.
    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Number of recorded errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Number of recorded warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.has_errors = true;
        }
        self.diagnostics.push_back(diagnostic);
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

/// Forwards diagnostics to the `log` crate under the `sable` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::log!(target: "sable", diagnostic.severity.log_level(), "{}", diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_and_counts() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());

        diagnostics.report(Diagnostic::new(
            Severity::Warning,
            Span::new(2, 4),
            "'f' is recursive",
        ));
        assert!(!diagnostics.has_errors());
        assert!(diagnostics.has_warnings());

        diagnostics.report(Diagnostic::new(
            Severity::Error,
            Span::new(3, 1),
            "undefined symbol 'x'",
        ));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.count(), 2);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);

        diagnostics.clear();
        assert!(diagnostics.is_empty());
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn renders_position_and_severity() {
        let diagnostic = Diagnostic::new(Severity::Error, Span::new(10, 5), "boom");
        assert_eq!(format!("{}", diagnostic), "10:5: error: boom");
    }

    #[test]
    fn error_diagnostic_carries_kind() {
        let err = CompilationError::NotAssignable {
            span: Span::new(7, 2),
        };
        let diagnostic = Diagnostic::from_error(&err);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!((diagnostic.line, diagnostic.col), (7, 2));
        assert!(diagnostic.message.starts_with("semantic error"));
    }
}
