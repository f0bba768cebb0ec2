//! Sable Core
//!
//! Shared data model for the Sable compiler.
//!
//! ## Modules
//!
//! - [`ast`]: Canonical arena-allocated syntax tree produced by both front ends
//! - [`diagnostics`]: Diagnostic messages and sinks
//! - [`error`]: Error types and their classification
//! - [`fold`]: Constant evaluation interface and the default arithmetic folder
//! - [`host`]: Interface to the environment that hosts compiled modules

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod fold;
pub mod host;
mod ids;
mod span;

pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, LogSink, Severity};
pub use error::{CompilationError, ErrorKind, SyntaxError};
pub use fold::{ArithmeticFolder, ConstFolder, ConstLookup};
pub use host::{CallingConvention, HostEnvironment, HostFunction, HostGlobal, HostTable, NoHost};
pub use ids::{DeclId, UnitId};
pub use span::Span;
