//! Sable
//!
//! Compiler core for the Sable language: binding, bytecode generation and
//! static stack analysis for a stack VM without a heap-allocated call stack.
//!
//! Front ends produce a [`core::ast::Unit`] per translation unit; a
//! [`ModuleBuilder`] compiles the units of one module in order and returns a
//! [`CompiledModule`] holding the code, the initial data image and the
//! per-function metadata the VM needs to size its stack.
//!
//! ```
//! use bumpalo::Bump;
//! use sable::prelude::*;
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let at = Span::new(1, 1);
//! let sum = b.binary(b.number(1, at), BinaryOp::Add, b.number(2, at), at);
//! let unit = b.unit(
//!     vec![b.proc_decl(b.ident("main", at), vec![], Some(vec![b.ret(Some(sum), at)]), true, at)],
//!     at,
//! );
//!
//! let mut diagnostics = Diagnostics::new();
//! let mut builder = ModuleBuilder::new(CompilerOptions::default());
//! builder.compile_unit(&unit, &NoHost, &ArithmeticFolder, &mut diagnostics).unwrap();
//! let module = builder.finish(&mut diagnostics).unwrap();
//!
//! let main = module.function("main").unwrap();
//! assert_eq!((main.arg_count, main.local_count), (0, 0));
//! assert_eq!(main.call_depth, Some(1));
//! ```

pub use sable_compiler as compiler;
pub use sable_core as core;

pub use sable_compiler::{
    AnalysisReport, CompileStats, CompiledModule, CompilerOptions, ExportEntry, FunctionFlags, FunctionMeta,
    GlobalEntry, ModuleBuilder, ModuleExports, OpCode, RecursionPolicy, UsageSummary, compile, disassemble,
};
pub use sable_core::{
    ArithmeticFolder, CompilationError, ConstFolder, Diagnostic, DiagnosticSink, Diagnostics, ErrorKind,
    HostEnvironment, HostFunction, HostGlobal, HostTable, LogSink, NoHost, Severity, Span,
};

// Re-export the types needed to drive a build
pub mod prelude {
    pub use sable_compiler::{CompiledModule, CompilerOptions, ModuleBuilder, RecursionPolicy, compile};
    pub use sable_core::ast::{AstBuilder, BinaryOp, Unit, UnaryOp};
    pub use sable_core::{
        ArithmeticFolder, CompilationError, Diagnostics, HostEnvironment, HostTable, LogSink, NoHost, Span,
    };
}
