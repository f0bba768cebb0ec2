//! Sable Compiler
//!
//! Binding, bytecode generation and static stack analysis for Sable modules.
//!
//! ## Architecture
//!
//! Each translation unit goes through two passes, then the module is
//! analyzed as a whole:
//!
//! - **Binding**: Declare globals and procedures, resolve every name to a
//!   declaration, assign global offsets and local slots, fold constants and
//!   promote lambdas to anonymous functions
//! - **Generation**: Emit bytecode for every function body, backpatching
//!   forward jumps and calls
//! - **Analysis**: Build the call graph, detect recursion and compute
//!   worst-case call depth and stack usage
//!
//! ## Modules
//!
//! - [`analysis`]: Call graph and stack usage analysis
//! - [`binder`]: Name resolution and storage assignment
//! - [`bytecode`]: Instruction set, code buffer and disassembler
//! - [`codegen`]: Bytecode generation for function bodies
//! - [`decl`]: Declarations shared by every pass
//! - [`emit`]: Instruction emitter tracking evaluation depth
//! - [`module`]: Multi-unit module builds and their output
//! - [`options`]: Limits and policies
//! - [`scope`]: Global namespace and nested local scopes

pub mod analysis;
pub mod binder;
pub mod bytecode;
pub mod codegen;
pub mod decl;
pub mod emit;
pub mod module;
pub mod options;
pub mod scope;

pub use analysis::{AnalysisReport, FunctionUsage, UsageSummary};
pub use bytecode::{OpCode, disassemble};
pub use decl::FunctionFlags;
pub use module::{
    CompileStats, CompiledModule, ExportEntry, FunctionMeta, GlobalEntry, ModuleBuilder, ModuleExports,
    compile,
};
pub use options::{CompilerOptions, RecursionPolicy};

// Re-export CompilationError from core for convenience
pub use sable_core::CompilationError;
