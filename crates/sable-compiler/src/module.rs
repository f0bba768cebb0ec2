//! Module builds.
//!
//! A module is built from one or more translation units that share one
//! global namespace, one data image and one code buffer:
//!
//! ```text
//! ModuleBuilder::new(options)
//!     compile_unit(unit 1) -> bind, generate
//!     compile_unit(unit 2) -> bind, generate   ; may call into unit 1
//!     finish()             -> forward check, stack analysis, output
//! ```
//!
//! The first error of a unit is reported to the diagnostic sink and
//! returned; the builder is unusable afterwards, since the code written so
//! far may reference the failed unit.

use rustc_hash::FxHashMap;
use sable_core::ast::Unit;
use sable_core::{
    ArithmeticFolder, CompilationError, ConstFolder, Diagnostic, DiagnosticSink, HostEnvironment,
    HostFunction, HostGlobal, UnitId,
};

use crate::analysis::{self, UsageSummary};
use crate::binder::Binder;
use crate::bytecode::{CodeBuffer, disassemble};
use crate::codegen::{CodeGenerator, GeneratedUnit, data_image};
use crate::decl::{DeclArena, DeclKind, FunctionFlags};
use crate::options::CompilerOptions;
use crate::scope::SymbolEnv;

type Result<T> = std::result::Result<T, CompilationError>;

// ============================================================================
// Output
// ============================================================================

/// Everything the VM needs about one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMeta {
    /// Declared or synthesized name.
    pub name: String,
    /// Entry address.
    pub address: u16,
    /// Parameter count.
    pub arg_count: usize,
    /// Local frame slots.
    pub local_count: usize,
    /// Deepest evaluation stack of the body.
    pub max_eval_depth: u32,
    /// Longest call chain (`None` = unbounded).
    pub call_depth: Option<u32>,
    /// Worst-case cumulative stack usage (`None` = unbounded).
    pub stack_usage: Option<u32>,
    /// Function properties.
    pub flags: FunctionFlags,
}

/// One named function visible to other modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    /// Function name.
    pub name: String,
    /// Entry address in the exporting module.
    pub address: u16,
    /// Parameter count.
    pub arg_count: usize,
    /// Worst-case cumulative stack usage.
    pub stack_usage: Option<u32>,
    /// Declared `export`; only these link.
    pub exported: bool,
}

/// Address table of a compiled module.
///
/// Another module links against it as a host environment: each exported
/// function resolves to a bytecode-hosted function whose id is its index in
/// this table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleExports {
    entries: Vec<ExportEntry>,
    by_name: FxHashMap<String, usize>,
}

impl ModuleExports {
    fn push(&mut self, entry: ExportEntry) {
        self.by_name.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Every named function, exported or not, in address order.
    pub fn entries(&self) -> &[ExportEntry] {
        &self.entries
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<&ExportEntry> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    /// Id under which an exported function links.
    pub fn id_of(&self, name: &str) -> Option<u16> {
        let index = *self.by_name.get(name)?;
        if !self.entries[index].exported {
            return None;
        }
        u16::try_from(index).ok()
    }

    /// Exported functions.
    pub fn exported(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.iter().filter(|entry| entry.exported)
    }
}

impl HostEnvironment for ModuleExports {
    fn resolve_function(&self, name: &str) -> Option<HostFunction> {
        let id = self.id_of(name)?;
        let entry = self.get(name)?;
        Some(HostFunction::bytecode(id, Some(entry.arg_count), entry.stack_usage))
    }
}

/// A global datum placed by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalEntry {
    /// Declared name.
    pub name: String,
    /// Cells in the data segment.
    pub global: HostGlobal,
}

/// Aggregate statistics of a module build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Translation units compiled.
    pub units: u32,
    /// Bytes of code.
    pub code_size: usize,
    /// Cells of global data.
    pub data_size: usize,
    /// Some function calls through a function value.
    pub calls_indirectly: bool,
    /// Worst case over exported entry points.
    pub exported: UsageSummary,
    /// Worst case over every function.
    pub all: UsageSummary,
}

/// Output of a successful module build.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// Bytecode of every function.
    pub code: Vec<u8>,
    /// Source line of every code byte.
    pub lines: Vec<u32>,
    /// Initial global data cells.
    pub data: Vec<i32>,
    /// Functions in address order.
    pub functions: Vec<FunctionMeta>,
    /// Address table for linking.
    pub exports: ModuleExports,
    /// Globals owned by the module, by offset. Cells below the first one
    /// belong to the host.
    pub globals: Vec<GlobalEntry>,
    /// Build statistics.
    pub stats: CompileStats,
}

impl CompiledModule {
    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionMeta> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Source line of the instruction at `offset`.
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    /// Render the code as text.
    pub fn disassemble(&self) -> String {
        disassemble(&self.code)
    }

    /// Look up a module global by name.
    pub fn global(&self, name: &str) -> Option<&GlobalEntry> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Hand the module's globals to `host`, so modules compiled against it
    /// share them and place their own globals above.
    pub fn register_globals(&self, host: &mut dyn HostEnvironment) {
        for entry in &self.globals {
            host.register_global(&entry.name, entry.global);
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds one module from translation units compiled in order.
pub struct ModuleBuilder {
    options: CompilerOptions,
    decls: DeclArena,
    env: SymbolEnv,
    code: CodeBuffer,
    units: u32,
    calls_indirectly: bool,
    poisoned: bool,
}

impl ModuleBuilder {
    /// Start an empty module.
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            decls: DeclArena::new(),
            env: SymbolEnv::new(),
            code: CodeBuffer::new(),
            units: 0,
            calls_indirectly: false,
            poisoned: false,
        }
    }

    /// Options of this build.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Bind and generate one translation unit.
    ///
    /// Names declared by earlier units are visible. A failure is reported to
    /// `sink` and ends the build.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_unit(
        &mut self,
        unit: &Unit<'_>,
        host: &dyn HostEnvironment,
        folder: &dyn ConstFolder,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<UnitId> {
        if self.poisoned {
            return Err(report(sink, CompilationError::internal("module build already failed")));
        }

        let id = UnitId::new(self.units);
        log::debug!("compiling {id}");
        match self.bind_and_generate(unit, host, folder) {
            Ok((generated, warnings)) => {
                for warning in warnings {
                    sink.report(warning);
                }
                self.units += 1;
                self.calls_indirectly |= generated.calls_indirectly;
                log::debug!(
                    "{id}: {} function(s), {} byte(s)",
                    generated.functions.len(),
                    generated.code_bytes
                );
                Ok(id)
            }
            Err(err) => {
                self.poisoned = true;
                Err(report(sink, err))
            }
        }
    }

    fn bind_and_generate(
        &mut self,
        unit: &Unit<'_>,
        host: &dyn HostEnvironment,
        folder: &dyn ConstFolder,
    ) -> Result<(GeneratedUnit, Vec<Diagnostic>)> {
        let bound = Binder::new(&mut self.decls, &mut self.env, host, folder, &self.options).bind_unit(unit)?;
        let generated =
            CodeGenerator::new(&mut self.decls, &mut self.code, &self.options).generate_unit(unit, &bound)?;
        Ok((generated, bound.warnings))
    }

    /// Check that every forward declaration got a body, run the stack
    /// analysis and produce the module.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish(mut self, sink: &mut dyn DiagnosticSink) -> Result<CompiledModule> {
        if self.poisoned {
            return Err(report(sink, CompilationError::internal("module build already failed")));
        }
        self.check_resolved().map_err(|err| report(sink, err))?;

        let analysis = analysis::analyze(&mut self.decls, &self.options).map_err(|err| report(sink, err))?;
        for warning in analysis.warnings {
            sink.report(warning);
        }

        let functions = self.function_table().map_err(|err| report(sink, err))?;
        let mut exports = ModuleExports::default();
        for function in &functions {
            if function.flags.contains(FunctionFlags::LAMBDA) {
                continue;
            }
            exports.push(ExportEntry {
                name: function.name.clone(),
                address: function.address,
                arg_count: function.arg_count,
                stack_usage: function.stack_usage,
                exported: function.flags.contains(FunctionFlags::EXPORTED),
            });
        }

        let globals = self.global_table();
        let data = data_image(&self.decls, self.env.global_size());
        let (code, lines) = self.code.into_parts();
        let stats = CompileStats {
            units: self.units,
            code_size: code.len(),
            data_size: data.len(),
            calls_indirectly: self.calls_indirectly,
            exported: analysis.exported,
            all: analysis.all,
        };
        log::debug!(
            "module: {} unit(s), {} byte(s) of code, {} data cell(s)",
            stats.units,
            stats.code_size,
            stats.data_size
        );

        Ok(CompiledModule {
            code,
            lines,
            data,
            functions,
            exports,
            globals,
            stats,
        })
    }

    fn check_resolved(&self) -> Result<()> {
        for (_, decl) in self.decls.iter() {
            match &decl.kind {
                DeclKind::Forward(_) => {
                    return Err(CompilationError::UnresolvedForward {
                        name: decl.name.clone(),
                        span: decl.span,
                    });
                }
                DeclKind::Function(info) if !info.pending.is_empty() || info.address.is_none() => {
                    return Err(CompilationError::internal(format!(
                        "'{}' was never emitted",
                        decl.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn global_table(&self) -> Vec<GlobalEntry> {
        let base = self.env.global_base();
        let mut globals: Vec<GlobalEntry> = self
            .decls
            .iter()
            .filter_map(|(_, decl)| match &decl.kind {
                DeclKind::Global(info) if info.offset >= base => Some(GlobalEntry {
                    name: decl.name.clone(),
                    global: HostGlobal {
                        offset: info.offset,
                        size: info.size,
                        is_array: info.is_array,
                    },
                }),
                _ => None,
            })
            .collect();
        globals.sort_by_key(|g| g.global.offset);
        globals
    }

    fn function_table(&self) -> Result<Vec<FunctionMeta>> {
        let mut functions = Vec::new();
        for (_, decl) in self.decls.iter() {
            let DeclKind::Function(info) = &decl.kind else {
                continue;
            };
            let address = info
                .address
                .ok_or_else(|| CompilationError::internal(format!("'{}' has no address", decl.name)))?;
            functions.push(FunctionMeta {
                name: decl.name.clone(),
                address,
                arg_count: info.arg_count,
                local_count: info.local_count,
                max_eval_depth: info.max_eval_depth,
                call_depth: info.call_depth,
                stack_usage: info.stack_usage,
                flags: info.flags,
            });
        }
        functions.sort_by_key(|f| f.address);
        Ok(functions)
    }
}

/// Write `err` to the sink and hand it back for propagation.
fn report(sink: &mut dyn DiagnosticSink, err: CompilationError) -> CompilationError {
    sink.report(Diagnostic::from_error(&err));
    err
}

/// Compile a whole module with the default constant folder.
///
/// ```
/// use bumpalo::Bump;
/// use sable_compiler::{CompilerOptions, compile};
/// use sable_core::ast::AstBuilder;
/// use sable_core::{Diagnostics, NoHost, Span};
///
/// let arena = Bump::new();
/// let b = AstBuilder::new(&arena);
/// let at = Span::new(1, 1);
/// let body = vec![b.ret(Some(b.number(42, at)), at)];
/// let unit = b.unit(vec![b.proc_decl(b.ident("main", at), vec![], Some(body), true, at)], at);
///
/// let mut diagnostics = Diagnostics::new();
/// let module = compile(&[unit], &NoHost, CompilerOptions::default(), &mut diagnostics).unwrap();
/// assert_eq!(module.exports.id_of("main"), Some(0));
/// assert!(!diagnostics.has_errors());
/// ```
pub fn compile(
    units: &[Unit<'_>],
    host: &dyn HostEnvironment,
    options: CompilerOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<CompiledModule> {
    let mut builder = ModuleBuilder::new(options);
    for unit in units {
        builder.compile_unit(unit, host, &ArithmeticFolder, sink)?;
    }
    builder.finish(sink)
}
