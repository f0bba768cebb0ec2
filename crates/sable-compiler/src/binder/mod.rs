//! Name binding.
//!
//! The [`Binder`] walks one translation unit, validates declarations and
//! attaches a [`DeclId`] to every name reference and declaration site.
//! It also assigns storage: global offsets, argument indices and local
//! slots (reused across sibling scopes).
//!
//! Anonymous functions are not bound where they appear. They are queued
//! and, once the unit's items are done, promoted to synthetic top-level
//! functions named `lambda#<n>` and bound like any other function body.

mod data;
mod exprs;
mod procs;

use sable_core::ast::{Expr, Ident, Item, LambdaExpr, Unit};
use sable_core::{
    CompilationError, ConstFolder, ConstLookup, DeclId, Diagnostic, HostEnvironment, Severity, Span,
};

use crate::decl::{DeclArena, DeclKind, FunctionFlags, FunctionInfo, GlobalInfo};
use crate::options::CompilerOptions;
use crate::scope::SymbolEnv;

/// What the generator needs besides the bound tree.
#[derive(Debug, Default)]
pub struct BoundUnit<'ast> {
    /// Promoted lambdas in queue order.
    pub lambdas: Vec<&'ast LambdaExpr<'ast>>,
    /// Suspicious but valid constructs.
    pub warnings: Vec<Diagnostic>,
}

/// Binds one translation unit against the module's tables.
pub struct Binder<'b, 'ast> {
    decls: &'b mut DeclArena,
    env: &'b mut SymbolEnv,
    host: &'b dyn HostEnvironment,
    folder: &'b dyn ConstFolder,
    options: &'b CompilerOptions,
    lambdas: Vec<&'ast LambdaExpr<'ast>>,
    warnings: Vec<Diagnostic>,
    loop_depth: usize,
}

impl<'b, 'ast> Binder<'b, 'ast> {
    /// Create a binder over the module's declaration arena and tables.
    pub fn new(
        decls: &'b mut DeclArena,
        env: &'b mut SymbolEnv,
        host: &'b dyn HostEnvironment,
        folder: &'b dyn ConstFolder,
        options: &'b CompilerOptions,
    ) -> Self {
        Self {
            decls,
            env,
            host,
            folder,
            options,
            lambdas: Vec::new(),
            warnings: Vec::new(),
            loop_depth: 0,
        }
    }

    /// Bind every item of `unit`, then the lambdas it contains.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn bind_unit(mut self, unit: &Unit<'ast>) -> Result<BoundUnit<'ast>, CompilationError> {
        log::debug!("binding unit with {} item(s)", unit.items().len());

        let reserved = self.host.reserved_globals();
        self.env
            .reserve_host_globals(reserved)
            .map_err(|module_base| CompilationError::GlobalOverlap {
                host_end: u64::from(reserved),
                module_base,
                span: unit.span(),
            })?;

        for item in unit.items() {
            match item {
                Item::Data(data) => self.bind_data(data)?,
                Item::Proc(proc) => self.bind_proc(proc)?,
            }
        }
        self.promote_lambdas()?;

        Ok(BoundUnit {
            lambdas: self.lambdas,
            warnings: self.warnings,
        })
    }

    fn promote_lambdas(&mut self) -> Result<(), CompilationError> {
        // Lambda bodies may queue further lambdas.
        let mut next = 0;
        while let Some(&lambda) = self.lambdas.get(next) {
            next += 1;

            let name = self.env.next_lambda_name();
            self.check_params(&name, lambda.params, lambda.span)?;

            let mut info = FunctionInfo::new(lambda.params.len());
            info.flags |= FunctionFlags::LAMBDA;
            let id = self.decls.alloc(&name, lambda.span, DeclKind::Function(info));
            self.env.define_global(&name, id);
            lambda.decl.set(id);
            log::trace!("lambda at {} promoted to '{}'", lambda.span, name);

            self.bind_function_body(id, &name, lambda.params, lambda.body, lambda.span)?;
        }
        Ok(())
    }

    // ==========================================================================
    // Scopes
    // ==========================================================================

    /// Run `f` inside a fresh local scope.
    ///
    /// The scope and its slots are released whether `f` succeeds or not.
    fn in_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompilationError>,
    ) -> Result<T, CompilationError> {
        self.env.push_scope();
        let result = f(self);
        self.env.pop_scope();
        result
    }

    fn in_loop<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompilationError>,
    ) -> Result<T, CompilationError> {
        self.loop_depth += 1;
        let result = f(self);
        self.loop_depth -= 1;
        result
    }

    /// Declare a named local in the innermost scope.
    fn declare_local(&mut self, name: Ident<'ast>) -> Result<DeclId, CompilationError> {
        if self.env.in_current_scope(name.name).is_some() {
            return Err(CompilationError::Redefinition {
                name: name.name.to_string(),
                span: name.span,
            });
        }
        let slot = self.env.allocate_slot();
        let id = self.decls.alloc(name.name, name.span, DeclKind::Local(slot));
        self.env.declare(name.name, id)?;
        Ok(id)
    }

    /// Reserve an unnamed local slot for a value the generator evaluates once.
    fn synthetic_local(&mut self, span: Span) -> DeclId {
        let slot = self.env.allocate_slot();
        self.decls.alloc("", span, DeclKind::Local(slot))
    }

    // ==========================================================================
    // Resolution
    // ==========================================================================

    /// Resolve a name through the scopes, the module tables and finally the
    /// host. Host answers are cached so each name is asked for once.
    fn resolve(&mut self, name: &str, span: Span) -> Result<DeclId, CompilationError> {
        if let Some(found) = self.env.lookup(name) {
            return Ok(found.id());
        }

        if let Some(function) = self.host.resolve_function(name) {
            let kind = if function.is_native() {
                DeclKind::Native(function)
            } else {
                if i32::from(function.id) >= crate::bytecode::EXTERNAL_FUNCTION_BIT {
                    return Err(CompilationError::ValueOutOfRange {
                        value: i64::from(function.id),
                        span,
                    });
                }
                DeclKind::External(function)
            };
            log::trace!("'{}' resolved by host as {}", name, kind.describe());
            let id = self.decls.alloc(name, span, kind);
            self.env.define_external(name, id);
            return Ok(id);
        }

        if let Some(global) = self.host.resolve_global(name) {
            if global.end() > u64::from(u16::MAX) + 1 {
                return Err(CompilationError::ValueOutOfRange {
                    value: global.end() as i64,
                    span,
                });
            }
            if global.end() > u64::from(self.env.global_base()) {
                return Err(CompilationError::GlobalOverlap {
                    host_end: global.end(),
                    module_base: self.env.global_base(),
                    span,
                });
            }
            let kind = DeclKind::Global(GlobalInfo {
                offset: global.offset,
                size: global.size,
                init: Vec::new(),
                is_array: global.is_array,
            });
            log::trace!("'{}' resolved by host at cell {}", name, global.offset);
            let id = self.decls.alloc(name, span, kind);
            self.env.define_external(name, id);
            return Ok(id);
        }

        Err(CompilationError::UndefinedSymbol {
            name: name.to_string(),
            span,
        })
    }

    fn kind_of(&self, id: DeclId) -> Result<&DeclKind, CompilationError> {
        Ok(&self.decls.expect(id)?.kind)
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Fold `expr` to a constant.
    fn fold(&self, expr: &Expr<'_>) -> Result<i64, CompilationError> {
        let names = ScopeConstants {
            env: &*self.env,
            decls: &*self.decls,
        };
        self.folder
            .fold(expr, &names)
            .ok_or(CompilationError::NotConstant { span: expr.span() })
    }

    /// Fold `expr` to a value that fits a cell.
    fn fold_cell(&self, expr: &Expr<'_>) -> Result<i32, CompilationError> {
        let value = self.fold(expr)?;
        i32::try_from(value).map_err(|_| CompilationError::ValueOutOfRange {
            value,
            span: expr.span(),
        })
    }
}

/// Constant view of the current scopes, handed to the folder.
struct ScopeConstants<'s> {
    env: &'s SymbolEnv,
    decls: &'s DeclArena,
}

impl ConstLookup for ScopeConstants<'_> {
    fn constant(&self, name: &str) -> Option<i64> {
        let id = self.env.lookup(name)?.id();
        match self.decls.get(id)?.kind {
            DeclKind::Constant(value) => Some(i64::from(value)),
            _ => None,
        }
    }
}
