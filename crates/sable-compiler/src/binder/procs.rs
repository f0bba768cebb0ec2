//! Procedure declarations and function bodies.

use sable_core::ast::{Expr, Param, ProcDecl};
use sable_core::{CompilationError, DeclId, Span};

use super::Binder;
use crate::decl::{DeclKind, FunctionFlags, FunctionInfo};

impl<'b, 'ast> Binder<'b, 'ast> {
    pub(super) fn bind_proc(&mut self, proc: &'ast ProcDecl<'ast>) -> Result<(), CompilationError> {
        let name = proc.name.name;
        self.check_params(name, proc.params, proc.span)?;

        let id = self.declare_function(proc)?;
        proc.decl.set(id);

        if let Some(body) = proc.body {
            log::trace!("binding '{}'", name);
            self.bind_function_body(id, name, proc.params, body, proc.span)?;
        }
        Ok(())
    }

    pub(super) fn check_params(
        &self,
        name: &str,
        params: &[Param<'_>],
        span: Span,
    ) -> Result<(), CompilationError> {
        let limit = self.options.argument_limit();
        if params.len() > limit {
            return Err(CompilationError::TooManyArguments {
                name: name.to_string(),
                count: params.len(),
                limit,
                span,
            });
        }
        if let Some(typed) = params.iter().find(|p| p.ty.is_some()) {
            return Err(CompilationError::Unsupported {
                feature: "typed parameters".to_string(),
                span: typed.span,
            });
        }
        Ok(())
    }

    /// Create the function declaration, or complete an earlier forward one.
    fn declare_function(&mut self, proc: &ProcDecl<'_>) -> Result<DeclId, CompilationError> {
        let name = proc.name.name;
        let arg_count = proc.params.len();

        let Some(id) = self.env.module_symbol(name) else {
            let mut info = FunctionInfo::new(arg_count);
            info.flags.set(FunctionFlags::EXPORTED, proc.exported);
            let kind = if proc.is_forward() {
                DeclKind::Forward(info)
            } else {
                DeclKind::Function(info)
            };
            let id = self.decls.alloc(name, proc.name.span, kind);
            self.env.define_global(name, id);
            return Ok(id);
        };

        let redefinition = || CompilationError::Redefinition {
            name: name.to_string(),
            span: proc.name.span,
        };
        match &mut self.decls.expect_mut(id)?.kind {
            DeclKind::Forward(info) => {
                if info.arg_count != arg_count {
                    return Err(CompilationError::ForwardMismatch {
                        name: name.to_string(),
                        expected: info.arg_count,
                        got: arg_count,
                        span: proc.span,
                    });
                }
                if proc.exported {
                    info.flags |= FunctionFlags::EXPORTED;
                }
            }
            _ => return Err(redefinition()),
        }

        if !proc.is_forward() {
            log::trace!("forward declaration of '{}' completed", name);
            self.decls.upgrade_forward(id)?;
        }
        Ok(id)
    }

    /// Bind parameters and body in a fresh function scope and record the
    /// local high-water mark.
    pub(super) fn bind_function_body(
        &mut self,
        id: DeclId,
        name: &str,
        params: &'ast [Param<'ast>],
        body: &'ast [Expr<'ast>],
        span: Span,
    ) -> Result<(), CompilationError> {
        self.env.begin_function();
        self.loop_depth = 0;

        let result = self.in_scope(|b| {
            for (index, param) in params.iter().enumerate() {
                if b.env.in_current_scope(param.name.name).is_some() {
                    return Err(CompilationError::Redefinition {
                        name: param.name.name.to_string(),
                        span: param.span,
                    });
                }
                let arg = b
                    .decls
                    .alloc(param.name.name, param.span, DeclKind::Argument(index as u32));
                b.env.declare(param.name.name, arg)?;
                param.decl.set(arg);
            }
            b.bind_body(body)
        });
        let locals = self.env.end_function() as usize;
        result?;

        let limit = self.options.local_limit();
        if locals > limit {
            return Err(CompilationError::TooManyLocals {
                name: name.to_string(),
                count: locals,
                limit,
                span,
            });
        }

        let info = self
            .decls
            .function_mut(id)
            .ok_or_else(|| CompilationError::internal(format!("'{name}' lost its function record")))?;
        info.local_count = locals;
        Ok(())
    }
}
