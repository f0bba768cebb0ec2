//! Calls.
//!
//! A callee that names a function is called directly:
//! - Bytecode functions of this module through `CALL`, whose target is
//!   queued on the callee's patch chain until its body is emitted
//! - Bytecode functions of other modules through `CALL_EXTERNAL`
//! - Host functions through `CALL_NATIVE`
//!
//! Any other callee is evaluated to a function value and called through
//! `FUNCALL`, which the analyzer cannot bound.

use sable_core::ast::{CallExpr, Expr, NameExpr};
use sable_core::{CompilationError, DeclId};

use super::{CodeGenerator, ExprResult, GenContext, Result};
use crate::bytecode::{OpCode, UNRESOLVED};
use crate::decl::DeclKind;

/// Argument count operand limit.
const MAX_CALL_ARGS: usize = u8::MAX as usize;

impl<'a> CodeGenerator<'a> {
    /// ```text
    /// [arg 1] .. [arg n]
    /// CALL addr n | CALL_EXTERNAL id n | CALL_NATIVE id n
    ///
    /// [arg 1] .. [arg n] [callee]
    /// FUNCALL n
    /// ```
    pub(super) fn gen_call(&mut self, call: &CallExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let argc = u8::try_from(call.args.len()).map_err(|_| CompilationError::TooManyArguments {
            name: callee_name(call.callee),
            count: call.args.len(),
            limit: MAX_CALL_ARGS,
            span: call.span,
        })?;

        for arg in call.args {
            self.gen_expr(arg, GenContext::VALUE)?;
        }

        let direct = match call.callee {
            Expr::Name(name) => {
                let id = self.bound(&name.decl, name.span())?;
                self.emit_direct_call(id, argc)?
            }
            _ => false,
        };
        if !direct {
            self.gen_expr(call.callee, GenContext::VALUE)?;
            self.emitter.emit_funcall(argc);
            self.calls_indirectly = true;
        }

        if ctx.discard {
            self.emitter.emit(OpCode::Pop);
        }
        Ok(ExprResult::VALUE)
    }

    /// A bare name that may be a zero-argument call.
    pub(super) fn gen_call_or_symbol(&mut self, name: &NameExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let id = self.bound(&name.decl, name.span())?;
        if !self.kind(id)?.is_callable() {
            return self.gen_name(&name.decl, name.span(), ctx);
        }
        self.emit_direct_call(id, 0)?;
        if ctx.discard {
            self.emitter.emit(OpCode::Pop);
        }
        Ok(ExprResult::VALUE)
    }

    /// Emit a direct call to `id` with its arguments already pushed.
    /// Returns `false` when `id` is not a function.
    fn emit_direct_call(&mut self, id: DeclId, argc: u8) -> Result<bool> {
        let (op, target) = match self.kind(id)? {
            DeclKind::Function(info) | DeclKind::Forward(info) => (OpCode::Call, info.address),
            DeclKind::External(host) => (OpCode::CallExternal, Some(host.id)),
            DeclKind::Native(host) => (OpCode::CallNative, Some(host.id)),
            _ => return Ok(false),
        };

        let site = self.emitter.emit_call(op, target.unwrap_or(UNRESOLVED), argc);
        if target.is_none() {
            self.function_mut(id)?.pending.push(site);
        }
        self.callees.push(id);
        Ok(true)
    }
}

fn callee_name(callee: &Expr<'_>) -> String {
    match callee {
        Expr::Name(name) => name.name().to_string(),
        _ => "function value".to_string(),
    }
}
