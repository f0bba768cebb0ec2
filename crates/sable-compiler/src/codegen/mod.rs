//! Code generation.
//!
//! The [`CodeGenerator`] walks a bound unit and appends its functions to the
//! module-wide code buffer:
//! - Each procedure with a body, in source order
//! - Then every promoted lambda, in queue order
//!
//! Expressions are generated under a [`GenContext`] that says whether the
//! value is needed. Every expression leaves exactly one cell on the
//! evaluation stack in value context and none in discard context, so join
//! points can restore the depth they started from. Conditions are generated
//! separately as jumps (see `logical`), never as materialized booleans
//! unless a value is asked for.
//!
//! Calls to functions that have no address yet are queued on the callee's
//! patch chain and written when its body is emitted.

mod calls;
mod control;
mod data;
mod expr;
mod logical;
mod loops;

pub use data::data_image;

use sable_core::ast::{DeclCell, Expr, UnaryOp, Unit};
use sable_core::{CompilationError, DeclId, Span};

use crate::binder::BoundUnit;
use crate::bytecode::{CodeBuffer, OpCode};
use crate::decl::{DeclArena, DeclKind, FunctionFlags, FunctionInfo};
use crate::emit::Emitter;
use crate::options::CompilerOptions;

type Result<T> = std::result::Result<T, CompilationError>;

// ============================================================================
// Context and results
// ============================================================================

/// How the value of an expression is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenContext {
    /// The value is not consumed.
    pub discard: bool,
}

impl GenContext {
    /// The value is pushed.
    pub const VALUE: GenContext = GenContext { discard: false };
    /// The value is dropped.
    pub const DISCARD: GenContext = GenContext { discard: true };

    /// Cells this context leaves on the stack.
    fn produced(self) -> u32 {
        if self.discard { 0 } else { 1 }
    }
}

/// Result descriptor of a generated expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprResult {
    /// Every path through the expression ends in `return`.
    pub tail_return: bool,
}

impl ExprResult {
    const VALUE: ExprResult = ExprResult { tail_return: false };
    const RETURNED: ExprResult = ExprResult { tail_return: true };
}

/// Summary of one generated unit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Functions emitted, in emission order.
    pub functions: Vec<DeclId>,
    /// Some function calls through a function value.
    pub calls_indirectly: bool,
    /// Bytes appended to the code buffer.
    pub code_bytes: usize,
}

// ============================================================================
// Generator
// ============================================================================

/// Generates bytecode for bound units.
pub struct CodeGenerator<'a> {
    decls: &'a mut DeclArena,
    emitter: Emitter<'a>,

    /// Direct callees of the function being generated
    callees: Vec<DeclId>,
    /// The function being generated calls through a function value
    calls_indirectly: bool,
}

impl<'a> CodeGenerator<'a> {
    /// Create a generator appending to `code`.
    pub fn new(decls: &'a mut DeclArena, code: &'a mut CodeBuffer, options: &CompilerOptions) -> Self {
        Self {
            decls,
            emitter: Emitter::new(code, options.code_limit()),
            callees: Vec::new(),
            calls_indirectly: false,
        }
    }

    /// Emit every function of a bound unit.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn generate_unit<'ast>(
        &mut self,
        unit: &Unit<'ast>,
        bound: &BoundUnit<'ast>,
    ) -> Result<GeneratedUnit> {
        let start = self.emitter.code_size();
        let mut generated = GeneratedUnit::default();

        for proc in unit.procs() {
            let Some(body) = proc.body else { continue };
            let id = self.bound(&proc.decl, proc.span)?;
            self.gen_function(id, body, proc.span)?;
            generated.functions.push(id);
            generated.calls_indirectly |= self.calls_indirectly;
        }

        // Lambda bodies follow every ordinary function.
        for lambda in &bound.lambdas {
            let id = self.bound(&lambda.decl, lambda.span)?;
            self.gen_function(id, lambda.body, lambda.span)?;
            generated.functions.push(id);
            generated.calls_indirectly |= self.calls_indirectly;
        }

        generated.code_bytes = self.emitter.code_size() - start;
        log::debug!(
            "generated {} function(s), {} byte(s)",
            generated.functions.len(),
            generated.code_bytes
        );
        Ok(generated)
    }

    /// Emit one function body.
    ///
    /// ```text
    /// entry:  ENTER locals
    ///         [body, discarded]
    ///         PUSH_ZERO        ; unless the body ends in `return`
    ///         RETURN
    /// ```
    fn gen_function(&mut self, id: DeclId, body: &[Expr<'_>], span: Span) -> Result<()> {
        self.emitter.begin_function();
        self.emitter.set_line(span.line);
        self.callees.clear();
        self.calls_indirectly = false;

        let address = self.emitter.label()?;
        let info = self.function_mut(id)?;
        info.address = Some(address);
        let locals = info.local_count;
        let mut pending = std::mem::take(&mut info.pending);
        self.emitter.resolve(&mut pending, address)?;
        log::trace!("'{}' at {:04x}", self.decls.expect(id)?.name, address);

        let locals = u8::try_from(locals)
            .map_err(|_| CompilationError::internal(format!("{locals} locals do not fit a frame")))?;
        self.emitter.emit_byte(OpCode::Enter, locals);

        let result = self.gen_body(body, GenContext::DISCARD)?;
        if !result.tail_return {
            self.emitter.emit(OpCode::PushZero);
            self.emitter.emit(OpCode::Return);
        }
        self.emitter.check_size()?;

        let max_depth = self.emitter.max_depth();
        let callees = std::mem::take(&mut self.callees);
        let indirect = self.calls_indirectly;
        let info = self.function_mut(id)?;
        info.max_eval_depth = max_depth;
        for callee in callees {
            info.add_callee(callee);
        }
        info.flags.set(FunctionFlags::CALLS_INDIRECTLY, indirect);
        Ok(())
    }

    // ==========================================================================
    // Dispatch
    // ==========================================================================

    /// Generate a body: every expression but the last is discarded.
    fn gen_body(&mut self, body: &[Expr<'_>], ctx: GenContext) -> Result<ExprResult> {
        let Some((last, init)) = body.split_last() else {
            if !ctx.discard {
                self.emitter.emit(OpCode::PushZero);
            }
            return Ok(ExprResult::VALUE);
        };
        for expr in init {
            self.gen_expr(expr, GenContext::DISCARD)?;
        }
        self.gen_expr(last, ctx)
    }

    fn gen_expr(&mut self, expr: &Expr<'_>, ctx: GenContext) -> Result<ExprResult> {
        self.emitter.set_line(expr.span().line);

        match *expr {
            Expr::Number(n) => self.gen_number(n.value, n.span, ctx),
            Expr::Name(name) => self.gen_name(&name.decl, name.span(), ctx),
            Expr::CallOrSymbol(name) => self.gen_call_or_symbol(name, ctx),
            Expr::Unary(unary) if unary.op == UnaryOp::Not => self.gen_logical_value(expr, ctx),
            Expr::Binary(binary) if binary.op.is_logical() => self.gen_logical_value(expr, ctx),
            Expr::Unary(unary) => self.gen_unary(unary, ctx),
            Expr::Binary(binary) => self.gen_binary(binary, ctx),
            Expr::Assign(assign) => self.gen_assign(assign, ctx),
            Expr::Index(index) => self.gen_index(index, ctx),
            Expr::AddressOf(address) => self.gen_address_of(address, ctx),
            Expr::Call(call) => self.gen_call(call, ctx),
            Expr::Cond(cond) => self.gen_cond(cond, ctx),
            Expr::Case(case) => self.gen_case(case, ctx),
            Expr::Let(block) => self.gen_let(block, ctx),
            Expr::For(for_expr) => self.gen_for(for_expr, ctx),
            Expr::Loop(loop_expr) => self.gen_loop(loop_expr.body, ctx),
            Expr::While(while_expr) => self.gen_while(while_expr, ctx),
            Expr::Break(_) => self.gen_loop_exit(true, ctx),
            Expr::Next(_) => self.gen_loop_exit(false, ctx),
            Expr::Return(ret) => self.gen_return(ret.value, ctx),
            Expr::Lambda(lambda) => {
                if !ctx.discard {
                    let id = self.bound(&lambda.decl, lambda.span)?;
                    self.emit_function_address(id)?;
                }
                Ok(ExprResult::VALUE)
            }
            Expr::InitList(list) => Err(CompilationError::Unsupported {
                feature: "initializer list outside a data declaration".to_string(),
                span: list.span,
            }),
        }
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    /// The declaration attached to a node by the binder.
    fn bound(&self, cell: &DeclCell, span: Span) -> Result<DeclId> {
        cell.get()
            .ok_or_else(|| CompilationError::internal(format!("unbound node at {span}")))
    }

    fn kind(&self, id: DeclId) -> Result<&DeclKind> {
        Ok(&self.decls.expect(id)?.kind)
    }

    fn function_mut(&mut self, id: DeclId) -> Result<&mut FunctionInfo> {
        self.decls
            .function_mut(id)
            .ok_or_else(|| CompilationError::internal(format!("declaration {id} is not a function")))
    }

    /// Push the entry address of a bytecode function, queuing the operand
    /// if the body has not been emitted yet.
    fn emit_function_address(&mut self, id: DeclId) -> Result<()> {
        let address = self.function_mut(id)?.address;
        let site = self.emitter.emit_address(address);
        if address.is_none() {
            self.function_mut(id)?.pending.push(site);
        }
        Ok(())
    }
}
