//! Loops and loop exits.
//!
//! Each loop registers a context with the emitter before its body; `break`
//! and `next` inside the body add to that context's chains, and the loop
//! resolves them once the exit and the next-iteration point are emitted.
//! A loop used as a value yields 0.

use sable_core::ast::{Expr, ForDirection, ForExpr, WhileExpr};
use sable_core::CompilationError;

use super::{CodeGenerator, ExprResult, GenContext, Result};
use crate::bytecode::{OpCode, PatchChain};
use crate::emit::LoopContext;

impl<'a> CodeGenerator<'a> {
    /// Counted loop with an inclusive bound.
    ///
    /// ```text
    ///         [from] STORE_LOCAL i
    ///         [to] STORE_LOCAL b       ; only for a computed bound
    /// top:    LOAD_LOCAL i
    ///         [bound]
    ///         GT (LT for downto)
    ///         JUMP_IF_TRUE exit
    ///         [body, discarded]
    /// next:   LOAD_LOCAL i [step] ADD (SUB) STORE_LOCAL i
    ///         JUMP top
    /// exit:
    /// ```
    ///
    /// The counter steps with wrapping arithmetic, so a bound within one step
    /// of the end of the cell range is never passed and the loop does not
    /// end. Constant bounds like that get a warning while binding.
    pub(super) fn gen_for(&mut self, for_expr: &ForExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        let index = self.local_slot(&for_expr.decl, for_expr.span)?;

        self.gen_expr(for_expr.from, GenContext::VALUE)?;
        self.emitter.emit_byte(OpCode::StoreLocal, index);

        let bound = match for_expr.bound_slot.get() {
            Some(_) => {
                let slot = self.local_slot(&for_expr.bound_slot, for_expr.span)?;
                self.gen_expr(for_expr.to, GenContext::VALUE)?;
                self.emitter.emit_byte(OpCode::StoreLocal, slot);
                Some(slot)
            }
            None => None,
        };

        let (past_bound, advance) = match for_expr.direction {
            ForDirection::Up => (OpCode::Gt, OpCode::Add),
            ForDirection::Down => (OpCode::Lt, OpCode::Sub),
        };

        let top = self.emitter.label()?;
        let mut exit = PatchChain::new();
        self.emitter.emit_byte(OpCode::LoadLocal, index);
        match bound {
            Some(slot) => self.emitter.emit_byte(OpCode::LoadLocal, slot),
            None => {
                self.gen_expr(for_expr.to, GenContext::VALUE)?;
            }
        }
        self.emitter.emit(past_bound);
        self.emitter.emit_jump(OpCode::JumpIfTrue, &mut exit);

        let mut body = self.gen_loop_body(for_expr.body, start)?;

        self.emitter.bind_here(&mut body.next_chain)?;
        self.emitter.emit_byte(OpCode::LoadLocal, index);
        self.emitter.emit_int(for_expr.step_value.get());
        self.emitter.emit(advance);
        self.emitter.emit_byte(OpCode::StoreLocal, index);
        self.emitter.emit_jump_to(OpCode::Jump, top);

        self.finish_loop(start, &mut exit, body, ctx)
    }

    /// Unconditional loop; only `break` or `return` leave it.
    ///
    /// ```text
    /// top:    [body, discarded]
    ///         JUMP top
    /// ```
    pub(super) fn gen_loop(&mut self, body: &[Expr<'_>], ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        let top = self.emitter.label()?;

        let mut body = self.gen_loop_body(body, start)?;
        self.emitter.resolve(&mut body.next_chain, top)?;
        self.emitter.emit_jump_to(OpCode::Jump, top);

        self.finish_loop(start, &mut PatchChain::new(), body, ctx)
    }

    /// `while test do body` and `do body while test`.
    ///
    /// ```text
    /// top:    [test, jump when false -> exit]     top:    [body, discarded]
    ///         [body, discarded]                   next:   [test, jump when true -> top]
    ///         JUMP top
    /// exit:                                       exit:
    /// ```
    pub(super) fn gen_while(&mut self, while_expr: &WhileExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        let top = self.emitter.label()?;
        let mut exit = PatchChain::new();

        let body = if while_expr.post_test {
            let mut body = self.gen_loop_body(while_expr.body, start)?;
            self.emitter.bind_here(&mut body.next_chain)?;
            let mut back = PatchChain::new();
            self.gen_branch(while_expr.test, true, &mut back)?;
            self.emitter.resolve(&mut back, top)?;
            body
        } else {
            self.gen_branch(while_expr.test, false, &mut exit)?;
            let mut body = self.gen_loop_body(while_expr.body, start)?;
            self.emitter.resolve(&mut body.next_chain, top)?;
            self.emitter.emit_jump_to(OpCode::Jump, top);
            body
        };

        self.finish_loop(start, &mut exit, body, ctx)
    }

    /// `break` or `next`.
    pub(super) fn gen_loop_exit(&mut self, is_break: bool, ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        self.emitter.emit_loop_exit(is_break)?;
        self.emitter.set_depth(start + ctx.produced());
        Ok(ExprResult::VALUE)
    }

    /// Generate a loop body inside a fresh loop context and hand back the
    /// pending `break`/`next` jumps.
    fn gen_loop_body(&mut self, body: &[Expr<'_>], depth: u32) -> Result<LoopContext> {
        self.emitter.loops().enter(depth);
        let result = self.gen_body(body, GenContext::DISCARD);
        let context = self
            .emitter
            .loops()
            .exit()
            .ok_or_else(|| CompilationError::internal("loop context vanished"))?;
        result?;
        self.emitter.set_depth(depth);
        Ok(context)
    }

    /// Bind the exit point and produce the loop's value.
    fn finish_loop(
        &mut self,
        start: u32,
        exit: &mut PatchChain,
        mut body: LoopContext,
        ctx: GenContext,
    ) -> Result<ExprResult> {
        self.emitter.set_depth(start);
        self.emitter.bind_here(exit)?;
        self.emitter.bind_here(&mut body.break_chain)?;
        if !ctx.discard {
            self.emitter.emit(OpCode::PushZero);
        }
        Ok(ExprResult::VALUE)
    }
}
