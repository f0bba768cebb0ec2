//! Conditions compiled as jumps.
//!
//! `and`, `or` and `not` never materialize intermediate booleans. A
//! condition is generated against a patch chain and a polarity: jump to the
//! chain when the condition has that truth value, fall through otherwise.
//! `not` flips the polarity, so negated contexts reuse the same shapes.

use sable_core::ast::{BinaryOp, Expr, UnaryOp};
use sable_core::CompilationError;

use super::expr::comparison_opcode;
use super::{CodeGenerator, ExprResult, GenContext, Result};
use crate::bytecode::{OpCode, PatchChain};

/// Operand truth value that decides a short-circuit operator without
/// evaluating its right side.
fn decided_by(op: BinaryOp) -> Option<bool> {
    match op {
        BinaryOp::And => Some(false),
        BinaryOp::Or => Some(true),
        _ => None,
    }
}

fn conditional_jump(jump_when: bool) -> OpCode {
    if jump_when {
        OpCode::JumpIfTrue
    } else {
        OpCode::JumpIfFalse
    }
}

impl<'a> CodeGenerator<'a> {
    /// Generate `expr` as a condition that jumps to `chain` when its truth
    /// value equals `jump_when`. The stack depth is unchanged on both paths.
    ///
    /// ```text
    /// a and b, jump when false:     a and b, jump when true:
    ///     [a] JUMP_IF_FALSE chain       [a] JUMP_IF_FALSE skip
    ///     [b] JUMP_IF_FALSE chain       [b] JUMP_IF_TRUE chain
    ///                               skip:
    /// ```
    pub(super) fn gen_branch(&mut self, expr: &Expr<'_>, jump_when: bool, chain: &mut PatchChain) -> Result<()> {
        self.emitter.set_line(expr.span().line);

        if let Some(value) = self.constant_value(expr) {
            if (value != 0) == jump_when {
                self.emitter.emit_jump(OpCode::Jump, chain);
            }
            return Ok(());
        }

        match *expr {
            Expr::Unary(unary) if unary.op == UnaryOp::Not => self.gen_branch(unary.operand, !jump_when, chain),
            Expr::Binary(binary) if binary.op.is_logical() => {
                let decided = decided_by(binary.op)
                    .ok_or_else(|| CompilationError::internal("logical operator without a strategy"))?;
                if jump_when == decided {
                    // Either operand alone takes the jump.
                    self.gen_branch(binary.left, jump_when, chain)?;
                    self.gen_branch(binary.right, jump_when, chain)
                } else {
                    let mut skip = PatchChain::new();
                    self.gen_branch(binary.left, decided, &mut skip)?;
                    self.gen_branch(binary.right, jump_when, chain)?;
                    self.emitter.bind_here(&mut skip)
                }
            }
            Expr::Binary(binary) if binary.op.is_comparison() => {
                self.check_comparison_operands(binary)?;
                let op = comparison_opcode(binary.op)
                    .ok_or_else(|| CompilationError::internal("comparison without an opcode"))?;
                self.gen_expr(binary.left, GenContext::VALUE)?;
                self.gen_expr(binary.right, GenContext::VALUE)?;
                self.emitter.emit(op);
                self.emitter.emit_jump(conditional_jump(jump_when), chain);
                Ok(())
            }
            _ => {
                self.gen_expr(expr, GenContext::VALUE)?;
                self.emitter.emit_jump(conditional_jump(jump_when), chain);
                Ok(())
            }
        }
    }

    /// A condition used as a value: 1 or 0.
    ///
    /// ```text
    ///         [condition, jump when false -> no]
    ///         PUSH_ONE
    ///         JUMP end
    /// no:     PUSH_ZERO
    /// end:
    /// ```
    pub(super) fn gen_logical_value(&mut self, expr: &Expr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let mut no = PatchChain::new();
        self.gen_branch(expr, false, &mut no)?;

        if ctx.discard {
            // Only the side effects of the evaluated operands remain.
            self.emitter.bind_here(&mut no)?;
            return Ok(ExprResult::VALUE);
        }

        let start = self.emitter.depth();
        let mut end = PatchChain::new();
        self.emitter.emit(OpCode::PushOne);
        self.emitter.emit_jump(OpCode::Jump, &mut end);
        self.emitter.set_depth(start);
        self.emitter.bind_here(&mut no)?;
        self.emitter.emit(OpCode::PushZero);
        self.emitter.bind_here(&mut end)?;
        Ok(ExprResult::VALUE)
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use sable_core::ast::{AstBuilder, BinaryOp, UnaryOp};
    use sable_core::CompilationError;

    use crate::bytecode::OpCode;
    use crate::codegen::tests::{AT, Harness, func};

    #[test]
    fn and_as_value() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let test = b.binary(b.name("a", AT), BinaryOp::And, b.name("b", AT), AT);
        let unit = b.unit(vec![func(&b, "f", &["a", "b"], vec![b.ret(Some(test), AT)])], AT);

        let mut h = Harness::default();
        h.compile(&unit).unwrap();
        assert_eq!(
            h.ops("f"),
            vec![
                OpCode::Enter,
                OpCode::LoadArg,
                OpCode::JumpIfFalse,
                OpCode::LoadArg,
                OpCode::JumpIfFalse,
                OpCode::PushOne,
                OpCode::Jump,
                OpCode::PushZero,
                OpCode::Return,
            ]
        );
        assert_eq!(h.function("f").max_eval_depth, 1);
    }

    #[test]
    fn or_skips_right_operand_when_left_holds() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let test = b.binary(b.name("a", AT), BinaryOp::Or, b.name("b", AT), AT);
        let unit = b.unit(vec![func(&b, "f", &["a", "b"], vec![b.ret(Some(test), AT)])], AT);

        let mut h = Harness::default();
        h.compile(&unit).unwrap();
        // a true -> skip past the test of b straight to PUSH_ONE
        assert_eq!(
            h.ops("f"),
            vec![
                OpCode::Enter,
                OpCode::LoadArg,
                OpCode::JumpIfTrue,
                OpCode::LoadArg,
                OpCode::JumpIfFalse,
                OpCode::PushOne,
                OpCode::Jump,
                OpCode::PushZero,
                OpCode::Return,
            ]
        );
        let skip_target = h.code.read_u16(5).unwrap();
        assert_eq!(h.code.read_op(usize::from(skip_target)), Some(OpCode::PushOne));
    }

    #[test]
    fn not_flips_polarity_without_an_opcode() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let cmp = b.binary(b.name("x", AT), BinaryOp::Lt, b.number(3, AT), AT);
        let test = b.unary(UnaryOp::Not, cmp, AT);
        let unit = b.unit(vec![func(&b, "f", &["x"], vec![b.ret(Some(test), AT)])], AT);

        let mut h = Harness::default();
        h.compile(&unit).unwrap();
        let ops = h.ops("f");
        assert!(!ops.contains(&OpCode::Not));
        assert_eq!(&ops[1..5], &[OpCode::LoadArg, OpCode::PushByte, OpCode::Lt, OpCode::JumpIfTrue]);
    }

    #[test]
    fn constant_false_never_reaches_right_operand() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let test = b.binary(b.number(0, AT), BinaryOp::And, b.call_named("g", vec![], AT), AT);
        let unit = b.unit(
            vec![
                func(&b, "g", &[], vec![]),
                func(&b, "f", &[], vec![b.ret(Some(test), AT)]),
            ],
            AT,
        );

        let mut h = Harness::default();
        h.compile(&unit).unwrap();
        // ENTER 0 ; JUMP no ; CALL g (dead) ...
        let f = usize::from(h.function("f").address.unwrap());
        assert_eq!(h.code.read_op(f + 2), Some(OpCode::Jump));
        let target = usize::from(h.code.read_u16(f + 3).unwrap());
        assert_eq!(h.code.read_op(target), Some(OpCode::PushZero));
    }

    #[test]
    fn discarded_condition_keeps_side_effects() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let test = b.binary(b.name("a", AT), BinaryOp::And, b.call_named("g", vec![], AT), AT);
        let unit = b.unit(
            vec![func(&b, "g", &[], vec![]), func(&b, "f", &["a"], vec![test])],
            AT,
        );

        let mut h = Harness::default();
        h.compile(&unit).unwrap();
        let ops = h.ops("f");
        assert!(ops.contains(&OpCode::Call));
        assert!(!ops.contains(&OpCode::PushOne));
    }

    #[test]
    fn chained_comparison_in_condition_is_rejected() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let inner = b.binary(b.name("a", AT), BinaryOp::Eq, b.name("b", AT), AT);
        let chain = b.binary(inner, BinaryOp::Eq, b.name("c", AT), AT);
        let test = b.unary(UnaryOp::Not, chain, AT);
        let unit = b.unit(vec![func(&b, "f", &["a", "b", "c"], vec![b.ret(Some(test), AT)])], AT);

        let mut h = Harness::default();
        assert!(matches!(h.compile(&unit), Err(CompilationError::ChainedComparison { .. })));
    }
}
