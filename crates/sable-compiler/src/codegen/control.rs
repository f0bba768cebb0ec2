//! Conditionals, multi-way dispatch, `let` blocks and `return`.

use rustc_hash::FxHashSet;
use sable_core::ast::{CaseExpr, CondExpr, DeclCell, Expr, LetExpr};
use sable_core::{CompilationError, Span};

use super::expr::Storage;
use super::{CodeGenerator, ExprResult, GenContext, Result};
use crate::bytecode::{OpCode, PatchChain, UNRESOLVED};

/// A constant case key and the clause it selects.
#[derive(Debug, Clone, Copy)]
struct CaseKey {
    value: i32,
    clause: usize,
}

/// How a `case` with only constant keys dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    /// `JUMP_TABLE` over `low..=high`
    Dense { low: i32, high: i32 },
    /// `JUMP_LOOKUP` over sorted keys
    Sparse,
}

impl Dispatch {
    /// Dense when there are at least three keys and the range is at most
    /// twice the key count.
    fn choose(keys: &[CaseKey]) -> Option<Self> {
        let low = keys.iter().map(|k| k.value).min()?;
        let high = keys.iter().map(|k| k.value).max()?;
        let range = i64::from(high) - i64::from(low) + 1;
        let count = keys.len() as i64;
        if count >= 3 && range <= 2 * count {
            Some(Dispatch::Dense { low, high })
        } else {
            Some(Dispatch::Sparse)
        }
    }
}

impl<'a> CodeGenerator<'a> {
    // ==========================================================================
    // cond
    // ==========================================================================

    /// Clauses are tested in order; the first true one runs.
    ///
    /// ```text
    ///         [test 1, jump when false -> next1]
    ///         [body 1]
    ///         JUMP end
    /// next1:  [test 2, jump when false -> next2]
    ///         ...
    /// nextN:  PUSH_ZERO            ; no else clause, value needed
    /// end:
    /// ```
    pub(super) fn gen_cond(&mut self, cond: &CondExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        let mut end = PatchChain::new();
        let mut has_else = false;
        let mut all_return = true;

        for clause in cond.clauses {
            self.emitter.set_depth(start);
            if clause.is_else() {
                has_else = true;
                all_return &= self.gen_body(clause.body, ctx)?.tail_return;
                break;
            }

            let mut next = PatchChain::new();
            self.gen_branch(clause.test, false, &mut next)?;
            let result = self.gen_body(clause.body, ctx)?;
            all_return &= result.tail_return;
            if !result.tail_return {
                self.emitter.emit_jump(OpCode::Jump, &mut end);
            }
            self.emitter.set_depth(start);
            self.emitter.bind_here(&mut next)?;
        }

        if !has_else && !ctx.discard {
            self.emitter.emit(OpCode::PushZero);
        }
        self.emitter.set_depth(start + ctx.produced());
        self.emitter.bind_here(&mut end)?;

        if has_else && all_return {
            Ok(ExprResult::RETURNED)
        } else {
            Ok(ExprResult::VALUE)
        }
    }

    // ==========================================================================
    // case
    // ==========================================================================

    /// Multi-way dispatch. Constant keys become a jump table or a sorted
    /// lookup; anything else is compared key by key.
    pub(super) fn gen_case(&mut self, case: &CaseExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        let constant_keys = self.constant_case_keys(case)?;

        let (mut clause_chains, mut default) = match constant_keys.as_deref().and_then(|keys| {
            Dispatch::choose(keys).map(|dispatch| (keys, dispatch))
        }) {
            Some((keys, dispatch)) => self.gen_case_table(case, keys, dispatch)?,
            None => self.gen_case_compare(case)?,
        };

        let mut end = PatchChain::new();
        let mut all_return = true;
        for (clause, chain) in case.clauses.iter().zip(clause_chains.iter_mut()) {
            if clause.keys.is_empty() {
                continue;
            }
            self.emitter.set_depth(start);
            self.emitter.bind_here(chain)?;
            let result = self.gen_body(clause.body, ctx)?;
            all_return &= result.tail_return;
            if !result.tail_return {
                self.emitter.emit_jump(OpCode::Jump, &mut end);
            }
        }

        self.emitter.set_depth(start);
        self.emitter.bind_here(&mut default)?;
        let otherwise_returns = match case.otherwise {
            Some(body) => self.gen_body(body, ctx)?.tail_return,
            None => {
                if !ctx.discard {
                    self.emitter.emit(OpCode::PushZero);
                }
                false
            }
        };
        self.emitter.set_depth(start + ctx.produced());
        self.emitter.bind_here(&mut end)?;

        if otherwise_returns && all_return {
            Ok(ExprResult::RETURNED)
        } else {
            Ok(ExprResult::VALUE)
        }
    }

    /// Every key folded to a constant, or `None` if some key is not
    /// constant. Repeated constants are rejected either way.
    fn constant_case_keys(&self, case: &CaseExpr<'_>) -> Result<Option<Vec<CaseKey>>> {
        let mut seen = FxHashSet::default();
        let mut keys = Vec::new();
        let mut all_constant = true;

        for (clause_index, clause) in case.clauses.iter().enumerate() {
            for key in clause.keys {
                match self.constant_value(key) {
                    Some(value) => {
                        if !seen.insert(value) {
                            return Err(CompilationError::DuplicateCaseKey {
                                value,
                                span: key.span(),
                            });
                        }
                        keys.push(CaseKey {
                            value,
                            clause: clause_index,
                        });
                    }
                    None => all_constant = false,
                }
            }
        }
        Ok(all_constant.then_some(keys))
    }

    /// Table dispatch on constant keys.
    ///
    /// ```text
    /// [key]
    /// JUMP_TABLE low count default t0 .. t(count-1)
    ///
    /// [key]
    /// JUMP_LOOKUP count default (k0 t0) .. (k(count-1) t(count-1))
    /// ```
    fn gen_case_table(
        &mut self,
        case: &CaseExpr<'_>,
        keys: &[CaseKey],
        dispatch: Dispatch,
    ) -> Result<(Vec<PatchChain>, PatchChain)> {
        let mut chains = vec![PatchChain::new(); case.clauses.len()];
        let mut default = PatchChain::new();

        self.gen_expr(case.key, GenContext::VALUE)?;
        match dispatch {
            Dispatch::Dense { low, high } => {
                let count = table_count(i64::from(high) - i64::from(low) + 1, case.span)?;
                self.emitter.emit_raw_op(OpCode::JumpTable);
                self.emitter.emit_raw_i32(low);
                self.emitter.emit_raw_u16(count);
                default.push(self.emitter.emit_raw_u16(UNRESOLVED));

                for value in low..=high {
                    let site = self.emitter.emit_raw_u16(UNRESOLVED);
                    match keys.iter().find(|k| k.value == value) {
                        Some(key) => chains[key.clause].push(site),
                        None => default.push(site),
                    }
                }
            }
            Dispatch::Sparse => {
                let mut sorted = keys.to_vec();
                sorted.sort_unstable_by_key(|k| k.value);
                let count = table_count(sorted.len() as i64, case.span)?;
                self.emitter.emit_raw_op(OpCode::JumpLookup);
                self.emitter.emit_raw_u16(count);
                default.push(self.emitter.emit_raw_u16(UNRESOLVED));

                for key in sorted {
                    self.emitter.emit_raw_i32(key.value);
                    chains[key.clause].push(self.emitter.emit_raw_u16(UNRESOLVED));
                }
            }
        }
        self.emitter.check_size()?;
        Ok((chains, default))
    }

    /// Sequential comparison against the key. A failed last test falls
    /// through to the jump into the default body.
    ///
    /// ```text
    /// [key] STORE_LOCAL k      ; only for a synthesized key slot
    /// LOAD k [key 1] EQ JUMP_IF_TRUE body1
    /// LOAD k [key 2] EQ JUMP_IF_TRUE body1
    /// LOAD k [key 3] EQ JUMP_IF_TRUE body2
    /// JUMP default
    /// ```
    fn gen_case_compare(&mut self, case: &CaseExpr<'_>) -> Result<(Vec<PatchChain>, PatchChain)> {
        let mut chains = vec![PatchChain::new(); case.clauses.len()];

        let slot = match case.key_slot.get() {
            Some(_) => {
                let slot = self.local_slot(&case.key_slot, case.span)?;
                self.gen_expr(case.key, GenContext::VALUE)?;
                self.emitter.emit_byte(OpCode::StoreLocal, slot);
                Some(slot)
            }
            None => None,
        };

        for (clause, chain) in case.clauses.iter().zip(chains.iter_mut()) {
            for key in clause.keys {
                match slot {
                    Some(slot) => self.emitter.emit_byte(OpCode::LoadLocal, slot),
                    None => {
                        self.gen_expr(case.key, GenContext::VALUE)?;
                    }
                }
                self.gen_expr(key, GenContext::VALUE)?;
                self.emitter.emit(OpCode::Eq);
                self.emitter.emit_jump(OpCode::JumpIfTrue, chain);
            }
        }

        let mut default = PatchChain::new();
        self.emitter.emit_jump(OpCode::Jump, &mut default);
        Ok((chains, default))
    }

    // ==========================================================================
    // let, return
    // ==========================================================================

    /// Bindings are stored in order; a binding without initializer is 0.
    pub(super) fn gen_let(&mut self, block: &LetExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        for binding in block.bindings {
            match binding.init {
                Some(init) => {
                    self.gen_expr(init, GenContext::VALUE)?;
                }
                None => self.emitter.emit(OpCode::PushZero),
            }
            let slot = self.local_slot(&binding.decl, binding.span)?;
            self.emitter.emit_byte(OpCode::StoreLocal, slot);
        }
        self.gen_body(block.body, ctx)
    }

    pub(super) fn gen_return(&mut self, value: Option<&Expr<'_>>, ctx: GenContext) -> Result<ExprResult> {
        let start = self.emitter.depth();
        match value {
            Some(value) => {
                self.gen_expr(value, GenContext::VALUE)?;
            }
            None => self.emitter.emit(OpCode::PushZero),
        }
        self.emitter.emit(OpCode::Return);
        // Unreachable from here on; the depth still follows the context.
        self.emitter.set_depth(start + ctx.produced());
        Ok(ExprResult::RETURNED)
    }

    /// Frame slot of a local bound to `cell`.
    pub(super) fn local_slot(&self, cell: &DeclCell, span: Span) -> Result<u8> {
        let id = self.bound(cell, span)?;
        match self.storage(id)? {
            Storage::Local(slot) => Ok(slot),
            other => Err(CompilationError::internal(format!(
                "expected a local slot at {span}, found {other:?}"
            ))),
        }
    }
}

fn table_count(count: i64, span: Span) -> Result<u16> {
    u16::try_from(count).map_err(|_| CompilationError::Unsupported {
        feature: format!("case with {count} table entries"),
        span,
    })
}
