//! Values: literals, names, operators, assignment and indexing.

use sable_core::ast::{
    AddressOfExpr, AssignExpr, BinaryExpr, BinaryOp, DeclCell, Expr, IndexExpr, UnaryExpr, UnaryOp,
};
use sable_core::{CompilationError, DeclId, Span};

use super::{CodeGenerator, ExprResult, GenContext, Result};
use crate::bytecode::{EXTERNAL_FUNCTION_BIT, OpCode};
use crate::decl::DeclKind;

/// Where a name's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Storage {
    Local(u8),
    Argument(u8),
    Global(u16),
    /// Array global; the name evaluates to its first cell's address
    Array { offset: u16, size: u32 },
}

impl<'a> CodeGenerator<'a> {
    pub(super) fn gen_number(&mut self, value: i64, span: Span, ctx: GenContext) -> Result<ExprResult> {
        let value = i32::try_from(value).map_err(|_| CompilationError::ValueOutOfRange { value, span })?;
        if !ctx.discard {
            self.emitter.emit_int(value);
        }
        Ok(ExprResult::VALUE)
    }

    /// Push the value of a bound name.
    pub(super) fn gen_name(&mut self, cell: &DeclCell, span: Span, ctx: GenContext) -> Result<ExprResult> {
        if ctx.discard {
            return Ok(ExprResult::VALUE);
        }
        let id = self.bound(cell, span)?;

        match self.kind(id)? {
            DeclKind::Constant(value) => {
                let value = *value;
                self.emitter.emit_int(value);
            }
            DeclKind::Function(_) | DeclKind::Forward(_) => self.emit_function_address(id)?,
            DeclKind::External(host) => {
                let value = EXTERNAL_FUNCTION_BIT | i32::from(host.id);
                self.emitter.emit_int(value);
            }
            DeclKind::Native(_) => {
                return Err(CompilationError::internal(format!(
                    "native function used as a value at {span}"
                )));
            }
            DeclKind::Global(_) | DeclKind::Local(_) | DeclKind::Argument(_) => {
                let storage = self.storage(id)?;
                self.emit_load(storage);
            }
        }
        Ok(ExprResult::VALUE)
    }

    /// Arithmetic negation and bitwise complement. `not` is a condition
    /// and goes through the logical generator.
    pub(super) fn gen_unary(&mut self, unary: &UnaryExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        self.gen_expr(unary.operand, ctx)?;
        if !ctx.discard {
            self.emitter.emit(match unary.op {
                UnaryOp::Neg => OpCode::Neg,
                UnaryOp::BitNot => OpCode::BitNot,
                UnaryOp::Not => OpCode::Not,
            });
        }
        Ok(ExprResult::VALUE)
    }

    /// Arithmetic, bitwise and comparison operators.
    pub(super) fn gen_binary(&mut self, binary: &BinaryExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        let Some(op) = binary_opcode(binary.op) else {
            return Err(CompilationError::internal(format!(
                "'{}' reached the arithmetic generator",
                binary.op
            )));
        };
        if binary.op.is_comparison() {
            self.check_comparison_operands(binary)?;
        }

        self.gen_expr(binary.left, ctx)?;
        self.gen_expr(binary.right, ctx)?;
        if ctx.discard {
            return Ok(ExprResult::VALUE);
        }

        self.emitter.emit(op);
        Ok(ExprResult::VALUE)
    }

    /// Comparisons take exactly two operands; `a = b = c` is not a chain.
    pub(super) fn check_comparison_operands(&self, binary: &BinaryExpr<'_>) -> Result<()> {
        let nested = |side: &Expr<'_>| matches!(side, Expr::Binary(inner) if inner.op.is_comparison());
        if nested(binary.left) || nested(binary.right) {
            return Err(CompilationError::ChainedComparison { span: binary.span });
        }
        Ok(())
    }

    /// Assignment.
    ///
    /// ```text
    /// [value]
    /// DUP                   ; unless discarded
    /// STORE_x slot          ; name target
    ///
    /// [value]
    /// DUP                   ; unless discarded
    /// [base] [index] ADD
    /// STORE_INDIRECT        ; indexed target
    /// ```
    pub(super) fn gen_assign(&mut self, assign: &AssignExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        self.gen_expr(assign.value, GenContext::VALUE)?;
        if !ctx.discard {
            self.emitter.emit(OpCode::Dup);
        }

        match assign.target {
            Expr::Name(name) => {
                let id = self.bound(&name.decl, name.span())?;
                let storage = self.storage(id)?;
                self.emit_store(storage)?;
            }
            Expr::Index(index) => match self.constant_element(index)? {
                Some(cell) => self.emitter.emit_u16(OpCode::StoreGlobal, cell),
                None => {
                    self.gen_element_address(index)?;
                    self.emitter.emit(OpCode::StoreIndirect);
                }
            },
            other => return Err(CompilationError::NotAssignable { span: other.span() }),
        }
        Ok(ExprResult::VALUE)
    }

    /// Indexed load.
    pub(super) fn gen_index(&mut self, index: &IndexExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        if ctx.discard {
            self.gen_expr(index.base, ctx)?;
            self.gen_expr(index.index, ctx)?;
            return Ok(ExprResult::VALUE);
        }
        match self.constant_element(index)? {
            Some(cell) => self.emitter.emit_u16(OpCode::LoadGlobal, cell),
            None => {
                self.gen_element_address(index)?;
                self.emitter.emit(OpCode::LoadIndirect);
            }
        }
        Ok(ExprResult::VALUE)
    }

    pub(super) fn gen_address_of(&mut self, address: &AddressOfExpr<'_>, ctx: GenContext) -> Result<ExprResult> {
        if ctx.discard {
            return Ok(ExprResult::VALUE);
        }
        let id = self.bound(&address.target.decl, address.span)?;
        match self.kind(id)? {
            DeclKind::Function(_) | DeclKind::Forward(_) => self.emit_function_address(id)?,
            DeclKind::External(host) => {
                let value = EXTERNAL_FUNCTION_BIT | i32::from(host.id);
                self.emitter.emit_int(value);
            }
            _ => {
                return Err(CompilationError::NotAddressable {
                    name: address.target.name().to_string(),
                    span: address.span,
                });
            }
        }
        Ok(ExprResult::VALUE)
    }

    // ==========================================================================
    // Storage helpers
    // ==========================================================================

    pub(super) fn storage(&self, id: DeclId) -> Result<Storage> {
        let decl = self.decls.expect(id)?;
        let narrow = |n: u32| {
            u8::try_from(n).map_err(|_| CompilationError::internal(format!("slot {n} of '{}' out of range", decl.name)))
        };
        Ok(match &decl.kind {
            DeclKind::Local(slot) => Storage::Local(narrow(*slot)?),
            DeclKind::Argument(index) => Storage::Argument(narrow(*index)?),
            DeclKind::Global(global) => {
                let offset = u16::try_from(global.offset).map_err(|_| {
                    CompilationError::internal(format!("global '{}' beyond the data range", decl.name))
                })?;
                if global.is_array {
                    Storage::Array {
                        offset,
                        size: global.size,
                    }
                } else {
                    Storage::Global(offset)
                }
            }
            other => {
                return Err(CompilationError::internal(format!(
                    "'{}' is a {}, not storage",
                    decl.name,
                    other.describe()
                )));
            }
        })
    }

    pub(super) fn emit_load(&mut self, storage: Storage) {
        match storage {
            Storage::Local(slot) => self.emitter.emit_byte(OpCode::LoadLocal, slot),
            Storage::Argument(index) => self.emitter.emit_byte(OpCode::LoadArg, index),
            Storage::Global(offset) => self.emitter.emit_u16(OpCode::LoadGlobal, offset),
            Storage::Array { offset, .. } => self.emitter.emit_int(i32::from(offset)),
        }
    }

    pub(super) fn emit_store(&mut self, storage: Storage) -> Result<()> {
        match storage {
            Storage::Local(slot) => self.emitter.emit_byte(OpCode::StoreLocal, slot),
            Storage::Argument(index) => self.emitter.emit_byte(OpCode::StoreArg, index),
            Storage::Global(offset) => self.emitter.emit_u16(OpCode::StoreGlobal, offset),
            Storage::Array { .. } => {
                return Err(CompilationError::internal("store into a whole array"));
            }
        }
        Ok(())
    }

    /// `base[index]` as an address: base value plus index.
    fn gen_element_address(&mut self, index: &IndexExpr<'_>) -> Result<()> {
        self.gen_expr(index.base, GenContext::VALUE)?;
        if self.constant_value(index.index) != Some(0) {
            self.gen_expr(index.index, GenContext::VALUE)?;
            self.emitter.emit(OpCode::Add);
        }
        Ok(())
    }

    /// Global cell of `array[k]` when the base is an array global and the
    /// index a constant.
    fn constant_element(&self, index: &IndexExpr<'_>) -> Result<Option<u16>> {
        let Expr::Name(name) = index.base else {
            return Ok(None);
        };
        let Some(element) = self.constant_value(index.index) else {
            return Ok(None);
        };
        let id = self.bound(&name.decl, name.span())?;
        let Ok(Storage::Array { offset, size }) = self.storage(id) else {
            return Ok(None);
        };
        if element < 0 || element as u32 >= size {
            return Err(CompilationError::ValueOutOfRange {
                value: i64::from(element),
                span: index.index.span(),
            });
        }
        u16::try_from(u32::from(offset) + element as u32)
            .map(Some)
            .map_err(|_| CompilationError::internal("array element beyond the data range"))
    }

    /// Value of an expression known without running it: literals, named
    /// constants and their negation.
    pub(super) fn constant_value(&self, expr: &Expr<'_>) -> Option<i32> {
        match expr {
            Expr::Number(n) => i32::try_from(n.value).ok(),
            Expr::Name(name) | Expr::CallOrSymbol(name) => match self.decls.get(name.decl.get()?)?.kind {
                DeclKind::Constant(value) => Some(value),
                _ => None,
            },
            Expr::Unary(unary) if unary.op == UnaryOp::Neg => {
                self.constant_value(unary.operand).map(i32::wrapping_neg)
            }
            _ => None,
        }
    }
}

/// Opcode of a non-short-circuit binary operator.
fn binary_opcode(op: BinaryOp) -> Option<OpCode> {
    Some(match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::BitAnd => OpCode::BitAnd,
        BinaryOp::BitOr => OpCode::BitOr,
        BinaryOp::BitXor => OpCode::BitXor,
        BinaryOp::Shl => OpCode::Shl,
        BinaryOp::Shr => OpCode::Shr,
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Ne => OpCode::Ne,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Ge => OpCode::Ge,
        BinaryOp::And | BinaryOp::Or => return None,
    })
}

/// Opcode of a comparison operator.
pub(super) fn comparison_opcode(op: BinaryOp) -> Option<OpCode> {
    binary_opcode(op).filter(|_| op.is_comparison())
}
