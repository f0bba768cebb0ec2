//! Constant evaluation service.
//!
//! The compiler needs constants in exactly two places: array sizes and
//! `const` / scalar `var` initializers. It asks a [`ConstFolder`] to reduce
//! the expression, handing it a [`ConstLookup`] for names that are already
//! known constants. Anything the folder cannot reduce is "not constant".

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Resolves names to already-folded constants.
pub trait ConstLookup {
    /// Value of the named constant, if it is one.
    fn constant(&self, name: &str) -> Option<i64>;
}

/// No names are constant.
impl ConstLookup for () {
    fn constant(&self, _name: &str) -> Option<i64> {
        None
    }
}

/// Evaluates an expression to an integer constant.
pub trait ConstFolder {
    /// Reduce `expr`, or return `None` if it is not constant.
    fn fold(&self, expr: &Expr<'_>, names: &dyn ConstLookup) -> Option<i64>;
}

/// Folds literals, constant names and the arithmetic, bitwise, comparison
/// and logical operators.
///
/// Arithmetic is carried out on `i64`; overflow, division by zero and
/// out-of-range shifts make the expression non-constant.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticFolder;

impl ConstFolder for ArithmeticFolder {
    fn fold(&self, expr: &Expr<'_>, names: &dyn ConstLookup) -> Option<i64> {
        match expr {
            Expr::Number(n) => Some(n.value),
            Expr::Name(name) | Expr::CallOrSymbol(name) => names.constant(name.name()),
            Expr::Unary(u) => {
                let value = self.fold(u.operand, names)?;
                match u.op {
                    UnaryOp::Neg => value.checked_neg(),
                    UnaryOp::Not => Some((value == 0) as i64),
                    UnaryOp::BitNot => Some(!value),
                }
            }
            Expr::Binary(b) => {
                let left = self.fold(b.left, names)?;
                // and/or short-circuit on constants too
                match (b.op, left) {
                    (BinaryOp::And, 0) => return Some(0),
                    (BinaryOp::Or, l) if l != 0 => return Some(1),
                    _ => {}
                }
                let right = self.fold(b.right, names)?;
                fold_binary(b.op, left, right)
            }
            _ => None,
        }
    }
}

fn fold_binary(op: BinaryOp, left: i64, right: i64) -> Option<i64> {
    match op {
        BinaryOp::Add => left.checked_add(right),
        BinaryOp::Sub => left.checked_sub(right),
        BinaryOp::Mul => left.checked_mul(right),
        BinaryOp::Div => left.checked_div(right),
        BinaryOp::Mod => left.checked_rem(right),
        BinaryOp::BitAnd => Some(left & right),
        BinaryOp::BitOr => Some(left | right),
        BinaryOp::BitXor => Some(left ^ right),
        BinaryOp::Shl => u32::try_from(right).ok().and_then(|s| left.checked_shl(s)),
        BinaryOp::Shr => u32::try_from(right).ok().and_then(|s| left.checked_shr(s)),
        BinaryOp::Eq => Some((left == right) as i64),
        BinaryOp::Ne => Some((left != right) as i64),
        BinaryOp::Lt => Some((left < right) as i64),
        BinaryOp::Le => Some((left <= right) as i64),
        BinaryOp::Gt => Some((left > right) as i64),
        BinaryOp::Ge => Some((left >= right) as i64),
        BinaryOp::And | BinaryOp::Or => Some((right != 0) as i64),
    }
}
