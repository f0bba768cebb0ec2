//! Expression nodes.
//!
//! Sable is expression oriented: control constructs (`cond`, `case`, `let`,
//! the loops) are expressions too, and a body is a slice of expressions whose
//! last element gives the value. Children are arena references, so an
//! [`Expr`] is a cheap `Copy` handle.

use std::cell::Cell;

use crate::Span;
use crate::ast::decl::Param;
use crate::ast::{BinaryOp, DeclCell, Ident, UnaryOp};

/// Coarse node classification used by fast-path checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Numeric literal.
    Number,
    /// Plain name reference.
    Name,
    /// Anything else.
    Other,
}

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    /// Numeric literal
    Number(NumberExpr),
    /// Name reference
    Name(&'ast NameExpr<'ast>),
    /// Prefix operator
    Unary(&'ast UnaryExpr<'ast>),
    /// Infix operator
    Binary(&'ast BinaryExpr<'ast>),
    /// Assignment
    Assign(&'ast AssignExpr<'ast>),
    /// Indexed access `base[index]`
    Index(&'ast IndexExpr<'ast>),
    /// Address of a function `@f`
    AddressOf(&'ast AddressOfExpr<'ast>),
    /// Call with an argument list
    Call(&'ast CallExpr<'ast>),
    /// `(f)` / bare `f`: a zero-argument call if `f` is callable, a value otherwise
    CallOrSymbol(&'ast NameExpr<'ast>),
    /// `cond` clause list
    Cond(&'ast CondExpr<'ast>),
    /// `case` multi-way dispatch
    Case(&'ast CaseExpr<'ast>),
    /// `let` block
    Let(&'ast LetExpr<'ast>),
    /// Counted `for` loop
    For(&'ast ForExpr<'ast>),
    /// Unconditional `loop`
    Loop(&'ast LoopExpr<'ast>),
    /// `while` / `do ... while`
    While(&'ast WhileExpr<'ast>),
    /// `break`
    Break(Span),
    /// `next`
    Next(Span),
    /// `return`
    Return(&'ast ReturnExpr<'ast>),
    /// Anonymous function
    Lambda(&'ast LambdaExpr<'ast>),
    /// `{a, b, c}` (data initializers only)
    InitList(&'ast InitListExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    /// Get the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Self::Number(e) => e.span,
            Self::Name(e) => e.span(),
            Self::Unary(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Assign(e) => e.span,
            Self::Index(e) => e.span,
            Self::AddressOf(e) => e.span,
            Self::Call(e) => e.span,
            Self::CallOrSymbol(e) => e.span(),
            Self::Cond(e) => e.span,
            Self::Case(e) => e.span,
            Self::Let(e) => e.span,
            Self::For(e) => e.span,
            Self::Loop(e) => e.span,
            Self::While(e) => e.span,
            Self::Break(span) | Self::Next(span) => *span,
            Self::Return(e) => e.span,
            Self::Lambda(e) => e.span,
            Self::InitList(e) => e.span,
        }
    }

    /// Coarse classification of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Number(_) => NodeKind::Number,
            Self::Name(_) => NodeKind::Name,
            _ => NodeKind::Other,
        }
    }

    /// Whether this node is a literal or a plain name (evaluating it twice is free).
    pub fn is_simple(&self) -> bool {
        self.kind() != NodeKind::Other
    }
}

/// Numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberExpr {
    /// Literal value as read; range checked by the generator
    pub value: i64,
    /// Source location
    pub span: Span,
}

/// A reference to a name.
#[derive(Debug, Clone, PartialEq)]
pub struct NameExpr<'ast> {
    /// The referenced name
    pub ident: Ident<'ast>,
    /// Declaration attached by the binder
    pub decl: DeclCell,
}

impl<'ast> NameExpr<'ast> {
    /// Create an unbound name reference.
    pub fn new(ident: Ident<'ast>) -> Self {
        Self {
            ident,
            decl: DeclCell::default(),
        }
    }

    /// The referenced name.
    pub fn name(&self) -> &'ast str {
        self.ident.name
    }

    /// Source location
    pub fn span(&self) -> Span {
        self.ident.span
    }
}

/// Prefix operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryExpr<'ast> {
    /// Operator
    pub op: UnaryOp,
    /// Operand
    pub operand: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// Infix operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryExpr<'ast> {
    /// Left operand
    pub left: &'ast Expr<'ast>,
    /// Operator
    pub op: BinaryOp,
    /// Right operand
    pub right: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// Assignment `target := value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignExpr<'ast> {
    /// Name or indexed access
    pub target: &'ast Expr<'ast>,
    /// Assigned value
    pub value: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// Indexed access `base[index]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexExpr<'ast> {
    /// Array name, or any expression yielding a cell address
    pub base: &'ast Expr<'ast>,
    /// Element index
    pub index: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// Address-of `@name`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressOfExpr<'ast> {
    /// The function whose address is taken
    pub target: NameExpr<'ast>,
    /// Source location
    pub span: Span,
}

/// A call `callee(args...)`.
///
/// The call is direct when the callee is a name bound to a function, and
/// indirect (through a computed function value) otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallExpr<'ast> {
    /// Called expression
    pub callee: &'ast Expr<'ast>,
    /// Arguments, evaluated left to right
    pub args: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

/// `cond` expression: the first clause whose test holds is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CondExpr<'ast> {
    /// Clauses in source order; `else` is a clause whose test is the literal 1
    pub clauses: &'ast [CondClause<'ast>],
    /// Source location
    pub span: Span,
}

/// One `cond` clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CondClause<'ast> {
    /// Clause condition
    pub test: &'ast Expr<'ast>,
    /// Clause body
    pub body: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

impl CondClause<'_> {
    /// Whether the test is a non-zero literal (an `else` clause).
    pub fn is_else(&self) -> bool {
        matches!(self.test, Expr::Number(n) if n.value != 0)
    }
}

/// `case` multi-way dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr<'ast> {
    /// Dispatch key
    pub key: &'ast Expr<'ast>,
    /// Clauses in source order
    pub clauses: &'ast [CaseClause<'ast>],
    /// Body used when no key matches
    pub otherwise: Option<&'ast [Expr<'ast>]>,
    /// Synthetic local holding a non-simple key (set by the binder)
    pub key_slot: DeclCell,
    /// Source location
    pub span: Span,
}

/// One `case` clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseClause<'ast> {
    /// Keys selecting this clause
    pub keys: &'ast [Expr<'ast>],
    /// Clause body
    pub body: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

/// `let` block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetExpr<'ast> {
    /// Bindings, initialized in order
    pub bindings: &'ast [LetBinding<'ast>],
    /// Body evaluated with the bindings in scope
    pub body: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

/// One `let` binding.
#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding<'ast> {
    /// Bound name
    pub name: Ident<'ast>,
    /// Initial value (0 when absent)
    pub init: Option<&'ast Expr<'ast>>,
    /// Local declaration attached by the binder
    pub decl: DeclCell,
    /// Source location
    pub span: Span,
}

/// Direction of a counted loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForDirection {
    /// `to`: increment, stop when index > bound
    Up,
    /// `downto`: decrement, stop when index < bound
    Down,
}

/// Counted `for` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ForExpr<'ast> {
    /// Index variable
    pub var: Ident<'ast>,
    /// Index slot attached by the binder
    pub decl: DeclCell,
    /// Initial index value
    pub from: &'ast Expr<'ast>,
    /// Inclusive bound
    pub to: &'ast Expr<'ast>,
    /// Count direction
    pub direction: ForDirection,
    /// Optional step (must fold to a positive constant)
    pub step: Option<&'ast Expr<'ast>>,
    /// Folded step, stored by the binder
    pub step_value: Cell<i32>,
    /// Synthetic local holding a non-simple bound (set by the binder)
    pub bound_slot: DeclCell,
    /// Loop body
    pub body: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

/// Unconditional `loop`, left only through `break` or `return`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopExpr<'ast> {
    /// Loop body
    pub body: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

/// `while test do body` or `do body while test`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhileExpr<'ast> {
    /// Loop condition
    pub test: &'ast Expr<'ast>,
    /// Loop body
    pub body: &'ast [Expr<'ast>],
    /// Test after the body (`do ... while`)
    pub post_test: bool,
    /// Source location
    pub span: Span,
}

/// `return [value]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnExpr<'ast> {
    /// Returned value (0 when absent)
    pub value: Option<&'ast Expr<'ast>>,
    /// Source location
    pub span: Span,
}

/// Anonymous function. Its value is the address of a synthetic procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpr<'ast> {
    /// Parameters
    pub params: &'ast [Param<'ast>],
    /// Body
    pub body: &'ast [Expr<'ast>],
    /// Synthetic function declaration attached by the binder
    pub decl: DeclCell,
    /// Source location
    pub span: Span,
}

/// Initializer list for array data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitListExpr<'ast> {
    /// Element initializers
    pub items: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}
