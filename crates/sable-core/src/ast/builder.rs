//! Arena-backed constructors for AST nodes.
//!
//! Front ends build trees through [`AstBuilder`] so that every child ends up
//! in the same arena as its parent.

use std::cell::Cell;

use bumpalo::Bump;

use crate::Span;
use crate::ast::{
    AddressOfExpr, ArrayType, AssignExpr, BinaryExpr, BinaryOp, CallExpr, CaseClause, CaseExpr,
    CondClause, CondExpr, DataDecl, DeclCell, Expr, ForDirection, ForExpr, Ident, IndexExpr,
    InitListExpr, Item, LambdaExpr, LetBinding, LetExpr, LoopExpr, NameExpr, NumberExpr, Param,
    ProcDecl, ReturnExpr, UnaryExpr, UnaryOp, Unit, WhileExpr,
};

/// Allocates AST nodes in a bump arena.
#[derive(Clone, Copy)]
pub struct AstBuilder<'ast> {
    arena: &'ast Bump,
}

impl<'ast> AstBuilder<'ast> {
    /// Create a builder over an arena.
    pub fn new(arena: &'ast Bump) -> Self {
        Self { arena }
    }

    /// The underlying arena.
    pub fn arena(&self) -> &'ast Bump {
        self.arena
    }

    /// Copy a name into the arena.
    pub fn ident(&self, name: &str, span: Span) -> Ident<'ast> {
        Ident::new(self.arena.alloc_str(name), span)
    }

    /// Move a list of expressions into the arena.
    pub fn body(&self, exprs: Vec<Expr<'ast>>) -> &'ast [Expr<'ast>] {
        self.arena.alloc_slice_copy(&exprs)
    }

    fn expr(&self, expr: Expr<'ast>) -> &'ast Expr<'ast> {
        self.arena.alloc(expr)
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    /// Numeric literal.
    pub fn number(&self, value: i64, span: Span) -> Expr<'ast> {
        Expr::Number(NumberExpr { value, span })
    }

    /// Reference to a name.
    pub fn name(&self, name: &str, span: Span) -> Expr<'ast> {
        Expr::Name(self.arena.alloc(NameExpr::new(self.ident(name, span))))
    }

    /// Bare symbol that becomes a zero-argument call when it names a function.
    pub fn call_or_symbol(&self, name: &str, span: Span) -> Expr<'ast> {
        Expr::CallOrSymbol(self.arena.alloc(NameExpr::new(self.ident(name, span))))
    }

    /// Prefix operation.
    pub fn unary(&self, op: UnaryOp, operand: Expr<'ast>, span: Span) -> Expr<'ast> {
        Expr::Unary(self.arena.alloc(UnaryExpr {
            op,
            operand: self.expr(operand),
            span,
        }))
    }

    /// Infix operation.
    pub fn binary(&self, left: Expr<'ast>, op: BinaryOp, right: Expr<'ast>, span: Span) -> Expr<'ast> {
        Expr::Binary(self.arena.alloc(BinaryExpr {
            left: self.expr(left),
            op,
            right: self.expr(right),
            span,
        }))
    }

    /// Assignment.
    pub fn assign(&self, target: Expr<'ast>, value: Expr<'ast>, span: Span) -> Expr<'ast> {
        Expr::Assign(self.arena.alloc(AssignExpr {
            target: self.expr(target),
            value: self.expr(value),
            span,
        }))
    }

    /// Indexed access.
    pub fn index(&self, base: Expr<'ast>, index: Expr<'ast>, span: Span) -> Expr<'ast> {
        Expr::Index(self.arena.alloc(IndexExpr {
            base: self.expr(base),
            index: self.expr(index),
            span,
        }))
    }

    /// Address of a function.
    pub fn address_of(&self, name: &str, span: Span) -> Expr<'ast> {
        Expr::AddressOf(self.arena.alloc(AddressOfExpr {
            target: NameExpr::new(self.ident(name, span)),
            span,
        }))
    }

    /// Call through an arbitrary callee expression.
    pub fn call(&self, callee: Expr<'ast>, args: Vec<Expr<'ast>>, span: Span) -> Expr<'ast> {
        Expr::Call(self.arena.alloc(CallExpr {
            callee: self.expr(callee),
            args: self.body(args),
            span,
        }))
    }

    /// Call of a named function.
    pub fn call_named(&self, name: &str, args: Vec<Expr<'ast>>, span: Span) -> Expr<'ast> {
        self.call(self.name(name, span), args, span)
    }

    /// `cond` expression.
    pub fn cond(&self, clauses: Vec<CondClause<'ast>>, span: Span) -> Expr<'ast> {
        Expr::Cond(self.arena.alloc(CondExpr {
            clauses: self.arena.alloc_slice_copy(&clauses),
            span,
        }))
    }

    /// One `cond` clause.
    pub fn clause(&self, test: Expr<'ast>, body: Vec<Expr<'ast>>, span: Span) -> CondClause<'ast> {
        CondClause {
            test: self.expr(test),
            body: self.body(body),
            span,
        }
    }

    /// An `else` clause (test is the literal 1).
    pub fn else_clause(&self, body: Vec<Expr<'ast>>, span: Span) -> CondClause<'ast> {
        self.clause(self.number(1, span), body, span)
    }

    /// `case` expression.
    pub fn case(
        &self,
        key: Expr<'ast>,
        clauses: Vec<CaseClause<'ast>>,
        otherwise: Option<Vec<Expr<'ast>>>,
        span: Span,
    ) -> Expr<'ast> {
        Expr::Case(self.arena.alloc(CaseExpr {
            key: self.expr(key),
            clauses: self.arena.alloc_slice_copy(&clauses),
            otherwise: otherwise.map(|body| self.body(body)),
            key_slot: DeclCell::default(),
            span,
        }))
    }

    /// One `case` clause.
    pub fn case_clause(
        &self,
        keys: Vec<Expr<'ast>>,
        body: Vec<Expr<'ast>>,
        span: Span,
    ) -> CaseClause<'ast> {
        CaseClause {
            keys: self.body(keys),
            body: self.body(body),
            span,
        }
    }

    /// `let` block.
    pub fn let_block(
        &self,
        bindings: Vec<LetBinding<'ast>>,
        body: Vec<Expr<'ast>>,
        span: Span,
    ) -> Expr<'ast> {
        Expr::Let(self.arena.alloc(LetExpr {
            bindings: self.arena.alloc_slice_fill_iter(bindings),
            body: self.body(body),
            span,
        }))
    }

    /// One `let` binding.
    pub fn binding(&self, name: &str, init: Option<Expr<'ast>>, span: Span) -> LetBinding<'ast> {
        LetBinding {
            name: self.ident(name, span),
            init: init.map(|e| self.expr(e)),
            decl: DeclCell::default(),
            span,
        }
    }

    /// Counted loop.
    #[allow(clippy::too_many_arguments)]
    pub fn for_loop(
        &self,
        var: &str,
        from: Expr<'ast>,
        to: Expr<'ast>,
        direction: ForDirection,
        step: Option<Expr<'ast>>,
        body: Vec<Expr<'ast>>,
        span: Span,
    ) -> Expr<'ast> {
        Expr::For(self.arena.alloc(ForExpr {
            var: self.ident(var, span),
            decl: DeclCell::default(),
            from: self.expr(from),
            to: self.expr(to),
            direction,
            step: step.map(|e| self.expr(e)),
            step_value: Cell::new(1),
            bound_slot: DeclCell::default(),
            body: self.body(body),
            span,
        }))
    }

    /// Unconditional loop.
    pub fn loop_expr(&self, body: Vec<Expr<'ast>>, span: Span) -> Expr<'ast> {
        Expr::Loop(self.arena.alloc(LoopExpr {
            body: self.body(body),
            span,
        }))
    }

    /// `while test do body`.
    pub fn while_loop(&self, test: Expr<'ast>, body: Vec<Expr<'ast>>, span: Span) -> Expr<'ast> {
        Expr::While(self.arena.alloc(WhileExpr {
            test: self.expr(test),
            body: self.body(body),
            post_test: false,
            span,
        }))
    }

    /// `do body while test`.
    pub fn do_while(&self, body: Vec<Expr<'ast>>, test: Expr<'ast>, span: Span) -> Expr<'ast> {
        Expr::While(self.arena.alloc(WhileExpr {
            test: self.expr(test),
            body: self.body(body),
            post_test: true,
            span,
        }))
    }

    /// `break`.
    pub fn break_expr(&self, span: Span) -> Expr<'ast> {
        Expr::Break(span)
    }

    /// `next`.
    pub fn next_expr(&self, span: Span) -> Expr<'ast> {
        Expr::Next(span)
    }

    /// `return [value]`.
    pub fn ret(&self, value: Option<Expr<'ast>>, span: Span) -> Expr<'ast> {
        Expr::Return(self.arena.alloc(ReturnExpr {
            value: value.map(|e| self.expr(e)),
            span,
        }))
    }

    /// Anonymous function.
    pub fn lambda(&self, params: Vec<Param<'ast>>, body: Vec<Expr<'ast>>, span: Span) -> Expr<'ast> {
        Expr::Lambda(self.arena.alloc(LambdaExpr {
            params: self.arena.alloc_slice_fill_iter(params),
            body: self.body(body),
            decl: DeclCell::default(),
            span,
        }))
    }

    /// Initializer list.
    pub fn init_list(&self, items: Vec<Expr<'ast>>, span: Span) -> Expr<'ast> {
        Expr::InitList(self.arena.alloc(InitListExpr {
            items: self.body(items),
            span,
        }))
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    /// Untyped parameter.
    pub fn param(&self, name: &str, span: Span) -> Param<'ast> {
        Param::new(self.ident(name, span))
    }

    /// Parameter with a type annotation.
    pub fn typed_param(&self, name: &str, ty: &str, span: Span) -> Param<'ast> {
        Param {
            ty: Some(self.ident(ty, span)),
            ..self.param(name, span)
        }
    }

    /// Procedure definition (`body` is `Some`) or forward declaration.
    pub fn proc_decl(
        &self,
        name: Ident<'ast>,
        params: Vec<Param<'ast>>,
        body: Option<Vec<Expr<'ast>>>,
        exported: bool,
        span: Span,
    ) -> Item<'ast> {
        Item::Proc(self.arena.alloc(ProcDecl {
            name,
            params: self.arena.alloc_slice_fill_iter(params),
            body: body.map(|b| self.body(b)),
            exported,
            decl: DeclCell::default(),
            span,
        }))
    }

    /// `const` or `var` declaration, optionally with an array size.
    pub fn data_decl(
        &self,
        name: &str,
        is_const: bool,
        array_size: Option<Expr<'ast>>,
        init: Option<Expr<'ast>>,
        span: Span,
    ) -> Item<'ast> {
        Item::Data(self.arena.alloc(DataDecl {
            name: self.ident(name, span),
            is_const,
            array: array_size.map(|size| ArrayType {
                span: size.span(),
                size: self.expr(size),
            }),
            init: init.map(|e| self.expr(e)),
            decl: DeclCell::default(),
            span,
        }))
    }

    /// Translation unit.
    pub fn unit(&self, items: Vec<Item<'ast>>, span: Span) -> Unit<'ast> {
        Unit::new(self.arena.alloc_slice_copy(&items), span)
    }
}
