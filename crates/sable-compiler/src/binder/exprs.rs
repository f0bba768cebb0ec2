//! Expression binding.

use sable_core::ast::{AssignExpr, CallExpr, CaseExpr, Expr, ForDirection, ForExpr, LetExpr, NameExpr};
use sable_core::{CompilationError, DeclId, Diagnostic, Severity, Span};

use super::Binder;
use crate::decl::DeclKind;

impl<'b, 'ast> Binder<'b, 'ast> {
    pub(super) fn bind_body(&mut self, body: &'ast [Expr<'ast>]) -> Result<(), CompilationError> {
        body.iter().try_for_each(|expr| self.bind_expr(expr))
    }

    pub(super) fn bind_expr(&mut self, expr: &'ast Expr<'ast>) -> Result<(), CompilationError> {
        match *expr {
            Expr::Number(n) => {
                if i32::try_from(n.value).is_err() {
                    return Err(CompilationError::ValueOutOfRange {
                        value: n.value,
                        span: n.span,
                    });
                }
                Ok(())
            }
            Expr::Name(name) => {
                let id = self.bind_name(name)?;
                if let DeclKind::Native(_) = self.kind_of(id)? {
                    return Err(CompilationError::NotAddressable {
                        name: name.name().to_string(),
                        span: name.span(),
                    });
                }
                Ok(())
            }
            Expr::CallOrSymbol(name) => {
                let id = self.bind_name(name)?;
                let kind = self.kind_of(id)?;
                if kind.is_callable() {
                    if let Some(arity) = kind.arity().filter(|&n| n != 0) {
                        return Err(CompilationError::ArgumentCountMismatch {
                            name: name.name().to_string(),
                            expected: arity,
                            got: 0,
                            span: name.span(),
                        });
                    }
                }
                Ok(())
            }
            Expr::Unary(unary) => self.bind_expr(unary.operand),
            Expr::Binary(binary) => {
                if binary.op.is_comparison() {
                    let chained = |side: &Expr<'_>| {
                        matches!(side, Expr::Binary(inner) if inner.op.is_comparison())
                    };
                    if chained(binary.left) || chained(binary.right) {
                        return Err(CompilationError::ChainedComparison { span: binary.span });
                    }
                }
                self.bind_expr(binary.left)?;
                self.bind_expr(binary.right)
            }
            Expr::Assign(assign) => self.bind_assign(assign),
            Expr::Index(index) => {
                self.bind_expr(index.base)?;
                self.bind_expr(index.index)
            }
            Expr::AddressOf(address) => {
                let id = self.bind_name(&address.target)?;
                match self.kind_of(id)? {
                    DeclKind::Function(_) | DeclKind::Forward(_) | DeclKind::External(_) => Ok(()),
                    _ => Err(CompilationError::NotAddressable {
                        name: address.target.name().to_string(),
                        span: address.span,
                    }),
                }
            }
            Expr::Call(call) => self.bind_call(call),
            Expr::Cond(cond) => cond.clauses.iter().try_for_each(|clause| {
                self.bind_expr(clause.test)?;
                self.in_scope(|b| b.bind_body(clause.body))
            }),
            Expr::Case(case) => self.bind_case(case),
            Expr::Let(block) => self.bind_let(block),
            Expr::For(for_expr) => self.bind_for(for_expr),
            Expr::Loop(loop_expr) => self.in_loop(|b| b.in_scope(|b| b.bind_body(loop_expr.body))),
            Expr::While(while_expr) => {
                self.bind_expr(while_expr.test)?;
                self.in_loop(|b| b.in_scope(|b| b.bind_body(while_expr.body)))
            }
            Expr::Break(span) => self.check_in_loop("break", span),
            Expr::Next(span) => self.check_in_loop("next", span),
            Expr::Return(ret) => match ret.value {
                Some(value) => self.bind_expr(value),
                None => Ok(()),
            },
            Expr::Lambda(lambda) => {
                self.lambdas.push(lambda);
                Ok(())
            }
            Expr::InitList(list) => Err(CompilationError::Unsupported {
                feature: "initializer list outside a data declaration".to_string(),
                span: list.span,
            }),
        }
    }

    fn bind_name(&mut self, name: &NameExpr<'ast>) -> Result<DeclId, CompilationError> {
        let id = self.resolve(name.name(), name.span())?;
        name.decl.set(id);
        Ok(id)
    }

    fn check_in_loop(&self, keyword: &'static str, span: Span) -> Result<(), CompilationError> {
        if self.loop_depth == 0 {
            return Err(CompilationError::OutsideLoop { keyword, span });
        }
        Ok(())
    }

    fn bind_assign(&mut self, assign: &'ast AssignExpr<'ast>) -> Result<(), CompilationError> {
        self.bind_expr(assign.value)?;
        match assign.target {
            Expr::Name(name) => {
                let id = self.bind_name(name)?;
                match self.kind_of(id)? {
                    DeclKind::Global(global) if !global.is_array => Ok(()),
                    DeclKind::Local(_) | DeclKind::Argument(_) => Ok(()),
                    _ => Err(CompilationError::NotAssignable { span: assign.target.span() }),
                }
            }
            Expr::Index(_) => self.bind_expr(assign.target),
            other => Err(CompilationError::NotAssignable { span: other.span() }),
        }
    }

    fn bind_call(&mut self, call: &'ast CallExpr<'ast>) -> Result<(), CompilationError> {
        let limit = self.options.argument_limit();
        if call.args.len() > limit {
            return Err(CompilationError::TooManyArguments {
                name: callee_label(call.callee),
                count: call.args.len(),
                limit,
                span: call.span,
            });
        }

        match call.callee {
            Expr::Name(name) => {
                let id = self.bind_name(name)?;
                let kind = self.kind_of(id)?;
                if kind.is_callable() {
                    if let Some(expected) = kind.arity().filter(|&n| n != call.args.len()) {
                        return Err(CompilationError::ArgumentCountMismatch {
                            name: name.name().to_string(),
                            expected,
                            got: call.args.len(),
                            span: call.span,
                        });
                    }
                } else if !kind.is_storage() {
                    return Err(CompilationError::NotCallable {
                        name: name.name().to_string(),
                        span: call.span,
                    });
                }
            }
            callee => self.bind_expr(callee)?,
        }

        self.bind_body(call.args)
    }

    fn bind_case(&mut self, case: &'ast CaseExpr<'ast>) -> Result<(), CompilationError> {
        self.bind_expr(case.key)?;
        self.in_scope(|b| {
            if !case.key.is_simple() {
                let slot = b.synthetic_local(case.span);
                case.key_slot.set(slot);
            }
            for clause in case.clauses {
                b.bind_body(clause.keys)?;
                b.in_scope(|b| b.bind_body(clause.body))?;
            }
            match case.otherwise {
                Some(body) => b.in_scope(|b| b.bind_body(body)),
                None => Ok(()),
            }
        })
    }

    fn bind_let(&mut self, block: &'ast LetExpr<'ast>) -> Result<(), CompilationError> {
        self.in_scope(|b| {
            for binding in block.bindings {
                if let Some(init) = binding.init {
                    b.bind_expr(init)?;
                }
                let id = b.declare_local(binding.name)?;
                binding.decl.set(id);
            }
            b.bind_body(block.body)
        })
    }

    fn bind_for(&mut self, for_expr: &'ast ForExpr<'ast>) -> Result<(), CompilationError> {
        self.bind_expr(for_expr.from)?;
        self.bind_expr(for_expr.to)?;

        if let Some(step) = for_expr.step {
            let value = self.fold_cell(step)?;
            if value <= 0 {
                return Err(CompilationError::ValueOutOfRange {
                    value: i64::from(value),
                    span: step.span(),
                });
            }
            for_expr.step_value.set(value);
        }
        self.check_counter_wrap(for_expr);

        self.in_scope(|b| {
            let index = b.declare_local(for_expr.var)?;
            for_expr.decl.set(index);
            if !for_expr.to.is_simple() {
                let bound = b.synthetic_local(for_expr.to.span());
                for_expr.bound_slot.set(bound);
            }
            b.in_loop(|b| b.in_scope(|b| b.bind_body(for_expr.body)))
        })
    }

    /// Warn when a constant bound sits so close to the end of the cell range
    /// that stepping past it wraps the counter around.
    fn check_counter_wrap(&mut self, for_expr: &ForExpr<'_>) {
        let Ok(bound) = self.fold(for_expr.to) else {
            return;
        };
        let step = i64::from(for_expr.step_value.get());
        let wraps = match for_expr.direction {
            ForDirection::Up => bound > i64::from(i32::MAX) - step,
            ForDirection::Down => bound < i64::from(i32::MIN) + step,
        };
        if wraps {
            log::debug!("for loop bound {} wraps with step {}", bound, step);
            self.warnings.push(Diagnostic::new(
                Severity::Warning,
                for_expr.to.span(),
                format!("loop counter overflows stepping past {bound} by {step}; once entered the loop does not end"),
            ));
        }
    }
}

fn callee_label(callee: &Expr<'_>) -> String {
    match callee {
        Expr::Name(name) => name.name().to_string(),
        _ => "indirect call".to_string(),
    }
}
