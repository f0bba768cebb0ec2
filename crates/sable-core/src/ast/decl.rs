//! Declaration nodes: parameters, procedures, data and the translation unit.

use crate::Span;
use crate::ast::{DeclCell, Expr, Ident};

/// A top-level item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'ast> {
    /// `const` / `var` declaration
    Data(&'ast DataDecl<'ast>),
    /// Procedure definition or forward declaration
    Proc(&'ast ProcDecl<'ast>),
}

impl<'ast> Item<'ast> {
    /// Get the span of this item.
    pub fn span(&self) -> Span {
        match self {
            Self::Data(d) => d.span,
            Self::Proc(d) => d.span,
        }
    }

    /// The declared name.
    pub fn name(&self) -> &'ast str {
        match self {
            Self::Data(d) => d.name.name,
            Self::Proc(d) => d.name.name,
        }
    }
}

/// A procedure parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param<'ast> {
    /// Parameter name
    pub name: Ident<'ast>,
    /// Type annotation (parsed, not supported by the core)
    pub ty: Option<Ident<'ast>>,
    /// Argument declaration attached by the binder
    pub decl: DeclCell,
    /// Source location
    pub span: Span,
}

impl<'ast> Param<'ast> {
    /// An untyped parameter.
    pub fn new(name: Ident<'ast>) -> Self {
        Self {
            span: name.span,
            name,
            ty: None,
            decl: DeclCell::default(),
        }
    }
}

/// A procedure. Without a body it is a forward declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcDecl<'ast> {
    /// Procedure name
    pub name: Ident<'ast>,
    /// Parameters
    pub params: &'ast [Param<'ast>],
    /// Body; `None` for a forward declaration
    pub body: Option<&'ast [Expr<'ast>]>,
    /// Callable by the host as an entry point
    pub exported: bool,
    /// Function declaration attached by the binder
    pub decl: DeclCell,
    /// Source location
    pub span: Span,
}

impl ProcDecl<'_> {
    /// Whether this is a forward declaration.
    pub fn is_forward(&self) -> bool {
        self.body.is_none()
    }
}

/// Array type reference `[size]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayType<'ast> {
    /// Element count; must fold to a positive constant
    pub size: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// `const` or `var` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDecl<'ast> {
    /// Declared name
    pub name: Ident<'ast>,
    /// `const` rather than `var`
    pub is_const: bool,
    /// Array type, if any
    pub array: Option<ArrayType<'ast>>,
    /// Initializer (expression or initializer list)
    pub init: Option<&'ast Expr<'ast>>,
    /// Declaration attached by the binder
    pub decl: DeclCell,
    /// Source location
    pub span: Span,
}

/// A translation unit: one source file's global data and procedures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit<'ast> {
    items: &'ast [Item<'ast>],
    span: Span,
}

impl<'ast> Unit<'ast> {
    /// Create a unit from parsed items.
    pub fn new(items: &'ast [Item<'ast>], span: Span) -> Self {
        Self { items, span }
    }

    /// Top-level items in source order.
    pub fn items(&self) -> &'ast [Item<'ast>] {
        self.items
    }

    /// Procedures in source order.
    pub fn procs(&self) -> impl Iterator<Item = &'ast ProcDecl<'ast>> {
        self.items.iter().filter_map(|item| match item {
            Item::Proc(p) => Some(*p),
            Item::Data(_) => None,
        })
    }

    /// Source location of the unit.
    pub fn span(&self) -> Span {
        self.span
    }
}
