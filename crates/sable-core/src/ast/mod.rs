//! Canonical abstract syntax tree for Sable.
//!
//! Both front ends (the Algol-style reader and the s-expression reader)
//! produce this tree. Nodes live in a `bumpalo` arena and borrow their
//! children from it; the shape never changes after parsing. Binding writes
//! its results into the [`DeclCell`] slots carried by name references and
//! declaration sites.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use sable_core::Span;
//! use sable_core::ast::{AstBuilder, BinaryOp};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let at = Span::new(1, 1);
//!
//! let sum = b.binary(b.number(1, at), BinaryOp::Add, b.number(2, at), at);
//! let main = b.proc_decl(b.ident("main", at), vec![], Some(vec![b.ret(Some(sum), at)]), true, at);
//! let unit = b.unit(vec![main], at);
//! assert_eq!(unit.items().len(), 1);
//! ```

use std::cell::Cell;

use crate::{DeclId, Span};

mod builder;
pub mod decl;
pub mod expr;
pub mod ops;

pub use builder::AstBuilder;
pub use decl::*;
pub use expr::*;
pub use ops::*;

/// An identifier with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ident<'ast> {
    /// Identifier text
    pub name: &'ast str,
    /// Source location
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    /// Create a new identifier.
    pub fn new(name: &'ast str, span: Span) -> Self {
        Self { name, span }
    }
}

/// Binding result attached to an AST node.
///
/// Empty until the binder resolves the node; afterwards it holds the
/// handle of the declaration the node refers to (or declares).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclCell(Cell<Option<DeclId>>);

impl DeclCell {
    /// The attached declaration, if bound.
    #[inline]
    pub fn get(&self) -> Option<DeclId> {
        self.0.get()
    }

    /// Attach a declaration.
    #[inline]
    pub fn set(&self, id: DeclId) {
        self.0.set(Some(id));
    }

    /// Whether a declaration is attached.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.0.get().is_some()
    }
}
