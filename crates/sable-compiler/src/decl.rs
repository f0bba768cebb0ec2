//! Declarations and the arena that owns them.
//!
//! Every definition site creates exactly one [`Declaration`]. AST nodes keep
//! its [`DeclId`]; the record itself lives in the [`DeclArena`] for the
//! whole module build. Upgrading a forward declaration to a function
//! replaces the kind in place, so every node bound earlier sees the change.

use bitflags::bitflags;
use sable_core::{CompilationError, DeclId, HostFunction, Span};

use crate::bytecode::PatchChain;

bitflags! {
    /// Properties of a compiled function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FunctionFlags: u8 {
        /// Callable by the host as an entry point.
        const EXPORTED = 1 << 0;
        /// Promoted from an anonymous function.
        const LAMBDA = 1 << 1;
        /// Part of, or reaches, a call cycle.
        const RECURSIVE = 1 << 2;
        /// Contains a call through a function value.
        const CALLS_INDIRECTLY = 1 << 3;
        /// Reaches an indirect call through its callees.
        const REACHES_INDIRECT = 1 << 4;
        /// Call depth and stack usage are bounded.
        const DEPTH_KNOWN = 1 << 5;
    }
}

/// Per-function record shared by forward declarations and definitions.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo {
    /// Declared parameter count.
    pub arg_count: usize,
    /// High-water mark of simultaneously live locals.
    pub local_count: usize,
    /// Entry address once the body has been emitted.
    pub address: Option<u16>,
    /// Call sites and address loads waiting for the entry address.
    pub pending: PatchChain,
    /// Function properties.
    pub flags: FunctionFlags,
    /// Deepest evaluation stack reached by the body.
    pub max_eval_depth: u32,
    /// Functions called directly (deduplicated, in first-call order).
    pub callees: Vec<DeclId>,
    /// Longest call chain starting here (`None` = unbounded).
    pub call_depth: Option<u32>,
    /// Worst-case cumulative stack usage in cells (`None` = unbounded).
    pub stack_usage: Option<u32>,
}

impl FunctionInfo {
    /// A function with `arg_count` parameters.
    pub fn new(arg_count: usize) -> Self {
        Self {
            arg_count,
            ..Self::default()
        }
    }

    /// Record a direct callee.
    pub fn add_callee(&mut self, callee: DeclId) {
        if !self.callees.contains(&callee) {
            self.callees.push(callee);
        }
    }
}

/// Global storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalInfo {
    /// First cell.
    pub offset: u32,
    /// Number of cells (1 for scalars).
    pub size: u32,
    /// Folded initial values; missing trailing cells are zero.
    pub init: Vec<i32>,
    /// Declared as an array (its name evaluates to its address).
    pub is_array: bool,
}

/// What a name denotes.
#[derive(Debug, Clone)]
pub enum DeclKind {
    /// Folded constant; no storage.
    Constant(i32),
    /// Global cell(s).
    Global(GlobalInfo),
    /// Local frame slot.
    Local(u32),
    /// Argument index.
    Argument(u32),
    /// Function with a body.
    Function(FunctionInfo),
    /// Forward-declared function awaiting its body.
    Forward(FunctionInfo),
    /// Bytecode function exported by another module.
    External(HostFunction),
    /// Function implemented by the host.
    Native(HostFunction),
}

impl DeclKind {
    /// Human-readable label for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            DeclKind::Constant(_) => "constant",
            DeclKind::Global(_) => "global",
            DeclKind::Local(_) => "local",
            DeclKind::Argument(_) => "argument",
            DeclKind::Function(_) => "function",
            DeclKind::Forward(_) => "forward function",
            DeclKind::External(_) => "external function",
            DeclKind::Native(_) => "native function",
        }
    }

    /// Whether call syntax applies directly.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            DeclKind::Function(_) | DeclKind::Forward(_) | DeclKind::External(_) | DeclKind::Native(_)
        )
    }

    /// Whether the name denotes assignable storage.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            DeclKind::Global(_) | DeclKind::Local(_) | DeclKind::Argument(_)
        )
    }

    /// Parameter count, when known.
    pub fn arity(&self) -> Option<usize> {
        match self {
            DeclKind::Function(info) | DeclKind::Forward(info) => Some(info.arg_count),
            DeclKind::External(host) | DeclKind::Native(host) => host.arity,
            _ => None,
        }
    }
}

/// A named entity.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Declared name (empty for synthetic slots).
    pub name: String,
    /// Definition site.
    pub span: Span,
    /// What the name denotes.
    pub kind: DeclKind,
}

/// Owns all declarations of a module build.
#[derive(Debug, Default)]
pub struct DeclArena {
    decls: Vec<Declaration>,
}

impl DeclArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a declaration.
    pub fn alloc(&mut self, name: impl Into<String>, span: Span, kind: DeclKind) -> DeclId {
        let id = DeclId::new(self.decls.len() as u32);
        self.decls.push(Declaration {
            name: name.into(),
            span,
            kind,
        });
        id
    }

    /// Look up a declaration.
    pub fn get(&self, id: DeclId) -> Option<&Declaration> {
        self.decls.get(id.index())
    }

    /// Look up a declaration for modification.
    pub fn get_mut(&mut self, id: DeclId) -> Option<&mut Declaration> {
        self.decls.get_mut(id.index())
    }

    /// Look up a declaration, treating a dangling handle as a compiler defect.
    pub fn expect(&self, id: DeclId) -> Result<&Declaration, CompilationError> {
        self.get(id)
            .ok_or_else(|| CompilationError::internal(format!("dangling declaration {id}")))
    }

    /// Mutable variant of [`expect`](Self::expect).
    pub fn expect_mut(&mut self, id: DeclId) -> Result<&mut Declaration, CompilationError> {
        self.get_mut(id)
            .ok_or_else(|| CompilationError::internal(format!("dangling declaration {id}")))
    }

    /// Function record of a defined or forward function.
    pub fn function(&self, id: DeclId) -> Option<&FunctionInfo> {
        match &self.get(id)?.kind {
            DeclKind::Function(info) | DeclKind::Forward(info) => Some(info),
            _ => None,
        }
    }

    /// Mutable function record of a defined or forward function.
    pub fn function_mut(&mut self, id: DeclId) -> Option<&mut FunctionInfo> {
        match &mut self.get_mut(id)?.kind {
            DeclKind::Function(info) | DeclKind::Forward(info) => Some(info),
            _ => None,
        }
    }

    /// Turn a forward declaration into a definition, keeping its pending
    /// call sites.
    pub fn upgrade_forward(&mut self, id: DeclId) -> Result<(), CompilationError> {
        let decl = self.expect_mut(id)?;
        match std::mem::replace(&mut decl.kind, DeclKind::Constant(0)) {
            DeclKind::Forward(mut info) => {
                info.address = None;
                decl.kind = DeclKind::Function(info);
                Ok(())
            }
            other => {
                decl.kind = other;
                Err(CompilationError::internal(format!(
                    "'{}' is not a forward declaration",
                    decl.name
                )))
            }
        }
    }

    /// Iterate over all declarations with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId::new(i as u32), d))
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
