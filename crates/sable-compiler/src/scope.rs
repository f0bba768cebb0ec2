//! Symbol environment.
//!
//! This module provides [`SymbolEnv`], the name tables used while binding:
//! - Module-wide constant, global and external tables (bottom of the stack)
//! - A stack of local scopes for the function being bound
//! - Local slot allocation with reuse across sibling scopes
//!
//! Each scope remembers how many slots were live when it opened. Closing it
//! releases its slots to the enclosing level, while the function-wide
//! high-water mark keeps the maximum ever live at once.

use rustc_hash::FxHashMap;
use sable_core::{CompilationError, DeclId, Span};

// ============================================================================
// Types
// ============================================================================

/// Where a name was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Local scope of the current function.
    Local(DeclId),
    /// Constant table.
    Constant(DeclId),
    /// Global table (data and functions of the module).
    Global(DeclId),
    /// Previously resolved host symbol.
    External(DeclId),
}

impl Lookup {
    /// The declaration found.
    pub fn id(self) -> DeclId {
        match self {
            Lookup::Local(id) | Lookup::Constant(id) | Lookup::Global(id) | Lookup::External(id) => id,
        }
    }
}

#[derive(Debug, Default)]
struct LocalScope {
    names: FxHashMap<String, DeclId>,
    /// Live slot count when the scope opened
    saved_live: u32,
}

// ============================================================================
// SymbolEnv
// ============================================================================

/// Name tables of one module build.
#[derive(Debug, Default)]
pub struct SymbolEnv {
    constants: FxHashMap<String, DeclId>,
    globals: FxHashMap<String, DeclId>,
    externals: FxHashMap<String, DeclId>,

    scopes: Vec<LocalScope>,
    live_locals: u32,
    max_locals: u32,

    global_base: u32,
    next_global: u32,
    lambda_count: u32,
}

impl SymbolEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Module-level tables
    // ==========================================================================

    /// Whether `name` is taken at module level (constants or globals).
    pub fn module_symbol(&self, name: &str) -> Option<DeclId> {
        self.constants
            .get(name)
            .or_else(|| self.globals.get(name))
            .copied()
    }

    /// Global (data or function) by name.
    pub fn global(&self, name: &str) -> Option<DeclId> {
        self.globals.get(name).copied()
    }

    /// Register a constant.
    pub fn define_constant(&mut self, name: &str, id: DeclId) {
        self.constants.insert(name.to_string(), id);
    }

    /// Register a global datum or function.
    pub fn define_global(&mut self, name: &str, id: DeclId) {
        self.globals.insert(name.to_string(), id);
    }

    /// Cache a host symbol.
    pub fn define_external(&mut self, name: &str, id: DeclId) {
        self.externals.insert(name.to_string(), id);
    }

    /// Keep the first `cells` global cells for the host.
    ///
    /// Module globals are placed above the reserved range. The range can
    /// only grow while the module has no globals of its own; on conflict the
    /// current base is returned as the error.
    pub fn reserve_host_globals(&mut self, cells: u32) -> Result<(), u32> {
        if cells <= self.global_base {
            return Ok(());
        }
        if self.next_global != self.global_base {
            return Err(self.global_base);
        }
        self.global_base = cells;
        self.next_global = cells;
        Ok(())
    }

    /// First cell owned by the module.
    pub fn global_base(&self) -> u32 {
        self.global_base
    }

    /// Reserve `size` global cells and return the first offset.
    pub fn allocate_global(&mut self, size: u32, span: Span) -> Result<u32, CompilationError> {
        let offset = self.next_global;
        match offset.checked_add(size) {
            Some(end) if end <= u32::from(u16::MAX) + 1 => {
                self.next_global = end;
                Ok(offset)
            }
            _ => Err(CompilationError::ValueOutOfRange {
                value: i64::from(offset) + i64::from(size),
                span,
            }),
        }
    }

    /// Global cells allocated so far, the host range included.
    pub fn global_size(&self) -> u32 {
        self.next_global
    }

    /// Next synthetic lambda name.
    pub fn next_lambda_name(&mut self) -> String {
        let name = format!("lambda#{}", self.lambda_count);
        self.lambda_count += 1;
        name
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Resolve a name: innermost local scope first, then constants, globals
    /// and cached host symbols.
    pub fn lookup(&self, name: &str) -> Option<Lookup> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.names.get(name) {
                return Some(Lookup::Local(id));
            }
        }
        if let Some(&id) = self.constants.get(name) {
            return Some(Lookup::Constant(id));
        }
        if let Some(&id) = self.globals.get(name) {
            return Some(Lookup::Global(id));
        }
        self.externals.get(name).map(|&id| Lookup::External(id))
    }

    // ==========================================================================
    // Function and scope management
    // ==========================================================================

    /// Start binding a function body.
    pub fn begin_function(&mut self) {
        self.scopes.clear();
        self.live_locals = 0;
        self.max_locals = 0;
    }

    /// Finish a function body and return its local high-water mark.
    pub fn end_function(&mut self) -> u32 {
        self.scopes.clear();
        self.live_locals = 0;
        self.max_locals
    }

    /// Open a scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(LocalScope {
            names: FxHashMap::default(),
            saved_live: self.live_locals,
        });
    }

    /// Close the innermost scope, releasing its slots.
    pub fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            self.live_locals = scope.saved_live;
        }
    }

    /// Current scope depth (0 = no function scope).
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether `name` is declared in the innermost scope.
    pub fn in_current_scope(&self, name: &str) -> Option<DeclId> {
        self.scopes.last()?.names.get(name).copied()
    }

    /// Bind `name` in the innermost scope.
    pub fn declare(&mut self, name: &str, id: DeclId) -> Result<(), CompilationError> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| CompilationError::internal(format!("'{name}' declared outside any scope")))?;
        scope.names.insert(name.to_string(), id);
        Ok(())
    }

    /// Take the next free local slot.
    pub fn allocate_slot(&mut self) -> u32 {
        let slot = self.live_locals;
        self.live_locals += 1;
        self.max_locals = self.max_locals.max(self.live_locals);
        slot
    }

    /// Slots live right now.
    pub fn live_locals(&self) -> u32 {
        self.live_locals
    }

    /// Function-wide high-water mark so far.
    pub fn max_locals(&self) -> u32 {
        self.max_locals
    }
}
