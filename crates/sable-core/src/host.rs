//! Interface to the environment hosting compiled modules.
//!
//! Names the compiler cannot resolve inside a module are offered to a
//! [`HostEnvironment`]. The host answers with a function id and calling
//! convention (bytecode functions living in another module, or native
//! functions implemented by the host), or with the location of a global it
//! manages.
//!
//! Host globals live in the reserved range `0..reserved_globals()` of the
//! data segment; module globals are laid out after it. A host that shares
//! one global namespace between modules takes each finished module's
//! globals back through [`HostEnvironment::register_global`], so the next
//! module places its own globals above them.

use rustc_hash::FxHashMap;

/// How a host function is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// Bytecode in another module; called through the VM.
    Bytecode,
    /// Implemented by the host; runs on the host stack.
    Native,
}

/// A function provided by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFunction {
    /// Stable numeric id
    pub id: u16,
    /// Calling convention
    pub convention: CallingConvention,
    /// Parameter count, when the host knows it
    pub arity: Option<usize>,
    /// Worst-case VM stack usage of a bytecode function (`None` = unbounded)
    pub stack_usage: Option<u32>,
}

impl HostFunction {
    /// A native function.
    pub fn native(id: u16, arity: Option<usize>) -> Self {
        Self {
            id,
            convention: CallingConvention::Native,
            arity,
            stack_usage: Some(0),
        }
    }

    /// A bytecode function exported by another module.
    pub fn bytecode(id: u16, arity: Option<usize>, stack_usage: Option<u32>) -> Self {
        Self {
            id,
            convention: CallingConvention::Bytecode,
            arity,
            stack_usage,
        }
    }

    /// Whether the function runs natively on the host.
    pub fn is_native(&self) -> bool {
        self.convention == CallingConvention::Native
    }
}

/// A global cell range owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostGlobal {
    /// First cell
    pub offset: u32,
    /// Number of cells
    pub size: u32,
    /// The name evaluates to its address rather than its value
    pub is_array: bool,
}

impl HostGlobal {
    /// A single cell.
    pub fn scalar(offset: u32) -> Self {
        Self {
            offset,
            size: 1,
            is_array: false,
        }
    }

    /// `size` consecutive cells addressed through the first one.
    pub fn array(offset: u32, size: u32) -> Self {
        Self {
            offset,
            size,
            is_array: true,
        }
    }

    /// One past the last cell.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

/// Resolves free names against the host.
pub trait HostEnvironment {
    /// Look up a function by name.
    fn resolve_function(&self, name: &str) -> Option<HostFunction>;

    /// Look up a host-managed global by name.
    fn resolve_global(&self, _name: &str) -> Option<HostGlobal> {
        None
    }

    /// Cells at the bottom of the data segment that belong to the host.
    fn reserved_globals(&self) -> u32 {
        0
    }

    /// Take over a global defined by a compiled module.
    fn register_global(&mut self, _name: &str, _global: HostGlobal) {}
}

/// A host that provides nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl HostEnvironment for NoHost {
    fn resolve_function(&self, _name: &str) -> Option<HostFunction> {
        None
    }
}

/// Table-driven host environment.
///
/// ```
/// use sable_core::host::{HostEnvironment, HostTable};
///
/// let host = HostTable::new().with_native("print", 1, Some(1)).with_global("ticks", 200);
/// assert!(host.resolve_function("print").is_some_and(|f| f.is_native()));
/// assert_eq!(host.resolve_global("ticks").map(|g| g.offset), Some(200));
/// assert_eq!(host.reserved_globals(), 201);
/// ```
#[derive(Debug, Default, Clone)]
pub struct HostTable {
    functions: FxHashMap<String, HostFunction>,
    globals: FxHashMap<String, HostGlobal>,
    reserved: u32,
}

impl HostTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function.
    pub fn insert_function(&mut self, name: impl Into<String>, function: HostFunction) {
        self.functions.insert(name.into(), function);
    }

    /// Register a global; the reserved range grows to cover it.
    pub fn insert_global(&mut self, name: impl Into<String>, global: HostGlobal) {
        let end = u32::try_from(global.end()).unwrap_or(u32::MAX);
        self.reserved = self.reserved.max(end);
        self.globals.insert(name.into(), global);
    }

    /// Reserve at least `cells` cells for the host.
    pub fn reserve_globals(&mut self, cells: u32) {
        self.reserved = self.reserved.max(cells);
    }

    /// Builder-style native registration.
    pub fn with_native(mut self, name: &str, id: u16, arity: Option<usize>) -> Self {
        self.insert_function(name, HostFunction::native(id, arity));
        self
    }

    /// Builder-style bytecode registration.
    pub fn with_bytecode(
        mut self,
        name: &str,
        id: u16,
        arity: Option<usize>,
        stack_usage: Option<u32>,
    ) -> Self {
        self.insert_function(name, HostFunction::bytecode(id, arity, stack_usage));
        self
    }

    /// Builder-style scalar global registration.
    pub fn with_global(mut self, name: &str, offset: u32) -> Self {
        self.insert_global(name, HostGlobal::scalar(offset));
        self
    }
}

impl HostEnvironment for HostTable {
    fn resolve_function(&self, name: &str) -> Option<HostFunction> {
        self.functions.get(name).copied()
    }

    fn resolve_global(&self, name: &str) -> Option<HostGlobal> {
        self.globals.get(name).copied()
    }

    fn reserved_globals(&self) -> u32 {
        self.reserved
    }

    fn register_global(&mut self, name: &str, global: HostGlobal) {
        self.insert_global(name, global);
    }
}

impl<H: HostEnvironment + ?Sized> HostEnvironment for &H {
    fn resolve_function(&self, name: &str) -> Option<HostFunction> {
        (**self).resolve_function(name)
    }

    fn resolve_global(&self, name: &str) -> Option<HostGlobal> {
        (**self).resolve_global(name)
    }

    fn reserved_globals(&self) -> u32 {
        (**self).reserved_globals()
    }
}

impl<H: HostEnvironment + ?Sized> HostEnvironment for &mut H {
    fn resolve_function(&self, name: &str) -> Option<HostFunction> {
        (**self).resolve_function(name)
    }

    fn resolve_global(&self, name: &str) -> Option<HostGlobal> {
        (**self).resolve_global(name)
    }

    fn reserved_globals(&self) -> u32 {
        (**self).reserved_globals()
    }

    fn register_global(&mut self, name: &str, global: HostGlobal) {
        (**self).register_global(name, global);
    }
}
