//! Compiler configuration.

/// Architectural limit on arguments and on simultaneously live locals.
pub const SLOT_LIMIT: usize = 127;

/// Code addresses must stay below this bit, which marks external functions.
pub const CODE_ADDRESS_LIMIT: usize = 0x8000;

/// What to do with recursive functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecursionPolicy {
    /// Recursion is an error.
    Reject,
    /// Recursion is reported as a warning.
    #[default]
    Warn,
}

/// Options controlling limits and policies of a module build.
///
/// ```
/// use sable_compiler::{CompilerOptions, RecursionPolicy};
///
/// let options = CompilerOptions::default()
///     .with_recursion(RecursionPolicy::Reject)
///     .with_max_stack_usage(256);
/// assert_eq!(options.max_locals, 127);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Maximum parameters per function.
    pub max_arguments: usize,
    /// Maximum simultaneously live locals per function.
    pub max_locals: usize,
    /// Handling of recursive functions.
    pub recursion: RecursionPolicy,
    /// Reject functions whose worst-case stack usage exceeds this many cells.
    pub max_stack_usage: Option<u32>,
    /// Maximum size of the code buffer in bytes.
    pub max_code_size: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            max_arguments: SLOT_LIMIT,
            max_locals: SLOT_LIMIT,
            recursion: RecursionPolicy::default(),
            max_stack_usage: None,
            max_code_size: CODE_ADDRESS_LIMIT,
        }
    }
}

impl CompilerOptions {
    /// Set the argument limit (clamped to 127).
    pub fn with_max_arguments(mut self, limit: usize) -> Self {
        self.max_arguments = limit.min(SLOT_LIMIT);
        self
    }

    /// Set the local limit (clamped to 127).
    pub fn with_max_locals(mut self, limit: usize) -> Self {
        self.max_locals = limit.min(SLOT_LIMIT);
        self
    }

    /// Set the recursion policy.
    pub fn with_recursion(mut self, policy: RecursionPolicy) -> Self {
        self.recursion = policy;
        self
    }

    /// Bound worst-case stack usage.
    pub fn with_max_stack_usage(mut self, cells: u32) -> Self {
        self.max_stack_usage = Some(cells);
        self
    }

    /// Set the code size limit (clamped to the addressable range).
    pub fn with_max_code_size(mut self, bytes: usize) -> Self {
        self.max_code_size = bytes.min(CODE_ADDRESS_LIMIT);
        self
    }

    /// Effective argument limit.
    pub(crate) fn argument_limit(&self) -> usize {
        self.max_arguments.min(SLOT_LIMIT)
    }

    /// Effective local limit.
    pub(crate) fn local_limit(&self) -> usize {
        self.max_locals.min(SLOT_LIMIT)
    }

    /// Effective code size limit.
    pub(crate) fn code_limit(&self) -> usize {
        self.max_code_size.min(CODE_ADDRESS_LIMIT)
    }
}
