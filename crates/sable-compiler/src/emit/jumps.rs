//! Loop contexts for `break` and `next`.
//!
//! Both targets of a loop may lie ahead of the jumps that use them (the exit
//! always does, the `for` increment point does too), so each loop keeps two
//! patch chains that the loop resolves once it has emitted the target.

use crate::bytecode::PatchChain;

/// Stack of enclosing loops, innermost last.
#[derive(Debug, Default)]
pub struct LoopStack {
    loops: Vec<LoopContext>,
}

/// Pending jumps of one loop.
#[derive(Debug, Default)]
pub struct LoopContext {
    /// Jumps to the first instruction after the loop.
    pub break_chain: PatchChain,
    /// Jumps to the point that starts the next iteration.
    pub next_chain: PatchChain,
    /// Evaluation depth when the loop started.
    pub depth: u32,
}

impl LoopStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a loop that starts at evaluation depth `depth`.
    pub fn enter(&mut self, depth: u32) {
        self.loops.push(LoopContext {
            depth,
            ..LoopContext::default()
        });
    }

    /// Leave the innermost loop, handing back its pending jumps.
    pub fn exit(&mut self) -> Option<LoopContext> {
        self.loops.pop()
    }

    /// The innermost loop.
    pub fn current(&mut self) -> Option<&mut LoopContext> {
        self.loops.last_mut()
    }

    /// Number of enclosing loops.
    pub fn depth(&self) -> usize {
        self.loops.len()
    }

    /// Forget every loop (start of a new function body).
    pub fn clear(&mut self) {
        self.loops.clear();
    }
}
