//! Bytecode emitter.
//!
//! The [`Emitter`] appends instructions to the module-wide [`CodeBuffer`]
//! and tracks the evaluation stack depth of the function being emitted.
//! Every instruction adjusts the depth by its stack effect; the maximum seen
//! is the function's evaluation overhead reported to the analyzer.
//!
//! Forward jumps are written with a placeholder operand whose position goes
//! into a [`PatchChain`]; the chain is resolved once the target is emitted.
//!
//! # Example
//!
//! ```
//! use sable_compiler::bytecode::{CodeBuffer, OpCode, PatchChain};
//! use sable_compiler::emit::Emitter;
//!
//! let mut code = CodeBuffer::new();
//! let mut emitter = Emitter::new(&mut code, 0x8000);
//!
//! let mut skip = PatchChain::new();
//! emitter.emit_int(0);
//! emitter.emit_jump(OpCode::JumpIfFalse, &mut skip);
//! emitter.emit_int(7);
//! emitter.emit(OpCode::Pop);
//! emitter.bind_here(&mut skip).unwrap();
//!
//! assert_eq!(emitter.max_depth(), 1);
//! assert!(skip.is_empty());
//! ```

mod jumps;

pub use jumps::{LoopContext, LoopStack};

use sable_core::CompilationError;

use crate::bytecode::{CodeBuffer, OpCode, PatchChain, UNRESOLVED};

/// Emits bytecode for one function at a time into a shared buffer.
pub struct Emitter<'c> {
    /// Module-wide code buffer
    code: &'c mut CodeBuffer,

    /// Highest code size allowed
    limit: usize,

    /// Current source line for the line table
    line: u32,

    /// Evaluation depth at the write cursor
    depth: u32,

    /// Maximum evaluation depth of the current function
    max_depth: u32,

    /// Enclosing loops of the current function
    loops: LoopStack,
}

impl<'c> Emitter<'c> {
    /// Create an emitter appending to `code`, which may grow to `limit` bytes.
    pub fn new(code: &'c mut CodeBuffer, limit: usize) -> Self {
        Self {
            code,
            limit,
            line: 0,
            depth: 0,
            max_depth: 0,
            loops: LoopStack::new(),
        }
    }

    /// Reset per-function state.
    pub fn begin_function(&mut self) {
        self.depth = 0;
        self.max_depth = 0;
        self.loops.clear();
    }

    /// Set the source line recorded for subsequent instructions.
    pub fn set_line(&mut self, line: u32) {
        if line != 0 {
            self.line = line;
        }
    }

    // ==========================================================================
    // Depth tracking
    // ==========================================================================

    /// Evaluation depth at the write cursor.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Maximum evaluation depth of the current function.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Set the depth at a join point or after an unconditional transfer.
    pub fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
        self.max_depth = self.max_depth.max(depth);
    }

    fn adjust(&mut self, effect: i32) {
        let depth = self.depth.saturating_add_signed(effect);
        self.set_depth(depth);
    }

    // ==========================================================================
    // Basic emission
    // ==========================================================================

    /// Emit an opcode without operands.
    pub fn emit(&mut self, op: OpCode) {
        self.code.write_op(op, self.line);
        self.adjust(op.stack_effect().unwrap_or(0));
    }

    /// Emit an opcode with an 8-bit operand.
    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.code.write_op(op, self.line);
        self.code.write_byte(byte, self.line);
        self.adjust(op.stack_effect().unwrap_or(0));
    }

    /// Emit an opcode with a 16-bit operand.
    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.code.write_op(op, self.line);
        self.code.write_u16(value, self.line);
        self.adjust(op.stack_effect().unwrap_or(0));
    }

    /// Push an integer with the shortest encoding.
    pub fn emit_int(&mut self, value: i32) {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => {
                if let Ok(byte) = i8::try_from(value) {
                    self.emit_byte(OpCode::PushByte, byte as u8);
                } else if let Ok(short) = i16::try_from(value) {
                    self.emit_u16(OpCode::PushShort, short as u16);
                } else {
                    self.code.write_op(OpCode::PushInt, self.line);
                    self.code.write_i32(value, self.line);
                    self.adjust(1);
                }
            }
        }
    }

    /// Pop `count` values.
    pub fn emit_pop_n(&mut self, count: u32) {
        match count {
            0 => {}
            1 => self.emit(OpCode::Pop),
            _ => {
                let mut left = count;
                while left > 0 {
                    let chunk = left.min(u32::from(u8::MAX));
                    self.code.write_op(OpCode::PopN, self.line);
                    self.code.write_byte(chunk as u8, self.line);
                    self.adjust(-(chunk as i32));
                    left -= chunk;
                }
            }
        }
    }

    /// Emit a call-family instruction with a 16-bit target and argument
    /// count. Returns the position of the target operand.
    pub fn emit_call(&mut self, op: OpCode, target: u16, argc: u8) -> usize {
        self.code.write_op(op, self.line);
        let site = self.code.current_offset();
        self.code.write_u16(target, self.line);
        self.code.write_byte(argc, self.line);
        self.adjust(1 - i32::from(argc));
        site
    }

    /// Emit an indirect call: pops the function value and `argc` arguments.
    pub fn emit_funcall(&mut self, argc: u8) {
        self.code.write_op(OpCode::FunCall, self.line);
        self.code.write_byte(argc, self.line);
        self.adjust(-i32::from(argc));
    }

    /// Emit a `PushAddr` and return the position of its operand.
    pub fn emit_address(&mut self, address: Option<u16>) -> usize {
        self.code.write_op(OpCode::PushAddr, self.line);
        let site = self.code.current_offset();
        self.code.write_u16(address.unwrap_or(UNRESOLVED), self.line);
        self.adjust(1);
        site
    }

    /// Emit raw table bytes (jump table entries).
    pub fn emit_raw_u16(&mut self, value: u16) -> usize {
        let site = self.code.current_offset();
        self.code.write_u16(value, self.line);
        site
    }

    /// Emit a raw i32 (jump table keys).
    pub fn emit_raw_i32(&mut self, value: i32) {
        self.code.write_i32(value, self.line);
    }

    /// Emit an opcode whose operands the caller writes (jump tables).
    pub fn emit_raw_op(&mut self, op: OpCode) {
        self.code.write_op(op, self.line);
        self.adjust(op.stack_effect().unwrap_or(0));
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    /// Current write position as a code address.
    pub fn label(&self) -> Result<u16, CompilationError> {
        let offset = self.code.current_offset();
        if offset >= self.limit {
            return Err(CompilationError::CodeTooLarge {
                size: offset,
                limit: self.limit,
            });
        }
        u16::try_from(offset).map_err(|_| CompilationError::CodeTooLarge {
            size: offset,
            limit: self.limit,
        })
    }

    /// Emit a forward jump whose target joins `chain`.
    pub fn emit_jump(&mut self, op: OpCode, chain: &mut PatchChain) {
        debug_assert!(op.is_jump(), "{} is not a jump", op.name());
        self.code.write_op(op, self.line);
        chain.push(self.code.current_offset());
        self.code.write_u16(UNRESOLVED, self.line);
        self.adjust(op.stack_effect().unwrap_or(0));
    }

    /// Emit a jump to an already emitted address.
    pub fn emit_jump_to(&mut self, op: OpCode, target: u16) {
        debug_assert!(op.is_jump(), "{} is not a jump", op.name());
        self.emit_u16(op, target);
    }

    /// Resolve `chain` to the current position.
    pub fn bind_here(&mut self, chain: &mut PatchChain) -> Result<(), CompilationError> {
        if chain.is_empty() {
            return Ok(());
        }
        let target = self.label()?;
        chain.resolve(self.code, target)
    }

    /// Resolve `chain` to a known address.
    pub fn resolve(&mut self, chain: &mut PatchChain, target: u16) -> Result<(), CompilationError> {
        chain.resolve(self.code, target)
    }

    /// Write `target` into a single operand position.
    pub fn patch(&mut self, site: usize, target: u16) -> Result<(), CompilationError> {
        if self.code.patch_u16(site, target) {
            Ok(())
        } else {
            Err(CompilationError::internal(format!(
                "patch site {site} lies outside the code buffer"
            )))
        }
    }

    // ==========================================================================
    // Loops
    // ==========================================================================

    /// Loop contexts of the current function.
    pub fn loops(&mut self) -> &mut LoopStack {
        &mut self.loops
    }

    /// Leave the stack as the innermost loop found it and jump to its exit
    /// (`is_break`) or next-iteration point.
    pub fn emit_loop_exit(&mut self, is_break: bool) -> Result<(), CompilationError> {
        let depth = self.depth;
        let loop_depth = self
            .loops
            .current()
            .map(|ctx| ctx.depth)
            .ok_or_else(|| CompilationError::internal("loop control outside of a loop"))?;

        self.emit_pop_n(depth.saturating_sub(loop_depth));

        let mut chain = PatchChain::new();
        self.emit_jump(OpCode::Jump, &mut chain);
        if let Some(ctx) = self.loops.current() {
            if is_break {
                ctx.break_chain.append(&mut chain);
            } else {
                ctx.next_chain.append(&mut chain);
            }
        }
        self.set_depth(depth);
        Ok(())
    }

    // ==========================================================================
    // Limits
    // ==========================================================================

    /// Bytes in the buffer.
    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    /// Fail if the buffer outgrew the addressable range.
    pub fn check_size(&self) -> Result<(), CompilationError> {
        let size = self.code.len();
        if size > self.limit {
            return Err(CompilationError::CodeTooLarge {
                size,
                limit: self.limit,
            });
        }
        Ok(())
    }
}
