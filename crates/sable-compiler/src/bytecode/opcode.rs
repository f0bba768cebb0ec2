//! Bytecode operation codes.
//!
//! This module defines the instruction set of the Sable VM. Each opcode is a
//! single byte, operands follow inline in big-endian order. Every value on
//! the evaluation stack is a 32-bit signed cell.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
///
/// The VM is a stack machine: most operations pop their operands from the
/// evaluation stack and push the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push 0.
    PushZero = 0,
    /// Push 1.
    PushOne,
    /// Push a small constant.
    /// Operand: i8
    PushByte,
    /// Push a 16-bit constant.
    /// Operand: i16
    PushShort,
    /// Push a 32-bit constant.
    /// Operand: i32
    PushInt,
    /// Push the entry address of a function.
    /// Operand: u16 code address (patchable)
    PushAddr,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    /// Pop top of stack.
    Pop,
    /// Pop N values.
    /// Operand: u8 count
    PopN,
    /// Duplicate top of stack.
    Dup,

    // =========================================================================
    // Storage
    // =========================================================================
    /// Push a local slot.
    /// Operand: u8 slot
    LoadLocal,
    /// Pop into a local slot.
    /// Operand: u8 slot
    StoreLocal,
    /// Push an argument.
    /// Operand: u8 index
    LoadArg,
    /// Pop into an argument.
    /// Operand: u8 index
    StoreArg,
    /// Push a global cell.
    /// Operand: u16 offset
    LoadGlobal,
    /// Pop into a global cell.
    /// Operand: u16 offset
    StoreGlobal,
    /// Replace the address on top of stack with the global cell it names.
    LoadIndirect,
    /// Pop an address, then a value, and store the value at the address.
    StoreIndirect,

    // =========================================================================
    // Arithmetic and bitwise
    // =========================================================================
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Division (traps on zero).
    Div,
    /// Remainder (traps on zero).
    Mod,
    /// Arithmetic negation.
    Neg,
    /// Bitwise and.
    BitAnd,
    /// Bitwise or.
    BitOr,
    /// Bitwise exclusive or.
    BitXor,
    /// Bitwise complement.
    BitNot,
    /// Shift left.
    Shl,
    /// Arithmetic shift right.
    Shr,
    /// Logical not: 0 becomes 1, anything else 0.
    Not,

    // =========================================================================
    // Comparisons (push 1 or 0)
    // =========================================================================
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater or equal.
    Ge,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional jump.
    /// Operand: u16 absolute address
    Jump,
    /// Pop; jump if zero.
    /// Operand: u16 absolute address
    JumpIfFalse,
    /// Pop; jump if non-zero.
    /// Operand: u16 absolute address
    JumpIfTrue,
    /// Pop a key and jump through a dense table.
    /// Operands: i32 low key, u16 count, u16 default, then `count` u16 targets
    JumpTable,
    /// Pop a key and jump through a sorted key/target list.
    /// Operands: u16 count, u16 default, then `count` (i32 key, u16 target) pairs
    JumpLookup,

    // =========================================================================
    // Functions
    // =========================================================================
    /// Reserve the local frame on function entry.
    /// Operand: u8 local count
    Enter,
    /// Call a bytecode function of this module.
    /// Operands: u16 address (patchable), u8 argument count
    Call,
    /// Call a bytecode function exported by another module.
    /// Operands: u16 host id, u8 argument count
    CallExternal,
    /// Call a native host function.
    /// Operands: u16 host id, u8 argument count
    CallNative,
    /// Pop a function value and call it with the arguments below it.
    /// Operand: u8 argument count
    FunCall,
    /// Pop the result and return to the caller.
    Return,
}

/// Function values with this bit set name an external function id rather
/// than a code address.
pub const EXTERNAL_FUNCTION_BIT: i32 = 0x8000;

impl OpCode {
    /// Decode a byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }

    /// Size of the fixed operand part in bytes.
    ///
    /// `JumpTable` and `JumpLookup` are followed by a variable-length table;
    /// see [`instruction_len`](super::instruction_len).
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::PushZero
            | OpCode::PushOne
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::LoadIndirect
            | OpCode::StoreIndirect
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Neg
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::BitNot
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Not
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::Return => 0,

            OpCode::PushByte
            | OpCode::PopN
            | OpCode::LoadLocal
            | OpCode::StoreLocal
            | OpCode::LoadArg
            | OpCode::StoreArg
            | OpCode::Enter
            | OpCode::FunCall => 1,

            OpCode::PushShort
            | OpCode::PushAddr
            | OpCode::LoadGlobal
            | OpCode::StoreGlobal
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue => 2,

            OpCode::Call | OpCode::CallExternal | OpCode::CallNative => 3,

            OpCode::PushInt => 4,
            OpCode::JumpLookup => 4,
            OpCode::JumpTable => 8,
        }
    }

    /// Net change of the evaluation stack depth.
    ///
    /// Returns `None` when the effect depends on an operand (`PopN`, calls).
    pub fn stack_effect(&self) -> Option<i32> {
        Some(match self {
            OpCode::PushZero
            | OpCode::PushOne
            | OpCode::PushByte
            | OpCode::PushShort
            | OpCode::PushInt
            | OpCode::PushAddr
            | OpCode::Dup
            | OpCode::LoadLocal
            | OpCode::LoadArg
            | OpCode::LoadGlobal => 1,

            OpCode::LoadIndirect
            | OpCode::Neg
            | OpCode::BitNot
            | OpCode::Not
            | OpCode::Jump
            | OpCode::Enter => 0,

            OpCode::Pop
            | OpCode::StoreLocal
            | OpCode::StoreArg
            | OpCode::StoreGlobal
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::JumpTable
            | OpCode::JumpLookup
            | OpCode::Return => -1,

            OpCode::StoreIndirect => -2,

            OpCode::PopN
            | OpCode::Call
            | OpCode::CallExternal
            | OpCode::CallNative
            | OpCode::FunCall => return None,
        })
    }

    /// Whether this is a jump whose u16 operand is a code address.
    pub fn is_jump(&self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue)
    }

    /// Get the name of this opcode for debugging.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::PushByte => "PUSH_BYTE",
            OpCode::PushShort => "PUSH_SHORT",
            OpCode::PushInt => "PUSH_INT",
            OpCode::PushAddr => "PUSH_ADDR",
            OpCode::Pop => "POP",
            OpCode::PopN => "POP_N",
            OpCode::Dup => "DUP",
            OpCode::LoadLocal => "LOAD_LOCAL",
            OpCode::StoreLocal => "STORE_LOCAL",
            OpCode::LoadArg => "LOAD_ARG",
            OpCode::StoreArg => "STORE_ARG",
            OpCode::LoadGlobal => "LOAD_GLOBAL",
            OpCode::StoreGlobal => "STORE_GLOBAL",
            OpCode::LoadIndirect => "LOAD_INDIRECT",
            OpCode::StoreIndirect => "STORE_INDIRECT",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::BitAnd => "BIT_AND",
            OpCode::BitOr => "BIT_OR",
            OpCode::BitXor => "BIT_XOR",
            OpCode::BitNot => "BIT_NOT",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Not => "NOT",
            OpCode::Eq => "EQ",
            OpCode::Ne => "NE",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Gt => "GT",
            OpCode::Ge => "GE",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::JumpTable => "JUMP_TABLE",
            OpCode::JumpLookup => "JUMP_LOOKUP",
            OpCode::Enter => "ENTER",
            OpCode::Call => "CALL",
            OpCode::CallExternal => "CALL_EXTERNAL",
            OpCode::CallNative => "CALL_NATIVE",
            OpCode::FunCall => "FUNCALL",
            OpCode::Return => "RETURN",
        }
    }
}
