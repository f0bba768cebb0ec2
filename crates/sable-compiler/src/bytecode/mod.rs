//! Bytecode structures.
//!
//! This module contains the instruction set, the module-wide code buffer,
//! patch chains for forward references, and a disassembler.

mod code;
mod disasm;
mod opcode;
mod patch;

pub use code::{CodeBuffer, UNRESOLVED};
pub use disasm::disassemble;
pub use opcode::{EXTERNAL_FUNCTION_BIT, OpCode};
pub use patch::PatchChain;

/// Read a big-endian u16.
pub fn read_u16(code: &[u8], offset: usize) -> Option<u16> {
    let bytes = code.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian i32.
pub fn read_i32(code: &[u8], offset: usize) -> Option<i32> {
    let bytes = code.get(offset..offset.checked_add(4)?)?;
    Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Length in bytes of the instruction starting at `offset`, operands and
/// jump tables included.
pub fn instruction_len(code: &[u8], offset: usize) -> Option<usize> {
    let op = OpCode::from_u8(*code.get(offset)?)?;
    let fixed = 1 + op.operand_size();
    let len = match op {
        OpCode::JumpTable => fixed + 2 * read_u16(code, offset + 5)? as usize,
        OpCode::JumpLookup => fixed + 6 * read_u16(code, offset + 1)? as usize,
        _ => fixed,
    };
    (offset + len <= code.len()).then_some(len)
}
