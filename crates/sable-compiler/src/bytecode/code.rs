//! Module-wide code buffer.
//!
//! All functions of a module are appended to one [`CodeBuffer`], so jump and
//! call operands are absolute addresses into it.

use super::OpCode;

/// Placeholder written into operands that are patched later.
pub const UNRESOLVED: u16 = 0xFFFF;

/// Append-only bytecode with a line table.
#[derive(Debug, Clone, Default)]
pub struct CodeBuffer {
    /// The bytecode instructions.
    code: Vec<u8>,
    /// Source line for each byte in `code`.
    lines: Vec<u32>,
}

impl CodeBuffer {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an opcode.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    /// Write a byte operand.
    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    /// Write a 32-bit operand (big-endian).
    pub fn write_i32(&mut self, value: i32, line: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    /// Offset the next byte will be written at.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Overwrite a 16-bit operand.
    ///
    /// Returns `false` if the operand lies outside the written code.
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> bool {
        match self.code.get_mut(offset..offset + 2) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_be_bytes());
                true
            }
            None => false,
        }
    }

    /// Get the bytecode.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Get the line numbers.
    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    /// Get the line number for a given offset.
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    /// Get the length of the bytecode.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Read a byte at the given offset.
    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        super::read_u16(&self.code, offset)
    }

    /// Read an opcode at the given offset.
    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// Extract the opcodes in `range`, skipping operands.
    pub fn opcodes_in(&self, range: std::ops::Range<usize>) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = range.start;

        while offset < range.end.min(self.code.len()) {
            match (self.read_op(offset), super::instruction_len(&self.code, offset)) {
                (Some(op), Some(len)) => {
                    ops.push(op);
                    offset += len;
                }
                // Invalid opcode, skip one byte
                _ => offset += 1,
            }
        }

        ops
    }

    /// Extract all opcodes, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.opcodes_in(0..self.code.len())
    }

    /// Consume the buffer.
    pub fn into_parts(self) -> (Vec<u8>, Vec<u32>) {
        (self.code, self.lines)
    }
}
