//! Text rendering of bytecode, used in diagnostics and tests.

use std::fmt::Write;

use super::{OpCode, instruction_len, read_i32, read_u16};

/// Render `code` one instruction per line: `address  NAME operands`.
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;

    while offset < code.len() {
        let Some(len) = instruction_len(code, offset) else {
            let _ = writeln!(out, "{offset:04x}  .byte {:#04x}", code[offset]);
            offset += 1;
            continue;
        };
        let _ = writeln!(out, "{offset:04x}  {}", render(code, offset));
        offset += len;
    }

    out
}

fn render(code: &[u8], offset: usize) -> String {
    let Some(op) = code.get(offset).and_then(|&b| OpCode::from_u8(b)) else {
        return String::from("?");
    };
    let at = offset + 1;
    let u8_at = |pos: usize| code.get(pos).copied().unwrap_or_default();
    let u16_at = |pos: usize| read_u16(code, pos).unwrap_or_default();
    let i32_at = |pos: usize| read_i32(code, pos).unwrap_or_default();

    match op {
        OpCode::PushByte => format!("{} {}", op.name(), u8_at(at) as i8),
        OpCode::PushShort => format!("{} {}", op.name(), u16_at(at) as i16),
        OpCode::PushInt => format!("{} {}", op.name(), i32_at(at)),
        OpCode::PopN
        | OpCode::LoadLocal
        | OpCode::StoreLocal
        | OpCode::LoadArg
        | OpCode::StoreArg
        | OpCode::Enter
        | OpCode::FunCall => format!("{} {}", op.name(), u8_at(at)),
        OpCode::LoadGlobal | OpCode::StoreGlobal => format!("{} {}", op.name(), u16_at(at)),
        OpCode::PushAddr | OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue => {
            format!("{} {:04x}", op.name(), u16_at(at))
        }
        OpCode::Call => format!("{} {:04x} {}", op.name(), u16_at(at), u8_at(at + 2)),
        OpCode::CallExternal | OpCode::CallNative => {
            format!("{} #{} {}", op.name(), u16_at(at), u8_at(at + 2))
        }
        OpCode::JumpTable => {
            let low = i32_at(at);
            let count = u16_at(at + 4) as usize;
            let mut text = format!("{} default {:04x}", op.name(), u16_at(at + 6));
            for i in 0..count {
                let _ = write!(text, ", {}: {:04x}", low + i as i32, u16_at(at + 8 + 2 * i));
            }
            text
        }
        OpCode::JumpLookup => {
            let count = u16_at(at) as usize;
            let mut text = format!("{} default {:04x}", op.name(), u16_at(at + 2));
            for i in 0..count {
                let entry = at + 4 + 6 * i;
                let _ = write!(text, ", {}: {:04x}", i32_at(entry), u16_at(entry + 4));
            }
            text
        }
        _ => op.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeBuffer;

    #[test]
    fn renders_operands() {
        let mut code = CodeBuffer::new();
        code.write_op(OpCode::Enter, 1);
        code.write_byte(0, 1);
        code.write_op(OpCode::PushByte, 1);
        code.write_byte(-3i8 as u8, 1);
        code.write_op(OpCode::JumpIfFalse, 1);
        code.write_u16(0x0010, 1);
        code.write_op(OpCode::Return, 1);

        let text = disassemble(code.code());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0000  ENTER 0",
                "0002  PUSH_BYTE -3",
                "0004  JUMP_IF_FALSE 0010",
                "0007  RETURN",
            ]
        );
    }

    #[test]
    fn renders_lookup_tables() {
        let mut code = CodeBuffer::new();
        code.write_op(OpCode::JumpLookup, 1);
        code.write_u16(1, 1);
        code.write_u16(0x0020, 1);
        code.write_i32(500, 1);
        code.write_u16(0x0030, 1);

        assert_eq!(
            disassemble(code.code()).trim_end(),
            "0000  JUMP_LOOKUP default 0020, 500: 0030"
        );
    }

    #[test]
    fn unknown_bytes_are_shown_raw() {
        assert_eq!(disassemble(&[0xFE]).trim_end(), "0000  .byte 0xfe");
    }
}
