//! Shared helpers for the integration tests.
//!
//! [`Machine`] is a small reference interpreter for the emitted bytecode. It
//! keeps the whole VM state on one cell stack, laid out the way the stack
//! analysis counts it:
//!
//! ```text
//! [args of callee] [return address] [saved frame] [locals] [evaluation]
//! ```
//!
//! so the peak it records can be compared with the analyzer's bound.

#![allow(dead_code)]

use bumpalo::Bump;
use rustc_hash::FxHashMap;
use sable::compiler::bytecode::{EXTERNAL_FUNCTION_BIT, read_i32, read_u16};
use sable::core::ast::{AstBuilder, Expr, Item, Param, Unit};
use sable::prelude::*;
use sable::{CompiledModule, Diagnostics, OpCode};

pub const AT: Span = Span::new(1, 1);

/// Instructions executed before a run is considered runaway.
const STEP_LIMIT: usize = 1_000_000;

/// Initialize logging once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// =============================================================================
// Fixtures
// =============================================================================

/// Arena plus builder for hand-written units.
pub struct Fixture {
    arena: Bump,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        Self { arena: Bump::new() }
    }

    pub fn builder(&self) -> AstBuilder<'_> {
        AstBuilder::new(&self.arena)
    }
}

/// A procedure with untyped parameters.
pub fn func<'a>(b: &AstBuilder<'a>, name: &str, params: &[&str], body: Vec<Expr<'a>>) -> Item<'a> {
    let params: Vec<Param<'a>> = params.iter().map(|p| b.param(p, AT)).collect();
    b.proc_decl(b.ident(name, AT), params, Some(body), false, AT)
}

/// An exported procedure.
pub fn export<'a>(b: &AstBuilder<'a>, name: &str, params: &[&str], body: Vec<Expr<'a>>) -> Item<'a> {
    let params: Vec<Param<'a>> = params.iter().map(|p| b.param(p, AT)).collect();
    b.proc_decl(b.ident(name, AT), params, Some(body), true, AT)
}

/// Compile units with default options and no host, panicking on errors.
pub fn build(units: &[Unit<'_>]) -> CompiledModule {
    build_with(units, &NoHost, CompilerOptions::default())
}

pub fn build_with(units: &[Unit<'_>], host: &dyn HostEnvironment, options: CompilerOptions) -> CompiledModule {
    let mut diagnostics = Diagnostics::new();
    match compile(units, host, options, &mut diagnostics) {
        Ok(module) => module,
        Err(err) => panic!("build failed: {err}\n{diagnostics}"),
    }
}

/// Compile units expecting a failure.
pub fn build_err(units: &[Unit<'_>], options: CompilerOptions) -> (CompilationError, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    match compile(units, &NoHost, options, &mut diagnostics) {
        Ok(module) => panic!("expected a build error, got:\n{}", module.disassemble()),
        Err(err) => (err, diagnostics),
    }
}

// =============================================================================
// Reference interpreter
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("no function named '{0}'")]
    UnknownFunction(String),
    #[error("invalid instruction at {0:04x}")]
    InvalidInstruction(usize),
    #[error("stack underflow at {0:04x}")]
    StackUnderflow(usize),
    #[error("division by zero at {0:04x}")]
    DivisionByZero(usize),
    #[error("data cell {0} out of range")]
    BadAddress(i32),
    #[error("native function {0} is not registered")]
    UnknownNative(u16),
    #[error("external function {0} is not linked")]
    Unlinked(u16),
    #[error("step limit exceeded")]
    StepLimit,
}

type NativeFn = Box<dyn Fn(&[i32]) -> i32>;

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// `None` returns to the host.
    return_pc: Option<usize>,
    args_base: usize,
    locals_base: usize,
}

/// Executes one compiled module.
pub struct Machine<'m> {
    module: &'m CompiledModule,
    pub data: Vec<i32>,
    stack: Vec<i32>,
    frames: Vec<Frame>,
    natives: FxHashMap<u16, NativeFn>,
    peak: usize,
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m CompiledModule) -> Self {
        Self {
            module,
            data: module.data.clone(),
            stack: Vec::new(),
            frames: Vec::new(),
            natives: FxHashMap::default(),
            peak: 0,
        }
    }

    /// Register a native host function under `id`.
    pub fn native(mut self, id: u16, f: impl Fn(&[i32]) -> i32 + 'static) -> Self {
        self.natives.insert(id, Box::new(f));
        self
    }

    /// Highest number of cells used by the last run, entry arguments excluded.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Call a function by name and run it to completion.
    pub fn call(&mut self, name: &str, args: &[i32]) -> Result<i32, VmError> {
        let entry = self
            .module
            .function(name)
            .ok_or_else(|| VmError::UnknownFunction(name.to_string()))?;
        log::debug!("running '{}' at {} with {:?}", name, entry.address, args);
        self.stack.clear();
        self.frames.clear();
        self.stack.extend_from_slice(args);
        let base = self.stack.len();
        self.peak = 0;

        self.enter(args.len(), None);
        let mut pc = usize::from(entry.address);
        for _ in 0..STEP_LIMIT {
            self.peak = self.peak.max(self.stack.len() - base);
            match self.step(pc)? {
                Some(next) => pc = next,
                None => {
                    log::trace!("'{}' returned, peak {} cell(s)", name, self.peak);
                    return self.pop(pc);
                }
            }
        }
        Err(VmError::StepLimit)
    }

    /// Push a frame for a call whose arguments are already on the stack.
    fn enter(&mut self, argc: usize, return_pc: Option<usize>) {
        let args_base = self.stack.len() - argc;
        let saved = self.frames.last().map_or(0, |f| f.locals_base as i32);
        self.stack.push(return_pc.map_or(-1, |pc| pc as i32));
        self.stack.push(saved);
        self.frames.push(Frame {
            return_pc,
            args_base,
            locals_base: self.stack.len(),
        });
    }

    fn frame(&self, pc: usize) -> Result<Frame, VmError> {
        self.frames.last().copied().ok_or(VmError::StackUnderflow(pc))
    }

    fn pop(&mut self, pc: usize) -> Result<i32, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow(pc))
    }

    fn byte(&self, at: usize) -> Result<u8, VmError> {
        self.module.code.get(at).copied().ok_or(VmError::InvalidInstruction(at))
    }

    fn u16_at(&self, at: usize) -> Result<u16, VmError> {
        read_u16(&self.module.code, at).ok_or(VmError::InvalidInstruction(at))
    }

    fn i32_at(&self, at: usize) -> Result<i32, VmError> {
        read_i32(&self.module.code, at).ok_or(VmError::InvalidInstruction(at))
    }

    fn cell(&self, address: i32) -> Result<usize, VmError> {
        usize::try_from(address)
            .ok()
            .filter(|&a| a < self.data.len())
            .ok_or(VmError::BadAddress(address))
    }

    /// Execute the instruction at `pc`; `None` once the entry function returned.
    fn step(&mut self, pc: usize) -> Result<Option<usize>, VmError> {
        let op = OpCode::from_u8(self.byte(pc)?).ok_or(VmError::InvalidInstruction(pc))?;
        let next = pc + 1 + op.operand_size();

        match op {
            OpCode::PushZero => self.stack.push(0),
            OpCode::PushOne => self.stack.push(1),
            OpCode::PushByte => self.stack.push(i32::from(self.byte(pc + 1)? as i8)),
            OpCode::PushShort => self.stack.push(i32::from(self.u16_at(pc + 1)? as i16)),
            OpCode::PushInt => self.stack.push(self.i32_at(pc + 1)?),
            OpCode::PushAddr => self.stack.push(i32::from(self.u16_at(pc + 1)?)),
            OpCode::Pop => {
                self.pop(pc)?;
            }
            OpCode::PopN => {
                for _ in 0..self.byte(pc + 1)? {
                    self.pop(pc)?;
                }
            }
            OpCode::Dup => {
                let top = *self.stack.last().ok_or(VmError::StackUnderflow(pc))?;
                self.stack.push(top);
            }

            OpCode::LoadLocal | OpCode::LoadArg => {
                let slot = self.slot(op, pc)?;
                self.stack.push(self.stack[slot]);
            }
            OpCode::StoreLocal | OpCode::StoreArg => {
                let slot = self.slot(op, pc)?;
                self.stack[slot] = self.pop(pc)?;
            }
            OpCode::LoadGlobal => {
                let cell = self.cell(i32::from(self.u16_at(pc + 1)?))?;
                self.stack.push(self.data[cell]);
            }
            OpCode::StoreGlobal => {
                let cell = self.cell(i32::from(self.u16_at(pc + 1)?))?;
                self.data[cell] = self.pop(pc)?;
            }
            OpCode::LoadIndirect => {
                let address = self.pop(pc)?;
                let cell = self.cell(address)?;
                self.stack.push(self.data[cell]);
            }
            OpCode::StoreIndirect => {
                let address = self.pop(pc)?;
                let value = self.pop(pc)?;
                let cell = self.cell(address)?;
                self.data[cell] = value;
            }

            OpCode::Neg => {
                let v = self.pop(pc)?;
                self.stack.push(v.wrapping_neg());
            }
            OpCode::BitNot => {
                let v = self.pop(pc)?;
                self.stack.push(!v);
            }
            OpCode::Not => {
                let v = self.pop(pc)?;
                self.stack.push(i32::from(v == 0));
            }
            OpCode::Add
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
            | OpCode::Ge => {
                let right = self.pop(pc)?;
                let left = self.pop(pc)?;
                self.stack.push(binary(op, left, right).ok_or(VmError::DivisionByZero(pc))?);
            }

            OpCode::Jump => return Ok(Some(usize::from(self.u16_at(pc + 1)?))),
            OpCode::JumpIfFalse | OpCode::JumpIfTrue => {
                let value = self.pop(pc)?;
                if (value != 0) == (op == OpCode::JumpIfTrue) {
                    return Ok(Some(usize::from(self.u16_at(pc + 1)?)));
                }
            }
            OpCode::JumpTable => {
                let key = self.pop(pc)?;
                let low = self.i32_at(pc + 1)?;
                let count = usize::from(self.u16_at(pc + 5)?);
                let mut target = self.u16_at(pc + 7)?;
                if let Some(index) = key.checked_sub(low).and_then(|i| usize::try_from(i).ok())
                    && index < count
                {
                    target = self.u16_at(pc + 9 + 2 * index)?;
                }
                return Ok(Some(usize::from(target)));
            }
            OpCode::JumpLookup => {
                let key = self.pop(pc)?;
                let count = usize::from(self.u16_at(pc + 1)?);
                let mut target = self.u16_at(pc + 3)?;
                for entry in 0..count {
                    let at = pc + 5 + 6 * entry;
                    if self.i32_at(at)? == key {
                        target = self.u16_at(at + 4)?;
                        break;
                    }
                }
                return Ok(Some(usize::from(target)));
            }

            OpCode::Enter => {
                let locals = self.byte(pc + 1)?;
                self.stack.extend(std::iter::repeat_n(0, usize::from(locals)));
            }
            OpCode::Call => {
                let target = usize::from(self.u16_at(pc + 1)?);
                let argc = usize::from(self.byte(pc + 3)?);
                self.enter(argc, Some(next));
                return Ok(Some(target));
            }
            OpCode::CallNative => {
                let id = self.u16_at(pc + 1)?;
                let argc = usize::from(self.byte(pc + 3)?);
                let native = self.natives.get(&id).ok_or(VmError::UnknownNative(id))?;
                let start = self.stack.len().checked_sub(argc).ok_or(VmError::StackUnderflow(pc))?;
                let result = native(&self.stack[start..]);
                self.stack.truncate(start);
                self.stack.push(result);
            }
            OpCode::CallExternal => return Err(VmError::Unlinked(self.u16_at(pc + 1)?)),
            OpCode::FunCall => {
                let callee = self.pop(pc)?;
                let argc = usize::from(self.byte(pc + 1)?);
                if callee & EXTERNAL_FUNCTION_BIT != 0 {
                    return Err(VmError::Unlinked(callee as u16 & 0x7FFF));
                }
                let target = usize::try_from(callee).map_err(|_| VmError::InvalidInstruction(pc))?;
                self.enter(argc, Some(next));
                return Ok(Some(target));
            }
            OpCode::Return => {
                let result = self.pop(pc)?;
                let frame = self.frames.pop().ok_or(VmError::StackUnderflow(pc))?;
                self.stack.truncate(frame.args_base);
                self.stack.push(result);
                return Ok(frame.return_pc);
            }
        }
        Ok(Some(next))
    }

    /// Stack index of a local slot or argument operand.
    fn slot(&self, op: OpCode, pc: usize) -> Result<usize, VmError> {
        let frame = self.frame(pc)?;
        let index = usize::from(self.byte(pc + 1)?);
        let slot = match op {
            OpCode::LoadLocal | OpCode::StoreLocal => frame.locals_base + index,
            _ => frame.args_base + index,
        };
        (slot < self.stack.len()).then_some(slot).ok_or(VmError::StackUnderflow(pc))
    }
}

fn binary(op: OpCode, left: i32, right: i32) -> Option<i32> {
    Some(match op {
        OpCode::Add => left.wrapping_add(right),
        OpCode::Sub => left.wrapping_sub(right),
        OpCode::Mul => left.wrapping_mul(right),
        OpCode::Div => left.checked_div(right).or_else(|| (right != 0).then(|| left.wrapping_div(right)))?,
        OpCode::Mod => left.checked_rem(right).or_else(|| (right != 0).then_some(0))?,
        OpCode::BitAnd => left & right,
        OpCode::BitOr => left | right,
        OpCode::BitXor => left ^ right,
        OpCode::Shl => left.wrapping_shl(right as u32),
        OpCode::Shr => left.wrapping_shr(right as u32),
        OpCode::Eq => i32::from(left == right),
        OpCode::Ne => i32::from(left != right),
        OpCode::Lt => i32::from(left < right),
        OpCode::Le => i32::from(left <= right),
        OpCode::Gt => i32::from(left > right),
        OpCode::Ge => i32::from(left >= right),
        _ => return None,
    })
}

/// Run `name` and check the observed peak against the analyzer's bound.
pub fn run_checked(module: &CompiledModule, name: &str, args: &[i32]) -> i32 {
    let mut machine = Machine::new(module);
    let result = machine
        .call(name, args)
        .unwrap_or_else(|e| panic!("{name} failed: {e}\n{}", module.disassemble()));
    let meta = module.function(name).expect("function metadata");
    if let Some(bound) = meta.stack_usage {
        assert!(
            machine.peak() <= bound as usize,
            "{name}: peak {} exceeds bound {bound}",
            machine.peak()
        );
    }
    result
}
