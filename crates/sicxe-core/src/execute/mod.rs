//! Instruction execution with precise commit.
//!
//! Execution runs in two phases:
//! 1. [`execute_instruction`] reads registers, memory, and devices and records
//!    every effect in an [`ExecuteState`] without mutating anything.
//! 2. [`commit_execution`] applies the recorded effects.
//!
//! A fault in phase 1 leaves memory and registers untouched.

/// SIC/XE 48-bit floating-point conversion.
pub mod float;
mod helpers;

pub use helpers::target_address;

use helpers::{check_span, load_operand, load_word, operand_address, to_be};

use crate::decoder::{AddressingMode, DecodedInstruction, MemoryOperand, Operands};
use crate::device::DeviceBus;
use crate::fault::EngineFault;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::state::{ConditionCode, Register, RegisterFile};
use crate::word::{Word, WORD_MASK};

/// Side effects accumulated by one instruction, applied only on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteState {
    /// Register updates in program order. `PC` is never listed here.
    pub register_writes: Vec<(Register, u64)>,
    /// Bytes to store, starting at a byte address already bounds-checked.
    pub memory_write: Option<(u32, Vec<u8>)>,
    /// Byte to send to a device.
    pub device_write: Option<(u8, u8)>,
    /// New condition code.
    pub condition: Option<ConditionCode>,
    /// Address of the next instruction.
    pub next_pc: u32,
    /// The instruction jumped to its own address.
    pub self_jump: bool,
}

impl ExecuteState {
    /// Creates an empty effect set that falls through to `next_pc`.
    #[must_use]
    pub const fn new(next_pc: u32) -> Self {
        Self {
            register_writes: Vec::new(),
            memory_write: None,
            device_write: None,
            condition: None,
            next_pc,
            self_jump: false,
        }
    }

    fn write_register(&mut self, reg: Register, value: u64) {
        if reg == Register::PC {
            self.next_pc = (value as u32) & WORD_MASK;
        } else {
            self.register_writes.push((reg, value));
        }
    }

    fn write_word(&mut self, reg: Register, word: Word) {
        self.write_register(reg, u64::from(word.value()));
    }

    fn jump(&mut self, pc: u32, target: u32) {
        self.self_jump = target == pc;
        self.next_pc = target;
    }
}

/// Executes one decoded instruction located at `pc`.
///
/// Devices may be queried (`RD`, `TD`); device writes are deferred to commit.
///
/// # Errors
///
/// Returns the [`EngineFault`] raised by the instruction. No effects are
/// recorded in that case.
pub fn execute_instruction(
    instr: &DecodedInstruction,
    pc: u32,
    memory: &Memory,
    regs: &RegisterFile,
    devices: &mut dyn DeviceBus,
) -> Result<ExecuteState, EngineFault> {
    let next_pc = pc.wrapping_add(u32::from(instr.length())) & WORD_MASK;
    let mut exec = ExecuteState::new(next_pc);

    match instr.operands {
        Operands::None => execute_format1(instr.opcode, regs, &mut exec),
        Operands::Registers { r1, r2 } => execute_format2(instr.opcode, r1, r2, regs, &mut exec)?,
        Operands::Memory(operand) => {
            let target = target_address(&operand, next_pc, regs);
            let ctx = MemoryContext {
                operand,
                target,
                pc,
                memory,
                regs,
            };
            execute_memory(instr.opcode, &ctx, devices, &mut exec)?;
        }
    }

    Ok(exec)
}

/// Applies the effects recorded by [`execute_instruction`].
///
/// The device write goes first: it is the only effect that can still fail,
/// and instructions that write a device have no other effects.
///
/// # Errors
///
/// Returns [`EngineFault::DeviceFailure`] when the device rejects the write,
/// or [`EngineFault::AddressOutOfRange`] if the store no longer fits memory.
pub fn commit_execution(
    exec: &ExecuteState,
    memory: &mut Memory,
    regs: &mut RegisterFile,
    devices: &mut dyn DeviceBus,
) -> Result<(), EngineFault> {
    if let Some((device, value)) = exec.device_write {
        devices.write(device, value).map_err(|e| {
            log::warn!("{e}");
            EngineFault::DeviceFailure { device }
        })?;
    }

    if let Some((address, bytes)) = &exec.memory_write {
        memory
            .write_bytes(*address as usize, bytes)
            .map_err(|_| EngineFault::AddressOutOfRange { address: *address })?;
    }

    for &(reg, value) in &exec.register_writes {
        regs.set(reg, value);
    }
    if let Some(cc) = exec.condition {
        regs.set_condition_code(cc);
    }
    regs.set_pc(exec.next_pc);
    Ok(())
}

fn execute_format1(opcode: Opcode, regs: &RegisterFile, exec: &mut ExecuteState) {
    match opcode {
        Opcode::Fix => {
            #[allow(clippy::cast_possible_truncation)]
            let value = float::to_f64(regs.f()).trunc() as i64;
            exec.write_word(Register::A, Word::from_signed(value));
        }
        Opcode::Float => {
            let value = f64::from(regs.a().as_signed());
            exec.write_register(Register::F, float::from_f64(value));
        }
        Opcode::Norm => {
            exec.write_register(Register::F, float::from_f64(float::to_f64(regs.f())));
        }
        Opcode::Tio => exec.condition = Some(ConditionCode::Less),
        _ => {}
    }
}

fn register(number: u8) -> Result<Register, EngineFault> {
    Register::from_number(number).ok_or(EngineFault::InvalidRegister { number })
}

/// A 24-bit register; `F` is rejected for word arithmetic.
fn word_register(number: u8) -> Result<Register, EngineFault> {
    match register(number)? {
        Register::F => Err(EngineFault::InvalidRegister { number }),
        reg => Ok(reg),
    }
}

fn execute_format2(
    opcode: Opcode,
    r1: u8,
    r2: u8,
    regs: &RegisterFile,
    exec: &mut ExecuteState,
) -> Result<(), EngineFault> {
    match opcode {
        Opcode::Addr | Opcode::Subr | Opcode::Mulr | Opcode::Divr => {
            let src = regs.word(word_register(r1)?);
            let dst_reg = word_register(r2)?;
            let dst = regs.word(dst_reg);
            let result = match opcode {
                Opcode::Addr => dst.wrapping_add(src),
                Opcode::Subr => dst.wrapping_sub(src),
                Opcode::Mulr => dst.wrapping_mul(src),
                _ => dst.checked_div(src).ok_or(EngineFault::DivideByZero)?,
            };
            exec.write_word(dst_reg, result);
        }
        Opcode::Compr => {
            let lhs = regs.word(word_register(r1)?).as_signed();
            let rhs = regs.word(word_register(r2)?).as_signed();
            exec.condition = Some(ConditionCode::compare(lhs, rhs));
        }
        Opcode::Clear => exec.write_register(register(r1)?, 0),
        Opcode::Rmo => {
            let value = regs.get(register(r1)?);
            exec.write_register(register(r2)?, value);
        }
        Opcode::Shiftl | Opcode::Shiftr => {
            let reg = word_register(r1)?;
            let count = u32::from(r2) + 1;
            let value = regs.word(reg);
            let shifted = if opcode == Opcode::Shiftl {
                let v = value.value();
                Word::new((v << count) | (v >> (24 - count)))
            } else {
                Word::from_signed(i64::from(value.as_signed() >> count.min(23)))
            };
            exec.write_word(reg, shifted);
        }
        Opcode::Tixr => {
            let x = regs.x().wrapping_add(Word::new(1));
            let reg = word_register(r1)?;
            let rhs = if reg == Register::X { x } else { regs.word(reg) };
            exec.write_word(Register::X, x);
            exec.condition = Some(ConditionCode::compare(x.as_signed(), rhs.as_signed()));
        }
        _ => {}
    }
    Ok(())
}

struct MemoryContext<'a> {
    operand: MemoryOperand,
    target: u32,
    pc: u32,
    memory: &'a Memory,
    regs: &'a RegisterFile,
}

impl MemoryContext<'_> {
    fn word(&self) -> Result<Word, EngineFault> {
        load_word(&self.operand, self.target, self.memory)
    }

    fn float(&self) -> Result<f64, EngineFault> {
        load_operand(&self.operand, self.target, self.memory, 6).map(float::to_f64)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn byte(&self) -> Result<u8, EngineFault> {
        load_operand(&self.operand, self.target, self.memory, 1).map(|v| v as u8)
    }

    fn store(&self, exec: &mut ExecuteState, value: u64, len: usize) -> Result<(), EngineFault> {
        let address = operand_address(&self.operand, self.target, self.memory)?;
        check_span(self.memory, address, len)?;
        exec.memory_write = Some((address, to_be(value, len)));
        Ok(())
    }

    fn jump_target(&self) -> Result<u32, EngineFault> {
        match self.operand.mode {
            AddressingMode::Indirect => self.word().map(Word::value),
            AddressingMode::Simple | AddressingMode::Immediate | AddressingMode::Sic => {
                Ok(self.target)
            }
        }
    }
}

fn load_register(opcode: Opcode) -> Option<Register> {
    match opcode {
        Opcode::Lda => Some(Register::A),
        Opcode::Ldb => Some(Register::B),
        Opcode::Ldl => Some(Register::L),
        Opcode::Lds => Some(Register::S),
        Opcode::Ldt => Some(Register::T),
        Opcode::Ldx => Some(Register::X),
        _ => None,
    }
}

fn store_register(opcode: Opcode) -> Option<Register> {
    match opcode {
        Opcode::Sta => Some(Register::A),
        Opcode::Stb => Some(Register::B),
        Opcode::Stl => Some(Register::L),
        Opcode::Sts => Some(Register::S),
        Opcode::Stsw => Some(Register::SW),
        Opcode::Stt => Some(Register::T),
        Opcode::Stx => Some(Register::X),
        _ => None,
    }
}

#[allow(clippy::too_many_lines)]
fn execute_memory(
    opcode: Opcode,
    ctx: &MemoryContext<'_>,
    devices: &mut dyn DeviceBus,
    exec: &mut ExecuteState,
) -> Result<(), EngineFault> {
    let regs = ctx.regs;

    if let Some(reg) = load_register(opcode) {
        exec.write_word(reg, ctx.word()?);
        return Ok(());
    }
    if let Some(reg) = store_register(opcode) {
        return ctx.store(exec, u64::from(regs.word(reg).value()), 3);
    }

    match opcode {
        Opcode::Ldf => {
            let bits = load_operand(&ctx.operand, ctx.target, ctx.memory, 6)?;
            exec.write_register(Register::F, bits);
        }
        Opcode::Stf => ctx.store(exec, regs.f(), 6)?,
        Opcode::Ldch => {
            let a = regs.a().value();
            let byte = ctx.byte()?;
            exec.write_word(Register::A, Word::new((a & 0xFF_FF00) | u32::from(byte)));
        }
        Opcode::Stch => ctx.store(exec, u64::from(regs.a().value() & 0xFF), 1)?,

        Opcode::Add => exec.write_word(Register::A, regs.a().wrapping_add(ctx.word()?)),
        Opcode::Sub => exec.write_word(Register::A, regs.a().wrapping_sub(ctx.word()?)),
        Opcode::Mul => exec.write_word(Register::A, regs.a().wrapping_mul(ctx.word()?)),
        Opcode::Div => {
            let quotient = regs
                .a()
                .checked_div(ctx.word()?)
                .ok_or(EngineFault::DivideByZero)?;
            exec.write_word(Register::A, quotient);
        }
        Opcode::And => {
            let value = regs.a().value() & ctx.word()?.value();
            exec.write_word(Register::A, Word::new(value));
        }
        Opcode::Or => {
            let value = regs.a().value() | ctx.word()?.value();
            exec.write_word(Register::A, Word::new(value));
        }
        Opcode::Comp => {
            let rhs = ctx.word()?;
            exec.condition = Some(ConditionCode::compare(regs.a().as_signed(), rhs.as_signed()));
        }
        Opcode::Tix => {
            let rhs = ctx.word()?;
            let x = regs.x().wrapping_add(Word::new(1));
            exec.write_word(Register::X, x);
            exec.condition = Some(ConditionCode::compare(x.as_signed(), rhs.as_signed()));
        }

        Opcode::Addf | Opcode::Subf | Opcode::Mulf | Opcode::Divf => {
            let lhs = float::to_f64(regs.f());
            let rhs = ctx.float()?;
            let result = match opcode {
                Opcode::Addf => lhs + rhs,
                Opcode::Subf => lhs - rhs,
                Opcode::Mulf => lhs * rhs,
                _ if rhs == 0.0 => return Err(EngineFault::DivideByZero),
                _ => lhs / rhs,
            };
            exec.write_register(Register::F, float::from_f64(result));
        }
        Opcode::Compf => {
            let rhs = ctx.float()?;
            exec.condition = Some(ConditionCode::compare(float::to_f64(regs.f()), rhs));
        }

        Opcode::J => exec.jump(ctx.pc, ctx.jump_target()?),
        Opcode::Jeq | Opcode::Jgt | Opcode::Jlt => {
            let wanted = match opcode {
                Opcode::Jeq => ConditionCode::Equal,
                Opcode::Jgt => ConditionCode::Greater,
                _ => ConditionCode::Less,
            };
            if regs.condition_code() == wanted {
                exec.jump(ctx.pc, ctx.jump_target()?);
            }
        }
        Opcode::Jsub => {
            let target = ctx.jump_target()?;
            exec.write_register(Register::L, u64::from(exec.next_pc));
            exec.jump(ctx.pc, target);
        }
        Opcode::Rsub => exec.next_pc = regs.l().value(),

        Opcode::Rd | Opcode::Wd | Opcode::Td => {
            let device = ctx.byte()?;
            let failure = |e: crate::device::DeviceError| {
                log::warn!("{e}");
                EngineFault::DeviceFailure { device }
            };
            match opcode {
                Opcode::Rd => {
                    let byte = devices.read(device).map_err(failure)?;
                    let a = regs.a().value();
                    exec.write_word(Register::A, Word::new((a & 0xFF_FF00) | u32::from(byte)));
                }
                Opcode::Wd => {
                    #[allow(clippy::cast_possible_truncation)]
                    let byte = regs.a().value() as u8;
                    exec.device_write = Some((device, byte));
                }
                _ => {
                    let ready = devices.test(device).map_err(failure)?;
                    exec.condition = Some(if ready {
                        ConditionCode::Less
                    } else {
                        ConditionCode::Equal
                    });
                }
            }
        }

        // LPS, SSK, STI: privileged no-ops.
        _ => {}
    }
    Ok(())
}
