//! Host-facing session API: configuration, cancellation, tracing, and the
//! [`Machine`] that ties memory, registers, loader, and engine together.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::decoder::{fetch, DecodedInstruction};
use crate::device::{DeviceBus, NullDevices};
use crate::execute::{commit_execution, execute_instruction, ExecuteState};
use crate::fault::EngineFault;
use crate::loader::{self, LoadError};
use crate::memory::{Memory, MemoryError, SnapshotError, SnapshotReport, DEFAULT_CAPACITY_WORDS};
use crate::object::ObjectFile;
use crate::state::{EngineState, Register, RegisterFile, UnknownRegister};

/// Top-level configuration for a machine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Memory capacity in words; must be at least one.
    pub capacity: usize,
    /// Enables [`TraceSink`] dispatch.
    pub tracing_enabled: bool,
    /// Upper bound on instructions executed by one [`Machine::run`] call.
    pub step_limit: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY_WORDS,
            tracing_enabled: false,
            step_limit: None,
        }
    }
}

/// Cooperative cancellation flag shared between a runner and its controller.
///
/// Clones observe the same flag. [`Machine::run`] checks it once per
/// instruction boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Deterministic trace events emitted at step boundaries when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// An instruction was fetched and decoded.
    InstructionStart {
        /// Address of the instruction.
        pc: u32,
        /// The decoded instruction.
        instruction: DecodedInstruction,
    },
    /// Memory was written by a committed instruction.
    MemoryWrite {
        /// First byte address written.
        address: u32,
        /// Number of bytes written.
        length: usize,
    },
    /// An instruction committed.
    InstructionRetired {
        /// Address of the instruction.
        pc: u32,
        /// Program counter after the instruction.
        next_pc: u32,
    },
    /// An instruction faulted.
    FaultRaised {
        /// Address of the faulting instruction.
        pc: u32,
        /// The fault.
        fault: EngineFault,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl<F: FnMut(TraceEvent)> TraceSink for F {
    fn on_event(&mut self, event: TraceEvent) {
        self(event);
    }
}

/// Errors returned by [`Machine`] operations.
#[derive(Debug, Error)]
pub enum MachineError {
    /// A memory address was out of range, or the capacity was invalid.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// The object program could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A snapshot file could not be read or written.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// A register name was not recognized.
    #[error(transparent)]
    UnknownRegister(#[from] UnknownRegister),
}

/// One simulation session: memory, registers, devices, and the engine state.
pub struct Machine<D = NullDevices> {
    config: CoreConfig,
    memory: Memory,
    registers: RegisterFile,
    state: EngineState,
    program: Option<(u32, u32)>,
    devices: D,
    trace: Option<Box<dyn TraceSink>>,
    retired: u64,
}

impl Machine<NullDevices> {
    /// Creates an idle machine with default devices.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Memory`] when `config.capacity` is zero.
    pub fn new(config: CoreConfig) -> Result<Self, MachineError> {
        Self::with_devices(config, NullDevices)
    }
}

impl<D: DeviceBus> Machine<D> {
    /// Creates an idle machine using `devices` for `RD`/`WD`/`TD`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Memory`] when `config.capacity` is zero.
    pub fn with_devices(config: CoreConfig, devices: D) -> Result<Self, MachineError> {
        let memory = Memory::new(config.capacity)?;
        Ok(Self {
            config,
            memory,
            registers: RegisterFile::default(),
            state: EngineState::Idle,
            program: None,
            devices,
            trace: None,
            retired: 0,
        })
    }

    /// Installs the trace sink; events flow only when tracing is enabled.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Current engine state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Machine memory.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable memory access for hosts preparing data between steps.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Device bus.
    #[must_use]
    pub const fn devices(&self) -> &D {
        &self.devices
    }

    /// Mutable device bus access.
    pub fn devices_mut(&mut self) -> &mut D {
        &mut self.devices
    }

    /// Instructions retired since the last load.
    #[must_use]
    pub const fn retired_steps(&self) -> u64 {
        self.retired
    }

    /// Byte range of the loaded program.
    #[must_use]
    pub const fn program_range(&self) -> Option<(u32, u32)> {
        self.program
    }

    /// Clears memory and registers and returns to `Idle`.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.registers = RegisterFile::default();
        self.program = None;
        self.retired = 0;
        self.transition(EngineState::Idle);
    }

    /// Loads an object program and moves to `Ready`.
    ///
    /// Registers are cleared and `PC` is set to the entry point. Memory outside
    /// the program keeps its contents.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Load`] when the program does not fit; nothing
    /// changes in that case.
    pub fn load(&mut self, object: &ObjectFile) -> Result<(), MachineError> {
        let mut registers = RegisterFile::default();
        loader::load(object, &mut self.memory, &mut registers)?;
        self.registers = registers;
        self.program = Some((object.start_address(), object.end_address()));
        self.retired = 0;
        self.transition(EngineState::Ready);
        Ok(())
    }

    /// Executes one instruction and reports the resulting state.
    ///
    /// Does nothing in `Idle`, `Halted`, or `Faulted`.
    pub fn step(&mut self) -> EngineState {
        if !self.state.can_step() {
            return self.state;
        }

        let pc = self.registers.pc();
        if !self.in_program(pc) {
            self.transition(EngineState::Halted);
            return self.state;
        }

        match self.execute_one(pc) {
            Ok(exec) => {
                self.retired += 1;
                log::trace!("retired {pc:#08X} -> {:#08X}", exec.next_pc);
                self.emit(TraceEvent::InstructionRetired {
                    pc,
                    next_pc: exec.next_pc,
                });
                if exec.self_jump || !self.in_program(exec.next_pc) {
                    self.transition(EngineState::Halted);
                } else {
                    self.transition(EngineState::Running);
                }
            }
            Err(fault) => {
                self.emit(TraceEvent::FaultRaised { pc, fault });
                self.transition(EngineState::Faulted(fault));
            }
        }
        self.state
    }

    /// Steps until the engine halts or faults, the token is cancelled, or the
    /// configured step limit is reached.
    pub fn run(&mut self, cancel: &CancellationToken) -> EngineState {
        let mut steps = 0u64;
        while self.state.can_step() {
            if cancel.is_cancelled() {
                log::debug!("run cancelled after {steps} steps");
                break;
            }
            if self.config.step_limit.is_some_and(|limit| steps >= limit) {
                log::debug!("step limit of {steps} reached");
                break;
            }
            self.step();
            steps += 1;
        }
        self.state
    }

    /// Reads word `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Memory`] for an out-of-range address.
    pub fn read_memory(&self, address: usize) -> Result<u32, MachineError> {
        Ok(self.memory.read(address)?)
    }

    /// Reads a register by name (`"A"`, `"PC"`, ...). `F` yields all 48 bits.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownRegister`] for an unrecognized name.
    pub fn read_register(&self, name: &str) -> Result<u64, MachineError> {
        let reg: Register = name.parse()?;
        Ok(self.registers.get(reg))
    }

    /// Saves a memory snapshot to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Snapshot`] on I/O failure.
    pub fn save_memory_snapshot(&self, path: &Path) -> Result<(), MachineError> {
        Ok(self.memory.snapshot_save(path)?)
    }

    /// Applies a memory snapshot from `path`, reporting skipped lines.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Snapshot`] when the file cannot be read.
    pub fn load_memory_snapshot(&mut self, path: &Path) -> Result<SnapshotReport, MachineError> {
        Ok(self.memory.snapshot_load(path)?)
    }

    fn execute_one(&mut self, pc: u32) -> Result<ExecuteState, EngineFault> {
        let instruction = fetch(&self.memory, pc)?;
        self.emit(TraceEvent::InstructionStart { pc, instruction });

        let exec = execute_instruction(
            &instruction,
            pc,
            &self.memory,
            &self.registers,
            &mut self.devices,
        )?;
        let fallthrough = pc + u32::from(instruction.length());
        if exec.next_pc != fallthrough && exec.next_pc as usize >= self.memory.byte_capacity() {
            return Err(EngineFault::AddressOutOfRange {
                address: exec.next_pc,
            });
        }
        commit_execution(&exec, &mut self.memory, &mut self.registers, &mut self.devices)?;

        if let Some((address, bytes)) = &exec.memory_write {
            self.emit(TraceEvent::MemoryWrite {
                address: *address,
                length: bytes.len(),
            });
        }
        Ok(exec)
    }

    fn in_program(&self, pc: u32) -> bool {
        self.program
            .is_some_and(|(start, end)| (start..end).contains(&pc))
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            log::debug!("engine {} -> {next}", self.state);
            self.state = next;
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        if !self.config.tracing_enabled {
            return;
        }
        if let Some(sink) = self.trace.as_mut() {
            sink.on_event(event);
        }
    }
}

impl<D: fmt::Debug> fmt::Debug for Machine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("registers", &self.registers)
            .field("program", &self.program)
            .field("devices", &self.devices)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{CancellationToken, CoreConfig, Machine, MachineError};
    use crate::memory::MemoryError;
    use crate::object::ObjectFile;
    use crate::state::EngineState;
    use crate::symbols::SymbolTable;

    #[test]
    fn default_config_matches_contract() {
        let config = CoreConfig::default();
        assert_eq!(config.capacity, 1000);
        assert!(!config.tracing_enabled);
        assert_eq!(config.step_limit, None);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = CoreConfig {
            capacity: 0,
            ..CoreConfig::default()
        };
        assert!(matches!(
            Machine::new(config),
            Err(MachineError::Memory(MemoryError::ZeroCapacity))
        ));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn step_before_load_reports_idle() {
        let mut machine = Machine::new(CoreConfig::default()).unwrap();
        assert_eq!(machine.step(), EngineState::Idle);
        assert_eq!(machine.run(&CancellationToken::new()), EngineState::Idle);
    }

    #[test]
    fn cancelled_run_leaves_machine_ready() {
        let mut machine = Machine::new(CoreConfig::default()).unwrap();
        let object = ObjectFile::new(0, vec![0x3F, 0x2F, 0xFD], SymbolTable::new(), "LOOP");
        machine.load(&object).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(machine.run(&token), EngineState::Ready);
        assert_eq!(machine.retired_steps(), 0);
    }

    #[test]
    fn read_register_by_name() {
        let machine = Machine::new(CoreConfig::default()).unwrap();
        assert_eq!(machine.read_register("pc").unwrap(), 0);
        assert!(matches!(
            machine.read_register("R9"),
            Err(MachineError::UnknownRegister(_))
        ));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut machine = Machine::new(CoreConfig::default()).unwrap();
        let object = ObjectFile::new(0, vec![0x4C, 0, 0], SymbolTable::new(), "R");
        machine.load(&object).unwrap();
        machine.reset();
        assert_eq!(machine.state(), EngineState::Idle);
        assert_eq!(machine.read_memory(0).unwrap(), 0);
    }
}
