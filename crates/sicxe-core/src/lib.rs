//! Core virtual machine crate for the SIC/XE architecture.

/// 24-bit machine word value type.
pub mod word;
pub use word::{Word, WORD_BITS, WORD_BYTES, WORD_MASK};

/// Word-addressable memory with byte view and text snapshots.
pub mod memory;
pub use memory::{
    Memory, MemoryError, SnapshotError, SnapshotIssue, SnapshotReport, DEFAULT_CAPACITY_WORDS,
};

/// Label to address mapping.
pub mod symbols;
pub use symbols::{DuplicateSymbol, SymbolTable};

/// Assembled program image and its text object format.
pub mod object;
pub use object::{ObjectFile, ObjectFormatError};

/// Architectural register and engine state.
pub mod state;
pub use state::{ConditionCode, EngineState, Register, RegisterFile, UnknownRegister};

/// Execution fault taxonomy.
pub mod fault;
pub use fault::EngineFault;

/// Opcode table with mnemonics, machine codes, and formats.
pub mod opcode;
pub use opcode::{InstructionFormat, Opcode, OPCODE_TABLE};

/// Instruction decode with addressing-flag validation.
pub mod decoder;
pub use decoder::{
    decode, fetch, AddressingMode, DecodedInstruction, MemoryOperand, Operands, Relative,
};

/// Device bus consumed by `RD`, `WD`, and `TD`.
pub mod device;
pub use device::{BufferedDevices, DeviceBus, DeviceError, NullDevices};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{commit_execution, execute_instruction, target_address, ExecuteState};

/// Object program loader.
pub mod loader;
pub use loader::LoadError;

/// Instruction disassembly.
pub mod disasm;
pub use disasm::{disassemble, disassemble_instruction, disassemble_range, Disassembly};

/// Public host-facing session API.
pub mod api;
pub use api::{CancellationToken, CoreConfig, Machine, MachineError, TraceEvent, TraceSink};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
