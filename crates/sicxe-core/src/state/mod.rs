//! Register file and engine state machine.

/// SIC/XE registers and the `SW` condition code.
pub mod registers;
/// Engine lifecycle states.
pub mod run_state;

pub use registers::{ConditionCode, Register, RegisterFile, UnknownRegister, FLOAT_MASK};
pub use run_state::EngineState;
