//! Execution fault taxonomy.

use thiserror::Error;

/// Execution-time faults. A faulting step commits nothing, so memory and
/// registers still show the state before the offending instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EngineFault {
    /// The fetched byte does not name an instruction.
    #[error("illegal opcode {opcode:#04X}")]
    IllegalOpcode {
        /// First byte of the instruction.
        opcode: u8,
    },
    /// An instruction fetch, operand access, or jump target fell outside
    /// memory.
    #[error("address {address:#08X} is out of range")]
    AddressOutOfRange {
        /// Offending byte address.
        address: u32,
    },
    /// `DIV` or `DIVR` with a zero divisor, or `DIVF` by zero.
    #[error("division by zero")]
    DivideByZero,
    /// Addressing flags the instruction cannot use, such as a store with
    /// immediate mode or format 4 combined with relative addressing.
    #[error("illegal addressing mode")]
    IllegalAddressing,
    /// A format-2 register field that names no usable register.
    #[error("invalid register number {number}")]
    InvalidRegister {
        /// Raw 4-bit register field.
        number: u8,
    },
    /// The device bus rejected an `RD`, `WD`, or `TD`.
    #[error("device {device:#04X} failed")]
    DeviceFailure {
        /// Device number addressed by the instruction.
        device: u8,
    },
}

impl EngineFault {
    /// Short stable name for logs and traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IllegalOpcode { .. } => "IllegalOpcode",
            Self::AddressOutOfRange { .. } => "AddressOutOfRange",
            Self::DivideByZero => "DivideByZero",
            Self::IllegalAddressing => "IllegalAddressing",
            Self::InvalidRegister { .. } => "InvalidRegister",
            Self::DeviceFailure { .. } => "DeviceFailure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineFault;

    #[test]
    fn messages_carry_fault_details() {
        assert_eq!(
            EngineFault::IllegalOpcode { opcode: 0xFC }.to_string(),
            "illegal opcode 0xFC"
        );
        assert_eq!(
            EngineFault::AddressOutOfRange { address: 0xBB8 }.to_string(),
            "address 0x000BB8 is out of range"
        );
        assert_eq!(
            EngineFault::InvalidRegister { number: 7 }.to_string(),
            "invalid register number 7"
        );
    }

    #[test]
    fn names_are_stable() {
        assert_eq!(EngineFault::DivideByZero.name(), "DivideByZero");
        assert_eq!(
            EngineFault::DeviceFailure { device: 5 }.name(),
            "DeviceFailure"
        );
    }
}
