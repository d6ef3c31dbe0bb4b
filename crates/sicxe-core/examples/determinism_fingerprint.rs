//! Deterministic replay fingerprint used for cross-host comparison.
//!
//! Runs a fixed program, hashes the final registers, state, and memory, and
//! prints the hash. Two hosts agree only if execution is bit-for-bit identical.

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use sicxe_core::{
    CancellationToken, CoreConfig, EngineState, Machine, MachineError, ObjectFile, Register,
    SymbolTable,
};
use tempfile as _;
use thiserror as _;

// Adds 5 to A until it reaches 20, stores it at byte 30, then halts.
const PROGRAM: [u8; 18] = [
    0x01, 0x00, 0x00, // LDA   #0
    0x19, 0x00, 0x05, // ADD   #5
    0x29, 0x00, 0x14, // COMP  #20
    0x3B, 0x2F, 0xF7, // JLT   3
    0x0F, 0x00, 0x1E, // STA   30
    0x3F, 0x2F, 0xFD, // J     15
];

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> Result<String, MachineError> {
    let mut machine = Machine::new(CoreConfig::default())?;
    machine.load(&ObjectFile::new(
        0,
        PROGRAM.to_vec(),
        SymbolTable::new(),
        "FPRINT",
    ))?;
    let state = machine.run(&CancellationToken::new());

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &machine.retired_steps().to_le_bytes());

    match state {
        EngineState::Halted => hash_bytes(&mut hash, &[0x10]),
        EngineState::Faulted(fault) => hash_bytes(&mut hash, fault.to_string().as_bytes()),
        EngineState::Idle | EngineState::Ready | EngineState::Running => {
            hash_bytes(&mut hash, &[0x11]);
        }
    }

    for register in Register::ALL {
        hash_bytes(&mut hash, &machine.registers().get(register).to_le_bytes());
    }
    for word in machine.memory().words() {
        hash_bytes(&mut hash, &word.to_be_bytes());
    }

    Ok(format!("{hash:016x}"))
}

fn main() {
    match fingerprint() {
        Ok(hash) => println!("{hash}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
