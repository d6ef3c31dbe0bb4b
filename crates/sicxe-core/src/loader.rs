//! Copies an object program into memory and points `PC` at its entry.

use thiserror::Error;

use crate::memory::{Memory, MemoryError};
use crate::object::ObjectFile;
use crate::state::RegisterFile;

/// Failure to load an object program. Memory is left unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The program does not fit in memory.
    #[error("program does not fit in memory: {0}")]
    OutOfBounds(#[from] MemoryError),
    /// The entry point lies outside the loaded bytes.
    #[error("entry point {entry:#08X} lies outside the program {start:#08X}..{end:#08X}")]
    EntryOutsideProgram {
        /// Declared entry point.
        entry: u32,
        /// First program byte.
        start: u32,
        /// One past the last program byte.
        end: u32,
    },
}

/// Writes `object`'s bytes at its start address and sets `PC` to its entry
/// point. All-or-nothing: on error neither memory nor registers change.
///
/// # Errors
///
/// Returns [`LoadError::OutOfBounds`] when the bytes do not fit and
/// [`LoadError::EntryOutsideProgram`] for an entry point past the program.
pub fn load(
    object: &ObjectFile,
    memory: &mut Memory,
    regs: &mut RegisterFile,
) -> Result<(), LoadError> {
    let (start, end, entry) = (
        object.start_address(),
        object.end_address(),
        object.entry_point(),
    );
    let entry_ok = if start == end {
        entry == start
    } else {
        (start..end).contains(&entry)
    };
    if !entry_ok {
        return Err(LoadError::EntryOutsideProgram { entry, start, end });
    }

    memory.write_bytes(start as usize, object.object_code())?;
    regs.set_pc(entry);
    log::debug!(
        "loaded {} ({} bytes) at {start:#08X}, entry {entry:#08X}",
        object.file_name(),
        object.program_length()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load, LoadError};
    use crate::memory::Memory;
    use crate::object::ObjectFile;
    use crate::state::RegisterFile;
    use crate::symbols::SymbolTable;

    #[test]
    fn copies_bytes_and_sets_pc() {
        let object = ObjectFile::new(4, vec![0xAA, 0xBB, 0xCC, 0xDD], SymbolTable::new(), "P")
            .with_entry_point(5);
        let mut memory = Memory::new(4).unwrap();
        let mut regs = RegisterFile::default();

        load(&object, &mut memory, &mut regs).unwrap();
        assert_eq!(memory.read_bytes(4, 4).unwrap(), [0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(memory.read(1), Ok(0x00_AABB));
        assert_eq!(regs.pc(), 5);
    }

    #[test]
    fn oversized_program_leaves_memory_untouched() {
        let object = ObjectFile::new(10, vec![1; 5], SymbolTable::new(), "BIG");
        let mut memory = Memory::new(4).unwrap();
        memory.write(3, 0x12_3456).unwrap();
        let before = memory.clone();
        let mut regs = RegisterFile::default();

        assert!(matches!(
            load(&object, &mut memory, &mut regs),
            Err(LoadError::OutOfBounds(_))
        ));
        assert_eq!(memory, before);
        assert_eq!(regs.pc(), 0);
    }

    #[test]
    fn entry_point_must_be_inside_program() {
        let object = ObjectFile::new(0, vec![0; 3], SymbolTable::new(), "P").with_entry_point(3);
        let mut memory = Memory::new(4).unwrap();
        let mut regs = RegisterFile::default();
        assert_eq!(
            load(&object, &mut memory, &mut regs),
            Err(LoadError::EntryOutsideProgram {
                entry: 3,
                start: 0,
                end: 3
            })
        );
    }
}
