//! Word-addressable machine memory with a byte view and text snapshots.
//!
//! Memory is a flat, fixed-size buffer of 24-bit words. Word `w` holds byte
//! addresses `3w..3w+3` in big-endian order, which is how instructions and
//! object code reach it. Every access is bounds-checked and a failed access
//! never mutates state.

/// Bounds-checked `"<address>: <value>"` snapshot save and restore.
pub mod snapshot;

pub use snapshot::{SnapshotError, SnapshotIssue, SnapshotReport};

use thiserror::Error;

use crate::word::{Word, WORD_BYTES};

/// Default memory capacity in words.
pub const DEFAULT_CAPACITY_WORDS: usize = 1000;

/// Errors reported by memory accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum MemoryError {
    /// Address outside `0..limit`.
    #[error("address {address} is out of bounds (limit {limit})")]
    OutOfBounds {
        /// Requested address (word index or byte address, matching the call).
        address: usize,
        /// Exclusive upper bound for that kind of address.
        limit: usize,
    },
    /// Capacity below the one-word minimum.
    #[error("memory capacity must be at least one word")]
    ZeroCapacity,
}

/// Fixed-capacity SIC/XE memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    words: Box<[Word]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            words: vec![Word::ZERO; DEFAULT_CAPACITY_WORDS].into_boxed_slice(),
        }
    }
}

impl Memory {
    /// Allocates zeroed memory holding `capacity` words.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, MemoryError> {
        if capacity == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        Ok(Self {
            words: vec![Word::ZERO; capacity].into_boxed_slice(),
        })
    }

    /// Capacity in words.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Capacity in bytes (three per word).
    #[must_use]
    pub fn byte_capacity(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    /// Read-only view of every word in address order.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Zeroes every word.
    pub fn reset(&mut self) {
        self.words.fill(Word::ZERO);
    }

    fn check_word(&self, address: usize) -> Result<(), MemoryError> {
        if address < self.words.len() {
            Ok(())
        } else {
            Err(MemoryError::OutOfBounds {
                address,
                limit: self.words.len(),
            })
        }
    }

    fn check_bytes(&self, address: usize, len: usize) -> Result<(), MemoryError> {
        let limit = self.byte_capacity();
        match address.checked_add(len) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(MemoryError::OutOfBounds { address, limit }),
        }
    }

    /// Reads the 24-bit value stored in word `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `address >= capacity`.
    pub fn read(&self, address: usize) -> Result<u32, MemoryError> {
        self.check_word(address)?;
        Ok(self.words[address].value())
    }

    /// Stores `value` masked to 24 bits in word `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `address >= capacity`.
    pub fn write(&mut self, address: usize, value: u32) -> Result<(), MemoryError> {
        self.set(address, Word::new(value))
    }

    /// Stores a pre-built word in word `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `address >= capacity`.
    pub fn set(&mut self, address: usize, word: Word) -> Result<(), MemoryError> {
        self.check_word(address)?;
        self.words[address] = word;
        Ok(())
    }

    /// Returns the word at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `address >= capacity`.
    pub fn get(&self, address: usize) -> Result<Word, MemoryError> {
        self.check_word(address)?;
        Ok(self.words[address])
    }

    /// Reads the byte at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `address >= byte_capacity`.
    pub fn read_byte(&self, address: usize) -> Result<u8, MemoryError> {
        self.check_bytes(address, 1)?;
        Ok(self.byte_unchecked(address))
    }

    /// Writes the byte at byte address `address`, leaving the other two bytes
    /// of the containing word untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `address >= byte_capacity`.
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), MemoryError> {
        self.check_bytes(address, 1)?;
        self.set_byte_unchecked(address, value);
        Ok(())
    }

    /// Reads `len` consecutive bytes starting at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when any byte of the range is
    /// outside memory.
    pub fn read_bytes(&self, address: usize, len: usize) -> Result<Vec<u8>, MemoryError> {
        self.check_bytes(address, len)?;
        Ok((address..address + len)
            .map(|a| self.byte_unchecked(a))
            .collect())
    }

    /// Writes `bytes` starting at byte address `address`. The whole range is
    /// checked before the first byte is stored.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when any byte of the range is
    /// outside memory; memory is left unchanged in that case.
    pub fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_bytes(address, bytes.len())?;
        for (offset, byte) in bytes.iter().enumerate() {
            self.set_byte_unchecked(address + offset, *byte);
        }
        Ok(())
    }

    /// Reads the three bytes starting at byte address `address` as a word.
    /// The range may straddle two stored words.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when the range leaves memory.
    pub fn read_word_at(&self, address: usize) -> Result<Word, MemoryError> {
        self.check_bytes(address, WORD_BYTES)?;
        Ok(Word::from_be_bytes([
            self.byte_unchecked(address),
            self.byte_unchecked(address + 1),
            self.byte_unchecked(address + 2),
        ]))
    }

    /// Writes a word to the three bytes starting at byte address `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when the range leaves memory.
    pub fn write_word_at(&mut self, address: usize, word: Word) -> Result<(), MemoryError> {
        self.write_bytes(address, &word.to_be_bytes())
    }

    fn byte_unchecked(&self, address: usize) -> u8 {
        self.words[address / WORD_BYTES].to_be_bytes()[address % WORD_BYTES]
    }

    fn set_byte_unchecked(&mut self, address: usize, value: u8) {
        let slot = &mut self.words[address / WORD_BYTES];
        let mut bytes = slot.to_be_bytes();
        bytes[address % WORD_BYTES] = value;
        *slot = Word::from_be_bytes(bytes);
    }
}
