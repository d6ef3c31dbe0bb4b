//! Label-to-address mapping produced by assembly and carried by object files.

use std::collections::BTreeMap;

use thiserror::Error;

/// Attempted redefinition of an existing label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate symbol '{name}' (already defined at 0x{existing:06X})")]
pub struct DuplicateSymbol {
    /// The label being redefined.
    pub name: String,
    /// Address recorded by the first definition.
    pub existing: u32,
}

/// Ordered symbol table. Labels are case-sensitive and iterate in sorted
/// order, which keeps serialized object programs deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SymbolTable {
    entries: BTreeMap<String, u32>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Records `name` at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateSymbol`] when `name` is already present; the
    /// existing entry is kept.
    pub fn define(&mut self, name: &str, address: u32) -> Result<(), DuplicateSymbol> {
        if let Some(&existing) = self.entries.get(name) {
            return Err(DuplicateSymbol {
                name: name.to_string(),
                existing,
            });
        }
        self.entries.insert(name.to_string(), address);
        Ok(())
    }

    /// Looks up the address of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries.get(name).copied()
    }

    /// Returns `true` when `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of defined symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no symbols are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(label, address)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

impl<'a> FromIterator<(&'a str, u32)> for SymbolTable {
    /// Builds a table keeping the first definition of each label.
    fn from_iter<T: IntoIterator<Item = (&'a str, u32)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (name, address) in iter {
            let _ = table.define(name, address);
        }
        table
    }
}
