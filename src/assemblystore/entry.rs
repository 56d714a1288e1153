//! Rows of the assembly descriptor table and the global hash index.

use crate::{file::parser::Parser, Result};

/// Where one assembly and its optional debug and config data live in the store.
///
/// Offsets are relative to the start of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyStoreAssembly {
    /// Start of the assembly image
    pub data_offset: u32,
    /// Size of the assembly image
    pub data_size: u32,
    /// Start of the PDB, 0 if absent
    pub debug_data_offset: u32,
    /// Size of the PDB, 0 if absent
    pub debug_data_size: u32,
    /// Start of the `.config` file, 0 if absent
    pub config_data_offset: u32,
    /// Size of the `.config` file, 0 if absent
    pub config_data_size: u32,
}

impl AssemblyStoreAssembly {
    /// Size of one descriptor row.
    pub const SIZE: usize = 24;

    /// Reads one descriptor at the parser position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than [`Self::SIZE`] bytes remain.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        Ok(AssemblyStoreAssembly {
            data_offset: parser.read_le::<u32>()?,
            data_size: parser.read_le::<u32>()?,
            debug_data_offset: parser.read_le::<u32>()?,
            debug_data_size: parser.read_le::<u32>()?,
            config_data_offset: parser.read_le::<u32>()?,
            config_data_size: parser.read_le::<u32>()?,
        })
    }

    /// Returns `true` if a PDB is stored next to the image.
    #[must_use]
    pub fn has_debug_data(&self) -> bool {
        self.debug_data_size > 0
    }

    /// Returns `true` if a `.config` file is stored next to the image.
    #[must_use]
    pub fn has_config_data(&self) -> bool {
        self.config_data_size > 0
    }

    /// Offset just past the last byte this descriptor refers to.
    #[must_use]
    pub fn end(&self) -> u64 {
        [
            (self.data_offset, self.data_size),
            (self.debug_data_offset, self.debug_data_size),
            (self.config_data_offset, self.config_data_size),
        ]
        .iter()
        .map(|(offset, size)| u64::from(*offset) + u64::from(*size))
        .max()
        .unwrap_or(0)
    }
}

/// One entry of the global hash index of the shared store.
///
/// The 32-bit and 64-bit indexes use the same 20 byte row; in the 32-bit one only the low
/// half of `hash` is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyStoreHashEntry {
    /// xxHash of the assembly name
    pub hash: u64,
    /// Slot in the runtime's assembly pointer array
    pub mapping_index: u32,
    /// Row of the assembly in its store's descriptor table
    pub local_store_index: u32,
    /// Store holding the assembly
    pub store_id: u32,
    /// Whether this entry belongs to the 32-bit index
    pub is_32bit: bool,
}

impl AssemblyStoreHashEntry {
    /// Size of one index row.
    pub const SIZE: usize = 20;

    /// Reads one index entry at the parser position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than [`Self::SIZE`] bytes remain.
    pub fn read(parser: &mut Parser, is_32bit: bool) -> Result<Self> {
        Ok(AssemblyStoreHashEntry {
            hash: parser.read_le::<u64>()?,
            mapping_index: parser.read_le::<u32>()?,
            local_store_index: parser.read_le::<u32>()?,
            store_id: parser.read_le::<u32>()?,
            is_32bit,
        })
    }
}

/// Checks that `count` rows of `row_size` bytes fit before reading any of them.
pub(crate) fn ensure_rows(parser: &Parser, count: u32, row_size: usize, what: &str) -> Result<()> {
    match (count as usize).checked_mul(row_size) {
        Some(size) if size <= parser.remaining() => Ok(()),
        _ => Err(invalid_data!(
            parser.pos(),
            "{} {} rows of {} bytes run past the end of the store ({} bytes left)",
            count,
            what,
            row_size,
            parser.remaining()
        )),
    }
}
