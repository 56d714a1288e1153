//! Rows of the `dso_cache` table, one per bundled native library name variant.

use crate::{
    elf::SymbolAccessor,
    native::layout::{row_offsets, FieldKind, Pointer, StringSlot, StructLayout, StructReader},
    Result,
};

/// Symbol holding the `DSOCacheEntry` array.
pub const DSO_CACHE_SYMBOL: &str = "dso_cache";

/// One `DSOCacheEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsoCacheEntry {
    /// xxHash of the name variant this row answers to
    pub hash: u64,
    /// xxHash of the real library name
    pub real_name_hash: u64,
    /// The library is never loaded
    pub ignore: bool,
    /// Library name, `None` if the pointer is null or unresolvable
    pub name: Option<String>,
    /// Load handle slot, null in the file
    pub handle: Pointer,
}

impl DsoCacheEntry {
    /// Field layout of the native struct.
    pub const LAYOUT: StructLayout = StructLayout::new(&[
        FieldKind::U64,
        FieldKind::U64,
        FieldKind::Bool,
        FieldKind::String,
        FieldKind::Pointer,
    ]);

    /// Decodes every complete row of `dso_cache`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
    pub fn read_all(image: &impl SymbolAccessor) -> Result<Vec<DsoCacheEntry>> {
        let symbol = image.require_symbol(DSO_CACHE_SYMBOL)?;
        let data = image.symbol_bytes(symbol)?;
        let is_64bit = image.is_64bit();

        row_offsets(data.len(), &Self::LAYOUT, is_64bit)
            .into_iter()
            .map(|base| {
                let mut reader = StructReader::new(data, base, &Self::LAYOUT, is_64bit)?;
                let hash = reader.read()?;
                let real_name_hash = reader.read()?;
                let ignore = reader.read()?;
                let name: StringSlot = reader.read()?;
                let handle = reader.read()?;

                Ok(DsoCacheEntry {
                    hash,
                    real_name_hash,
                    ignore,
                    name: image.string_from_pointer_field(symbol, name.offset)?,
                    handle,
                })
            })
            .collect()
    }
}
