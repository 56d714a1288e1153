//! Marshal method tables.
//!
//! When marshal methods are enabled the generator emits three symbols: the managed class
//! cache (`marshal_methods_class_cache`), the method name table (`mm_method_names`) used for
//! diagnostics, and the class name table (`mm_class_names`).

use crate::{
    elf::{ElfImage, SymbolAccessor},
    native::layout::{row_offsets, FieldKind, Pointer, StringSlot, StructLayout, StructReader},
    Result,
};

/// Symbol holding the `MarshalMethodsManagedClass` array.
pub const CLASS_CACHE_SYMBOL: &str = "marshal_methods_class_cache";
/// Symbol holding the `MarshalMethodName` array.
pub const METHOD_NAMES_SYMBOL: &str = "mm_method_names";
/// Symbol holding the `const char*` class name array.
pub const CLASS_NAMES_SYMBOL: &str = "mm_class_names";

/// One `MarshalMethodsManagedClass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalMethodsManagedClass {
    /// Metadata token of the managed class
    pub token: u32,
    /// `MonoClass*` slot, filled at runtime
    pub klass: Pointer,
}

impl MarshalMethodsManagedClass {
    /// Field layout of the native struct.
    pub const LAYOUT: StructLayout = StructLayout::new(&[FieldKind::U32, FieldKind::Pointer]);

    /// Decodes every complete row of `marshal_methods_class_cache`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
    pub fn read_all(image: &impl SymbolAccessor) -> Result<Vec<MarshalMethodsManagedClass>> {
        let data = image.symbol_data(CLASS_CACHE_SYMBOL)?;
        let is_64bit = image.is_64bit();

        row_offsets(data.len(), &Self::LAYOUT, is_64bit)
            .into_iter()
            .map(|base| {
                let mut reader = StructReader::new(data, base, &Self::LAYOUT, is_64bit)?;
                Ok(MarshalMethodsManagedClass {
                    token: reader.read()?,
                    klass: reader.read()?,
                })
            })
            .collect()
    }
}

/// One `MarshalMethodName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalMethodName {
    /// Assembly index in the high 32 bits, method token in the low 32 bits
    pub id: u64,
    /// Method name, `None` if the pointer is null or unresolvable
    pub name: Option<String>,
}

impl MarshalMethodName {
    /// Field layout of the native struct.
    pub const LAYOUT: StructLayout = StructLayout::new(&[FieldKind::U64, FieldKind::String]);

    /// Index of the assembly declaring the method.
    #[must_use]
    pub fn assembly_index(&self) -> u32 {
        (self.id >> 32) as u32
    }

    /// Metadata token of the method.
    #[must_use]
    pub fn method_token(&self) -> u32 {
        (self.id & 0xFFFF_FFFF) as u32
    }

    /// Decodes every complete row of `mm_method_names`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
    pub fn read_all(image: &impl SymbolAccessor) -> Result<Vec<MarshalMethodName>> {
        let symbol = image.require_symbol(METHOD_NAMES_SYMBOL)?;
        let data = image.symbol_bytes(symbol)?;
        let is_64bit = image.is_64bit();

        row_offsets(data.len(), &Self::LAYOUT, is_64bit)
            .into_iter()
            .map(|base| {
                let mut reader = StructReader::new(data, base, &Self::LAYOUT, is_64bit)?;
                let id = reader.read()?;
                let name: StringSlot = reader.read()?;
                Ok(MarshalMethodName {
                    id,
                    name: image.string_from_pointer_field(symbol, name.offset)?,
                })
            })
            .collect()
    }
}

/// Reads `mm_class_names`.
///
/// # Errors
/// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
pub fn class_names(image: &ElfImage) -> Result<Vec<Option<String>>> {
    image.pointer_array_strings(CLASS_NAMES_SYMBOL)
}
