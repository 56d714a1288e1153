//! Release-build type maps linking Java type names to managed type tokens.
//!
//! The generator emits one `TypeMapModule` per managed assembly. Each module points to a
//! sorted array of `{type_token_id, java_map_index}` pairs (plus a second array for tokens
//! that map to an already used Java name). On the Java side, `map_java` rows are parallel to
//! `java_type_names` and to `map_java_hashes`, the latter holding the hash of each name at
//! the target word size.

use uguid::Guid;

use crate::{
    elf::{ElfImage, SymbolAccessor},
    file::parser::Parser,
    native::layout::{row_offsets, FieldKind, Pointer, StringSlot, StructLayout, StructReader},
    Result,
};

/// Symbol holding the number of `map_modules` rows.
pub const MODULE_COUNT_SYMBOL: &str = "map_module_count";
/// Symbol holding the `TypeMapModule` array.
pub const MODULES_SYMBOL: &str = "map_modules";
/// Symbol holding the number of `map_java` rows.
pub const JAVA_TYPE_COUNT_SYMBOL: &str = "java_type_count";
/// Symbol holding the `TypeMapJava` array.
pub const JAVA_MAP_SYMBOL: &str = "map_java";
/// Symbol holding the Java type name array.
pub const JAVA_TYPE_NAMES_SYMBOL: &str = "java_type_names";
/// Symbol holding the Java type name hashes.
pub const JAVA_HASHES_SYMBOL: &str = "map_java_hashes";

/// One `TypeMapModuleEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapModuleEntry {
    /// Metadata token of the managed type
    pub type_token_id: u32,
    /// Row of `map_java` describing the Java peer
    pub java_map_index: u32,
}

/// One `TypeMapModule`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapModule {
    /// MVID of the managed assembly
    pub module_uuid: Guid,
    /// Rows behind `map`
    pub entry_count: u32,
    /// Rows behind `duplicate_map`
    pub duplicate_count: u32,
    /// Assembly name, `None` if the pointer is null or unresolvable
    pub assembly_name: Option<String>,
    /// `MonoImage*` slot, filled at runtime
    pub image: Pointer,
    /// Width of the Java name buffers
    pub java_name_width: u32,
    /// Legacy name map pointer
    pub java_map: Pointer,
    /// Entries behind `map`
    pub map: Vec<TypeMapModuleEntry>,
    /// Entries behind `duplicate_map`
    pub duplicate_map: Vec<TypeMapModuleEntry>,
}

impl TypeMapModule {
    // module_uuid is a byte array; four u32 slots give the same offsets without raising the
    // struct alignment above the native one
    /// Field layout of the native struct.
    pub const LAYOUT: StructLayout = StructLayout::new(&[
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::U32,
        FieldKind::Pointer,
        FieldKind::Pointer,
        FieldKind::String,
        FieldKind::Pointer,
        FieldKind::U32,
        FieldKind::Pointer,
    ]);

    const UUID_SIZE: usize = 16;
    const ENTRY_SIZE: usize = 8;

    /// Decodes every `map_modules` row and follows its entry pointers.
    ///
    /// # Errors
    /// Fails if a symbol is missing, if `map_module_count` disagrees with the table size, if a
    /// module with entries has a null `map`, or if an entry array is outside the image.
    pub fn read_all(image: &impl SymbolAccessor) -> Result<Vec<TypeMapModule>> {
        let symbol = image.require_symbol(MODULES_SYMBOL)?;
        let data = image.symbol_bytes(symbol)?;
        let is_64bit = image.is_64bit();

        let rows = row_offsets(data.len(), &Self::LAYOUT, is_64bit);
        let declared = image.read_u32(MODULE_COUNT_SYMBOL)?;
        if declared as usize != rows.len() {
            return Err(malformed_error!(
                "{} is {} but {} holds {} rows",
                MODULE_COUNT_SYMBOL,
                declared,
                MODULES_SYMBOL,
                rows.len()
            ));
        }

        let offsets = Self::LAYOUT.offsets(is_64bit);
        rows.into_iter()
            .map(|base| {
                let mut reader = StructReader::new(data, base, &Self::LAYOUT, is_64bit)?;
                for _ in 0..Self::UUID_SIZE / 4 {
                    reader.read::<u32>()?;
                }
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(&data[base..base + Self::UUID_SIZE]);

                let entry_count: u32 = reader.read()?;
                let duplicate_count: u32 = reader.read()?;
                let _map: Pointer = reader.read()?;
                let _duplicate_map: Pointer = reader.read()?;
                let map_slot = base + offsets[6];
                let duplicate_slot = base + offsets[7];
                let assembly_name: StringSlot = reader.read()?;
                let module_image = reader.read()?;
                let java_name_width = reader.read()?;
                let java_map = reader.read()?;

                let assembly_name = image.string_from_pointer_field(symbol, assembly_name.offset)?;
                let map = match image.pointer_field_address(symbol, map_slot)? {
                    Some(address) => Self::read_entries(image, address, entry_count)?,
                    None if entry_count == 0 => Vec::new(),
                    None => {
                        return Err(malformed_error!(
                            "Type map module {} has {} entries but a null map",
                            assembly_name.as_deref().unwrap_or("<unnamed>"),
                            entry_count
                        ))
                    }
                };
                let duplicate_map = match image.pointer_field_address(symbol, duplicate_slot)? {
                    Some(address) => Self::read_entries(image, address, duplicate_count)?,
                    None => {
                        if duplicate_count != 0 {
                            log::warn!(
                                "Type map module has {duplicate_count} duplicates but no duplicate map"
                            );
                        }
                        Vec::new()
                    }
                };

                Ok(TypeMapModule {
                    module_uuid: Guid::from_bytes(uuid),
                    entry_count,
                    duplicate_count,
                    assembly_name,
                    image: module_image,
                    java_name_width,
                    java_map,
                    map,
                    duplicate_map,
                })
            })
            .collect()
    }

    fn read_entries(
        image: &impl SymbolAccessor,
        address: u64,
        count: u32,
    ) -> Result<Vec<TypeMapModuleEntry>> {
        let data = image.data_at(address, count as usize * Self::ENTRY_SIZE)?;
        let mut parser = Parser::new(data);

        let mut entries = Vec::with_capacity(count as usize);
        while parser.has_more_data() {
            entries.push(TypeMapModuleEntry {
                type_token_id: parser.read_le::<u32>()?,
                java_map_index: parser.read_le::<u32>()?,
            });
        }
        Ok(entries)
    }

    /// Looks up the entry for a managed type token; `map` is sorted by token.
    #[must_use]
    pub fn entry_for_token(&self, token: u32) -> Option<&TypeMapModuleEntry> {
        self.map
            .binary_search_by_key(&token, |entry| entry.type_token_id)
            .ok()
            .map(|index| &self.map[index])
            .or_else(|| {
                self.duplicate_map
                    .iter()
                    .find(|entry| entry.type_token_id == token)
            })
    }
}

/// One `TypeMapJava`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapJava {
    /// Row of `map_modules` declaring the managed peer
    pub module_index: u32,
    /// Metadata token of the managed peer
    pub type_token_id: u32,
    /// Index into `java_type_names`
    pub java_name_index: u32,
}

impl TypeMapJava {
    /// Field layout of the native struct.
    pub const LAYOUT: StructLayout =
        StructLayout::new(&[FieldKind::U32, FieldKind::U32, FieldKind::U32]);

    /// Decodes every `map_java` row.
    ///
    /// # Errors
    /// Fails if a symbol is missing or `java_type_count` disagrees with the table size.
    pub fn read_all(image: &impl SymbolAccessor) -> Result<Vec<TypeMapJava>> {
        let data = image.symbol_data(JAVA_MAP_SYMBOL)?;
        let is_64bit = image.is_64bit();

        let rows = row_offsets(data.len(), &Self::LAYOUT, is_64bit);
        let declared = image.read_u32(JAVA_TYPE_COUNT_SYMBOL)?;
        if declared as usize != rows.len() {
            return Err(malformed_error!(
                "{} is {} but {} holds {} rows",
                JAVA_TYPE_COUNT_SYMBOL,
                declared,
                JAVA_MAP_SYMBOL,
                rows.len()
            ));
        }

        rows.into_iter()
            .map(|base| {
                let mut reader = StructReader::new(data, base, &Self::LAYOUT, is_64bit)?;
                Ok(TypeMapJava {
                    module_index: reader.read()?,
                    type_token_id: reader.read()?,
                    java_name_index: reader.read()?,
                })
            })
            .collect()
    }
}

/// All type-map tables of one `libxamarin-app.so`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMaps {
    /// `map_modules`
    pub modules: Vec<TypeMapModule>,
    /// `map_java`
    pub java: Vec<TypeMapJava>,
    /// `java_type_names`
    pub java_type_names: Vec<Option<String>>,
    /// `map_java_hashes`, widened to 64 bits on 32-bit targets
    pub java_hashes: Vec<u64>,
}

impl TypeMaps {
    /// Reads every type-map table.
    ///
    /// # Errors
    /// Returns the errors of [`TypeMapModule::read_all`] and [`TypeMapJava::read_all`].
    pub fn read(image: &ElfImage) -> Result<Self> {
        let modules = TypeMapModule::read_all(image)?;
        let java = TypeMapJava::read_all(image)?;
        let java_type_names = image.pointer_array_strings(JAVA_TYPE_NAMES_SYMBOL)?;

        let hashes = image.symbol_data(JAVA_HASHES_SYMBOL)?;
        let mut parser = Parser::new(hashes);
        let width = if image.is_64bit() { 8 } else { 4 };
        let mut java_hashes = Vec::with_capacity(hashes.len() / width);
        while parser.remaining() >= width {
            java_hashes.push(if image.is_64bit() {
                parser.read_le::<u64>()?
            } else {
                u64::from(parser.read_le::<u32>()?)
            });
        }

        if java_hashes.len() != java.len() {
            log::warn!(
                "{} has {} hashes for {} Java types",
                JAVA_HASHES_SYMBOL,
                java_hashes.len(),
                java.len()
            );
        }

        Ok(TypeMaps {
            modules,
            java,
            java_type_names,
            java_hashes,
        })
    }

    /// Java type name of a `map_java` row.
    #[must_use]
    pub fn java_name(&self, row: &TypeMapJava) -> Option<&str> {
        self.java_type_names
            .get(row.java_name_index as usize)
            .and_then(|name| name.as_deref())
    }

    /// Finds the managed peer of a Java type.
    ///
    /// Returns the declaring module together with the managed type token.
    #[must_use]
    pub fn managed_type(&self, java_name: &str) -> Option<(&TypeMapModule, u32)> {
        let row = self
            .java
            .iter()
            .find(|row| self.java_name(row) == Some(java_name))?;
        let module = self.modules.get(row.module_index as usize)?;
        Some((module, row.type_token_id))
    }

    /// Finds the Java peer of a managed type token declared in `module_index`.
    #[must_use]
    pub fn java_type(&self, module_index: usize, token: u32) -> Option<&str> {
        let entry = self.modules.get(module_index)?.entry_for_token(token)?;
        let row = self.java.get(entry.java_map_index as usize)?;
        self.java_name(row)
    }
}
