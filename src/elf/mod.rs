//! Read-only symbol and data access for Android shared libraries.
//!
//! The native structures this library decodes live in `libxamarin-app.so`, a shared object
//! whose exported data symbols (`application_config`, `dso_cache`, `mm_method_names`, ...)
//! are plain C arrays and structs. [`ElfImage`] parses such a library with `goblin` and
//! builds three owned indices on top of it:
//!
//! - a symbol table keyed by name, `.symtab` entries taking precedence over `.dynsym`;
//! - an address-range index over allocated sections, used to turn a virtual address into
//!   file bytes;
//! - the dynamic relocations targeting pointer slots, because pointers in position
//!   independent code are stored as zero and patched at load time by `RELATIVE` relocations.
//!
//! The [`SymbolAccessor`] trait is the seam consumed by the struct decoders in
//! [`crate::native`]; it keeps them free of ELF details.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkscope::elf::{ElfImage, SymbolAccessor};
//! use std::path::Path;
//!
//! if let Some(image) = ElfImage::from_file(Path::new("libxamarin-app.so"))? {
//!     let tag = image.read_u64("format_tag")?;
//!     println!("{} format tag 0x{tag:x}", image.abi_name().unwrap_or("unknown"));
//! }
//! # Ok::<(), apkscope::Error>(())
//! ```

mod index;
mod symbol;

pub use index::SectionInfo;
pub use symbol::{ElfSymbol, SymbolBinding, SymbolKind, SymbolVisibility};

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use goblin::elf::{
    header::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64, ET_DYN},
    Elf,
};
use ouroboros::self_referencing;

use crate::{
    file::{io::read_le, Backend, Memory, Physical},
    native::layout::pointer_size,
    Error::{self, Empty, GoblinErr},
    Result,
};
use index::ElfIndex;

/// ELF file magic, `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// The collaborator contract used by the native struct decoders.
///
/// Implemented by [`ElfImage`]. Every embedded `const char*` of the decoded structs is
/// resolved through [`SymbolAccessor::string_from_pointer_field`].
pub trait SymbolAccessor {
    /// `true` for ELFCLASS64 images.
    fn is_64bit(&self) -> bool;

    /// Looks a symbol up, `.symtab` first, then `.dynsym`.
    fn symbol(&self, name: &str) -> Option<&ElfSymbol>;

    /// Raw bytes of `symbol`.
    ///
    /// # Errors
    /// Fails if the symbol has no file-backed data (e.g. it lives in `.bss`).
    fn symbol_bytes(&self, symbol: &ElfSymbol) -> Result<&[u8]>;

    /// Resolves the pointer stored `offset` bytes into `symbol`.
    ///
    /// Returns `Ok(None)` for null or unresolvable pointers.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStruct`] if the slot extends past the symbol data.
    fn pointer_field_address(&self, symbol: &ElfSymbol, offset: usize) -> Result<Option<u64>>;

    /// Reads the NUL-terminated string at virtual address `address`.
    fn string_at(&self, address: u64) -> Option<String>;

    /// Reads `len` bytes at virtual address `address`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range is not fully inside one section with
    /// file data.
    fn data_at(&self, address: u64, len: usize) -> Result<&[u8]>;

    /// Returns `true` if the symbol exists.
    fn has_symbol(&self, name: &str) -> bool {
        self.symbol(name).is_some()
    }

    /// Looks a symbol up, failing when it is absent.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`].
    fn require_symbol(&self, name: &str) -> Result<&ElfSymbol> {
        self.symbol(name)
            .ok_or_else(|| Error::SymbolNotFound(name.to_string()))
    }

    /// Raw bytes of the symbol called `name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] or the errors of [`Self::symbol_bytes`].
    fn symbol_data(&self, name: &str) -> Result<&[u8]> {
        self.symbol_bytes(self.require_symbol(name)?)
    }

    /// Reads a `uint32_t` symbol.
    ///
    /// # Errors
    /// Fails if the symbol is missing or shorter than 4 bytes.
    fn read_u32(&self, name: &str) -> Result<u32> {
        let data = self.symbol_data(name)?;
        if data.len() < 4 {
            return Err(malformed_error!(
                "Symbol '{}' has {} bytes, expected at least 4",
                name,
                data.len()
            ));
        }
        read_le::<u32>(data)
    }

    /// Reads a `uint64_t` symbol.
    ///
    /// # Errors
    /// Fails if the symbol is missing or shorter than 8 bytes.
    fn read_u64(&self, name: &str) -> Result<u64> {
        let data = self.symbol_data(name)?;
        if data.len() < 8 {
            return Err(malformed_error!(
                "Symbol '{}' has {} bytes, expected at least 8",
                name,
                data.len()
            ));
        }
        read_le::<u64>(data)
    }

    /// Reads the string a `const char*` field points to.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStruct`] if the slot extends past the symbol data.
    fn string_from_pointer_field(
        &self,
        symbol: &ElfSymbol,
        offset: usize,
    ) -> Result<Option<String>> {
        Ok(self
            .pointer_field_address(symbol, offset)?
            .and_then(|address| self.string_at(address)))
    }
}

#[self_referencing]
struct ElfFile {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    elf: Elf<'this>,
}

/// A loaded Android shared library.
///
/// Only little-endian `ET_DYN` images for the four Android ABIs are accepted; anything else
/// makes [`ElfImage::try_load`] return `Ok(None)`.
pub struct ElfImage {
    file: ElfFile,
    index: ElfIndex,
    path: PathBuf,
}

impl ElfImage {
    /// Maps and loads the library at `path`.
    ///
    /// # Errors
    /// Returns I/O errors, or [`crate::Error::GoblinErr`] if the file has the ELF magic but
    /// cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Option<ElfImage>> {
        Self::try_load(Physical::new(path)?, path)
    }

    /// Loads a library from a buffer, typically extracted from a package.
    ///
    /// # Errors
    /// See [`ElfImage::try_load`].
    pub fn from_mem(data: Vec<u8>, path: &Path) -> Result<Option<ElfImage>> {
        Self::try_load(Memory::new(data), path)
    }

    /// Loads a library from any backend.
    ///
    /// `path` only labels the image in logs and errors.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for empty input and [`crate::Error::GoblinErr`] if
    /// parsing an ELF-magic input fails.
    pub fn try_load<T: Backend + 'static>(data: T, path: &Path) -> Result<Option<ElfImage>> {
        if data.is_empty() {
            return Err(Empty);
        }

        if data.data_slice(0, ELF_MAGIC.len()).ok() != Some(&ELF_MAGIC[..]) {
            log::debug!("{}: no ELF magic", path.display());
            return Ok(None);
        }

        let file = ElfFile::try_new(Box::new(data), |data| {
            Elf::parse(data.as_ref().data()).map_err(GoblinErr)
        })?;

        let accepted = file.with_elf(|elf| {
            if elf.header.e_type != ET_DYN {
                log::debug!("{}: not a shared object", path.display());
                return false;
            }
            if !elf.little_endian {
                log::debug!("{}: big endian images are not supported", path.display());
                return false;
            }
            if !matches!(
                elf.header.e_machine,
                EM_ARM | EM_AARCH64 | EM_386 | EM_X86_64
            ) {
                log::warn!(
                    "{}: unsupported machine type {}",
                    path.display(),
                    elf.header.e_machine
                );
                return false;
            }
            true
        });
        if !accepted {
            return Ok(None);
        }

        let index = file.with_elf(ElfIndex::build);
        Ok(Some(ElfImage {
            file,
            index,
            path: path.to_path_buf(),
        }))
    }

    /// The path this image was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `e_machine` value.
    #[must_use]
    pub fn machine(&self) -> u16 {
        self.index.machine
    }

    /// Android ABI directory name matching the machine type.
    #[must_use]
    pub fn abi_name(&self) -> Option<&'static str> {
        match self.index.machine {
            EM_AARCH64 => Some("arm64-v8a"),
            EM_ARM => Some("armeabi-v7a"),
            EM_X86_64 => Some("x86_64"),
            EM_386 => Some("x86"),
            _ => None,
        }
    }

    /// All section headers.
    #[must_use]
    pub fn sections(&self) -> &[SectionInfo] {
        &self.index.sections
    }

    /// File range of the first section called `name`.
    ///
    /// `None` if there is no such section, it has no file data, or it extends past the end of
    /// the file.
    #[must_use]
    pub fn section_range(&self, name: &str) -> Option<Range<usize>> {
        let section = self
            .index
            .sections
            .iter()
            .find(|section| section.name == name && !section.nobits)?;
        let start = usize::try_from(section.offset).ok()?;
        let end = start.checked_add(usize::try_from(section.size).ok()?)?;
        (end <= self.bytes().len()).then_some(start..end)
    }

    /// Contents of the first section called `name`; see [`ElfImage::section_range`].
    #[must_use]
    pub fn section_bytes(&self, name: &str) -> Option<&[u8]> {
        self.section_range(name)
            .and_then(|range| self.bytes().get(range))
    }

    /// Iterates over all indexed symbols, in no particular order.
    pub fn symbols(&self) -> impl Iterator<Item = &ElfSymbol> {
        self.index.symbols.values()
    }

    /// Resolves every slot of a `const char* const name[]` symbol.
    ///
    /// Null or unresolvable pointers yield `None` entries.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] or symbol data errors.
    pub fn pointer_array_strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        let symbol = self.require_symbol(name)?;
        let width = pointer_size(self.is_64bit());
        let count = self.symbol_bytes(symbol)?.len() / width;

        (0..count)
            .map(|slot| self.string_from_pointer_field(symbol, slot * width))
            .collect()
    }

    fn bytes(&self) -> &[u8] {
        self.file.borrow_data().data()
    }

    fn file_range(&self, address: u64, len: usize) -> Result<&[u8]> {
        let Some(section) = self.index.section_for(address) else {
            return Err(out_of_bounds_error!());
        };
        let Some(offset) = section.file_offset(address) else {
            return Err(out_of_bounds_error!());
        };

        let section_end = section.offset + section.size;
        match offset.checked_add(len as u64) {
            Some(end) if end <= section_end => {}
            _ => return Err(out_of_bounds_error!()),
        }

        let Ok(offset) = usize::try_from(offset) else {
            return Err(out_of_bounds_error!());
        };
        self.file.borrow_data().data_slice(offset, len)
    }
}

impl SymbolAccessor for ElfImage {
    fn is_64bit(&self) -> bool {
        self.index.is_64bit
    }

    fn symbol(&self, name: &str) -> Option<&ElfSymbol> {
        self.index.symbols.get(name)
    }

    fn symbol_bytes(&self, symbol: &ElfSymbol) -> Result<&[u8]> {
        if symbol.size == 0 {
            return Ok(&[]);
        }

        if let Some(section) = self.index.section_for(symbol.address) {
            if section.nobits {
                return Err(malformed_error!(
                    "{}: symbol '{}' lives in '{}' which has no file data",
                    self.path.display(),
                    symbol.name,
                    section.name
                ));
            }
        }

        let Ok(size) = usize::try_from(symbol.size) else {
            return Err(out_of_bounds_error!());
        };
        self.file_range(symbol.address, size)
    }

    fn pointer_field_address(&self, symbol: &ElfSymbol, offset: usize) -> Result<Option<u64>> {
        let data = self.symbol_bytes(symbol)?;
        let width = pointer_size(self.is_64bit());
        if offset + width > data.len() {
            return Err(Error::TruncatedStruct {
                needed: offset + width,
                available: data.len(),
            });
        }

        let raw = if self.is_64bit() {
            read_le::<u64>(&data[offset..])?
        } else {
            u64::from(read_le::<u32>(&data[offset..])?)
        };

        let slot = symbol.address + offset as u64;
        let address = match self.index.relocations.get(&slot) {
            Some(reloc) if reloc.relative => match reloc.addend {
                // RELA carries the target, REL keeps it in the slot
                Some(addend) => addend as u64,
                None => raw,
            },
            Some(reloc) => {
                log::warn!(
                    "{}: pointer slot 0x{slot:x} in '{}' uses unsupported relocation type {}",
                    self.path.display(),
                    symbol.name,
                    reloc.r_type
                );
                return Ok(None);
            }
            None => raw,
        };

        Ok((address != 0).then_some(address))
    }

    fn string_at(&self, address: u64) -> Option<String> {
        let section = self.index.section_for(address)?;
        let start = usize::try_from(section.file_offset(address)?).ok()?;
        let end = usize::try_from(section.offset + section.size).ok()?;
        let bytes = self.bytes().get(start..end.min(self.bytes().len()))?;

        let Some(terminator) = bytes.iter().position(|byte| *byte == 0) else {
            log::warn!(
                "{}: string at 0x{address:x} is not NUL-terminated within '{}'",
                self.path.display(),
                section.name
            );
            return None;
        };

        Some(String::from_utf8_lossy(&bytes[..terminator]).into_owned())
    }

    fn data_at(&self, address: u64, len: usize) -> Result<&[u8]> {
        self.file_range(address, len)
    }
}
