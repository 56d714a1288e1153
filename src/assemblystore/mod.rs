//! Assembly stores (`assemblies*.blob`).
//!
//! Release builds pack managed assemblies into one store per ABI plus an optional shared
//! store. Every store starts with a packed 20 byte little-endian header, followed by
//!
//! - `local_entry_count` assembly descriptors of 24 bytes;
//! - in the shared store (id 0) only, the global hash index twice, first for 32-bit and then
//!   for 64-bit hashes, `global_entry_count` rows of 20 bytes each.
//!
//! The architecture of a standalone store is only recorded in its file name,
//! `assemblies.<arch>.blob`. Stores can also travel inside the `payload` section of a shared
//! library, whose machine type then names the architecture.

mod entry;

pub use entry::{AssemblyStoreAssembly, AssemblyStoreHashEntry};

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use crate::{
    elf::ElfImage,
    file::{parser::Parser, Backend, Memory, Physical},
    Error, Result,
};
use entry::ensure_rows;

/// `XABA`, little-endian.
pub const ASSEMBLY_STORE_MAGIC: u32 = 0x4142_4158;

/// Highest store format version understood here.
pub const ASSEMBLY_STORE_FORMAT_VERSION: u32 = 1;

/// Section of a shared library that can carry an assembly store.
pub const PAYLOAD_SECTION: &str = "payload";

/// The fixed store header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyStoreHeader {
    /// Always [`ASSEMBLY_STORE_MAGIC`]
    pub magic: u32,
    /// Store format version
    pub version: u32,
    /// Assemblies in this store
    pub local_entry_count: u32,
    /// Entries in the global hash index, only present in the shared store
    pub global_entry_count: u32,
    /// 0 for the shared store, otherwise the id of an architecture specific store
    pub store_id: u32,
}

impl AssemblyStoreHeader {
    /// Size of the packed header.
    pub const SIZE: usize = 20;

    /// Reads the header at the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidData`] for a wrong magic, version 0 or a version newer
    /// than [`ASSEMBLY_STORE_FORMAT_VERSION`], and [`crate::Error::OutOfBounds`] for input
    /// shorter than 20 bytes.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);

        let magic = parser.read_le::<u32>()?;
        if magic != ASSEMBLY_STORE_MAGIC {
            return Err(invalid_data!(0, "bad assembly store magic 0x{:08x}", magic));
        }

        let version = parser.read_le::<u32>()?;
        if version == 0 {
            return Err(invalid_data!(4, "invalid assembly store version 0"));
        }
        if version > ASSEMBLY_STORE_FORMAT_VERSION {
            return Err(invalid_data!(
                4,
                "assembly store version {} is newer than the supported {}",
                version,
                ASSEMBLY_STORE_FORMAT_VERSION
            ));
        }

        Ok(AssemblyStoreHeader {
            magic,
            version,
            local_entry_count: parser.read_le::<u32>()?,
            global_entry_count: parser.read_le::<u32>()?,
            store_id: parser.read_le::<u32>()?,
        })
    }

    /// Returns `true` for stores holding assemblies of a single ABI.
    #[must_use]
    pub fn is_arch_specific(&self) -> bool {
        self.store_id > 0
    }

    /// Returns `true` for the shared store, which carries the global index.
    #[must_use]
    pub fn has_global_index(&self) -> bool {
        self.store_id == 0
    }
}

/// Returns `true` if `data` starts with the store magic.
#[must_use]
pub fn has_store_magic(data: &[u8]) -> bool {
    data.get(..4) == Some(&ASSEMBLY_STORE_MAGIC.to_le_bytes()[..])
}

/// Recovers the ABI name from a store file name of the form `assemblies.<arch>.blob`.
///
/// `x86_64` is kept as is; in any other architecture `_` becomes `-`, turning
/// `arm64_v8a` into `arm64-v8a`.
#[must_use]
pub fn arch_from_file_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let parts: Vec<&str> = file_name.split('.').collect();
    match parts.as_slice() {
        ["assemblies", "x86_64", "blob"] => Some("x86_64".to_string()),
        ["assemblies", arch, "blob"] if !arch.is_empty() => Some(arch.replace('_', "-")),
        _ => None,
    }
}

/// An opened assembly store.
pub struct AssemblyStore {
    data: Box<dyn Backend>,
    range: Range<usize>,
    header: AssemblyStoreHeader,
    assemblies: Vec<AssemblyStoreAssembly>,
    global_index32: Vec<AssemblyStoreHashEntry>,
    global_index64: Vec<AssemblyStoreHashEntry>,
    arch: Option<String>,
    path: PathBuf,
}

impl AssemblyStore {
    /// Maps the store at `path` and decodes its tables.
    ///
    /// # Errors
    /// Returns I/O errors and the errors of [`AssemblyStore::from_mem`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = Physical::new(path)?;
        let range = 0..data.len();
        Self::load(Box::new(data), range, arch_from_file_name(path), path)
    }

    /// Decodes a store held in memory; `path` supplies the file name.
    ///
    /// # Errors
    /// Returns the errors of [`AssemblyStoreHeader::read`], and
    /// [`crate::Error::InvalidData`] if the descriptor or index tables run past the end of
    /// the store.
    pub fn from_mem(data: Vec<u8>, path: &Path) -> Result<Self> {
        let range = 0..data.len();
        Self::load(Box::new(Memory::new(data)), range, arch_from_file_name(path), path)
    }

    /// Opens the store carried in the `payload` section of the shared library at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the file is not a supported shared library or
    /// has no `payload` section, otherwise the errors of [`AssemblyStore::from_mem`].
    pub fn from_elf_payload(path: &Path) -> Result<Self> {
        let Some(image) = ElfImage::from_file(path)? else {
            return Err(malformed_error!(
                "{} is not a supported shared library",
                path.display()
            ));
        };
        let Some(range) = image.section_range(PAYLOAD_SECTION) else {
            return Err(malformed_error!(
                "{} has no '{}' section",
                path.display(),
                PAYLOAD_SECTION
            ));
        };
        let arch = image.abi_name().map(str::to_string);
        log::debug!(
            "{}: assembly store payload at 0x{:x}, {} bytes",
            path.display(),
            range.start,
            range.len()
        );

        Self::load(Box::new(Physical::new(path)?), range, arch, path)
    }

    fn load(
        data: Box<dyn Backend>,
        range: Range<usize>,
        arch: Option<String>,
        path: &Path,
    ) -> Result<Self> {
        let bytes = data.data_slice(range.start, range.len())?;
        let header = AssemblyStoreHeader::read(bytes)?;
        if header.is_arch_specific() && arch.is_none() {
            log::info!(
                "{}: architecture specific store {} without an architecture in its name",
                path.display(),
                header.store_id
            );
        }

        let mut parser = Parser::new(bytes);
        parser.seek(AssemblyStoreHeader::SIZE)?;

        ensure_rows(
            &parser,
            header.local_entry_count,
            AssemblyStoreAssembly::SIZE,
            "assembly descriptor",
        )?;
        let assemblies = (0..header.local_entry_count)
            .map(|_| AssemblyStoreAssembly::read(&mut parser))
            .collect::<Result<Vec<_>>>()?;
        for (index, assembly) in assemblies.iter().enumerate() {
            if assembly.end() > bytes.len() as u64 {
                log::warn!(
                    "{}: data of assembly {index} ends at 0x{:x}, past the {} byte store",
                    path.display(),
                    assembly.end(),
                    bytes.len()
                );
            }
        }

        let (global_index32, global_index64) = if header.has_global_index() {
            (
                Self::read_index(&mut parser, header.global_entry_count, true)?,
                Self::read_index(&mut parser, header.global_entry_count, false)?,
            )
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(AssemblyStore {
            data,
            range,
            header,
            assemblies,
            global_index32,
            global_index64,
            arch,
            path: path.to_path_buf(),
        })
    }

    fn read_index(
        parser: &mut Parser,
        count: u32,
        is_32bit: bool,
    ) -> Result<Vec<AssemblyStoreHashEntry>> {
        let what = if is_32bit {
            "32-bit hash index"
        } else {
            "64-bit hash index"
        };
        ensure_rows(parser, count, AssemblyStoreHashEntry::SIZE, what)?;
        (0..count)
            .map(|_| AssemblyStoreHashEntry::read(parser, is_32bit))
            .collect()
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &AssemblyStoreHeader {
        &self.header
    }

    /// The assembly descriptors, in store order.
    #[must_use]
    pub fn assemblies(&self) -> &[AssemblyStoreAssembly] {
        &self.assemblies
    }

    /// The 32-bit global hash index; empty unless this is the shared store.
    #[must_use]
    pub fn global_index32(&self) -> &[AssemblyStoreHashEntry] {
        &self.global_index32
    }

    /// The 64-bit global hash index; empty unless this is the shared store.
    #[must_use]
    pub fn global_index64(&self) -> &[AssemblyStoreHashEntry] {
        &self.global_index64
    }

    /// ABI recovered from the file name, or from the machine type of the carrying library.
    #[must_use]
    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    /// The store file, or the library carrying it.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the store inside [`AssemblyStore::path`]; 0 unless it is a library payload.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.range.start
    }

    /// Size of the store in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns `true` for an empty store, which cannot be decoded in the first place.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Extracts the image of the assembly called `name`.
    ///
    /// # Errors
    /// Always returns [`crate::Error::NotImplemented`].
    pub fn extract_assembly(&self, name: &str) -> Result<Vec<u8>> {
        log::debug!("{}: extraction of '{name}' requested", self.path.display());
        Err(Error::NotImplemented("assembly extraction from assembly stores"))
    }

    /// Extracts every assembly of the store.
    ///
    /// # Errors
    /// Always returns [`crate::Error::NotImplemented`].
    pub fn extract_assemblies(&self) -> Result<Vec<(String, Vec<u8>)>> {
        Err(Error::NotImplemented("assembly extraction from assembly stores"))
    }
}

impl std::fmt::Debug for AssemblyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyStore")
            .field("path", &self.path)
            .field("offset", &self.range.start)
            .field("header", &self.header)
            .field("assemblies", &self.assemblies.len())
            .field("arch", &self.arch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{
        elf::{ElfBuilder, StructBytes},
        store::assembly_store,
    };

    fn header(version: u32, store_id: u32) -> Vec<u8> {
        let mut data = b"XABA".to_vec();
        for value in [version, 12, 24, store_id] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data
    }

    #[test]
    fn shared_store() {
        let header = AssemblyStoreHeader::read(&header(1, 0)).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.magic, ASSEMBLY_STORE_MAGIC);
        assert_eq!(header.local_entry_count, 12);
        assert_eq!(header.global_entry_count, 24);
        assert!(!header.is_arch_specific());
        assert!(header.has_global_index());
    }

    #[test]
    fn arch_specific_store() {
        let store = AssemblyStore::from_mem(
            assembly_store(3, 2, 0),
            Path::new("/tmp/assemblies.arm64_v8a.blob"),
        )
        .unwrap();
        assert!(store.header().is_arch_specific());
        assert_eq!(store.arch(), Some("arm64-v8a"));
        assert_eq!(store.offset(), 0);
        assert_eq!(store.len(), 20 + 2 * 24 + 2 * 4);

        let assemblies = store.assemblies();
        assert_eq!(assemblies.len(), 2);
        assert_eq!(assemblies[0].data_offset, 68);
        assert_eq!(assemblies[1].data_offset, 72);
        assert_eq!(assemblies[1].end(), store.len() as u64);
        assert!(!assemblies[0].has_debug_data());
        assert!(store.global_index32().is_empty());
        assert!(store.global_index64().is_empty());

        assert!(matches!(
            store.extract_assembly("Mono.Android.dll"),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn shared_store_tables() {
        let store =
            AssemblyStore::from_mem(assembly_store(0, 2, 4), Path::new("assemblies.blob")).unwrap();
        assert_eq!(store.arch(), None);
        assert_eq!(store.assemblies().len(), 2);

        let index32 = store.global_index32();
        let index64 = store.global_index64();
        assert_eq!((index32.len(), index64.len()), (4, 4));
        assert!(index32.iter().all(|entry| entry.is_32bit));
        assert!(index64.iter().all(|entry| !entry.is_32bit));
        assert_eq!(index32[3].hash, (32 << 32) | 3);
        assert_eq!(index64[0].hash, 64 << 32);
        assert_eq!(index64[2].mapping_index, 2);
        assert_eq!(index64[2].local_store_index, 2);
        assert_eq!(index64[2].store_id, 0);
    }

    #[test]
    fn truncated_tables_are_rejected() {
        // 64-bit index cut short by one byte
        let mut data = assembly_store(0, 1, 3);
        data.truncate(20 + 24 + 2 * 3 * 20 - 1);
        assert!(matches!(
            AssemblyStore::from_mem(data, Path::new("assemblies.blob")),
            Err(Error::InvalidData { offset, .. }) if offset == 20 + 24 + 3 * 20
        ));

        // descriptor count far beyond the file
        let mut data = assembly_store(2, 1, 0);
        data[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            AssemblyStore::from_mem(data, Path::new("assemblies.x86.blob")),
            Err(Error::InvalidData { offset: 20, .. })
        ));

        // arch specific stores have no index, whatever the header says
        let mut data = assembly_store(1, 1, 0);
        data[12..16].copy_from_slice(&1000u32.to_le_bytes());
        let store = AssemblyStore::from_mem(data, Path::new("assemblies.x86.blob")).unwrap();
        assert_eq!(store.header().global_entry_count, 1000);
        assert!(store.global_index64().is_empty());
    }

    #[test]
    fn store_in_library_payload() {
        let dir = tempfile::tempdir().unwrap();
        let payload = assembly_store(1, 3, 0);
        let mut builder = ElfBuilder::new(true).payload(&payload);
        builder.symbol("format_tag", StructBytes::new(true).u64(1));
        let path = dir.path().join("libassemblies.arm64-v8a.blob.so");
        std::fs::write(&path, builder.build()).unwrap();

        let store = AssemblyStore::from_elf_payload(&path).unwrap();
        assert_ne!(store.offset(), 0);
        assert_eq!(store.len(), payload.len());
        assert_eq!(store.assemblies().len(), 3);
        assert_eq!(store.arch(), Some("arm64-v8a"));

        let plain = dir.path().join("libplain.so");
        std::fs::write(&plain, ElfBuilder::new(false).build()).unwrap();
        assert!(matches!(
            AssemblyStore::from_elf_payload(&plain),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn bad_headers() {
        assert!(matches!(
            AssemblyStoreHeader::read(&header(0, 0)),
            Err(Error::InvalidData { offset: 4, .. })
        ));
        assert!(AssemblyStoreHeader::read(&header(2, 0)).is_err());

        let mut data = header(1, 0);
        data[0] = b'Y';
        assert!(matches!(
            AssemblyStoreHeader::read(&data),
            Err(Error::InvalidData { offset: 0, .. })
        ));
        assert!(matches!(
            AssemblyStoreHeader::read(&header(1, 0)[..16]),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn arch_names() {
        let arch = |name: &str| arch_from_file_name(Path::new(name));
        assert_eq!(arch("assemblies.arm64-v8a.blob").as_deref(), Some("arm64-v8a"));
        assert_eq!(arch("assemblies.armeabi_v7a.blob").as_deref(), Some("armeabi-v7a"));
        assert_eq!(arch("lib/assemblies.x86_64.blob").as_deref(), Some("x86_64"));
        assert_eq!(arch("assemblies.x86.blob").as_deref(), Some("x86"));
        assert_eq!(arch("assemblies.blob"), None);
        assert_eq!(arch("assemblies.arm64-v8a.blob.bak"), None);
        assert_eq!(arch("store.arm64-v8a.blob"), None);
    }

    #[test]
    fn magic_sniffing() {
        assert!(has_store_magic(b"XABA\x01\x00"));
        assert!(!has_store_magic(b"XAB"));
        assert!(!has_store_magic(b"\x7fELF"));
    }
}
