use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{assemblystore::AssemblyStore, detect::DetectedFormat, Result};

use super::{require, Capabilities, FacetCell, InputReader};

/// Reader for an assembly store, standalone or carried by a shared library.
pub struct AssemblyStoreReader {
    path: PathBuf,
    in_payload: bool,
    store: FacetCell<AssemblyStore>,
}

impl AssemblyStoreReader {
    /// Creates a reader for an `assemblies*.blob` file; the store is mapped on first facet
    /// access.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        AssemblyStoreReader {
            path: path.to_path_buf(),
            in_payload: false,
            store: FacetCell::new(),
        }
    }

    /// Creates a reader for the store in the `payload` section of the library at `path`.
    #[must_use]
    pub fn from_elf_payload(path: &Path) -> Self {
        AssemblyStoreReader {
            in_payload: true,
            ..Self::new(path)
        }
    }
}

impl InputReader for AssemblyStoreReader {
    fn format(&self) -> DetectedFormat {
        DetectedFormat::AssemblyStore
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ASSEMBLY_STORE | Capabilities::ASSEMBLY_EXTRACTION
    }

    fn assembly_store(&self) -> Result<Arc<AssemblyStore>> {
        require(self, Capabilities::ASSEMBLY_STORE)?;
        self.store.get_or_try_init(|| {
            if self.in_payload {
                AssemblyStore::from_elf_payload(&self.path)
            } else {
                AssemblyStore::from_file(&self.path)
            }
        })
    }
}
