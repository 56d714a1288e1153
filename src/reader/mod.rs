//! Capability-gated access to the facets of a detected input.
//!
//! Detection ends with an [`InputReader`] for the recognised format. Every reader declares
//! up front which [`Capabilities`] it has; asking for a facet outside that set fails with
//! [`crate::Error::NotSupported`] before the input is opened. Supported facets are built on
//! first use and cached for the life of the reader, so repeated and concurrent calls share
//! one decoded value.
//!
//! | Reader | Capabilities |
//! |---|---|
//! | [`ApkReader`] | `APP_INFO`, `XAMARIN_APP`, `TYPEMAPS` |
//! | [`AabReader`] | `XAMARIN_APP`, `TYPEMAPS` |
//! | [`ElfReader`] | `XAMARIN_APP`, `TYPEMAPS` |
//! | [`AssemblyStoreReader`] | `ASSEMBLY_STORE`, `ASSEMBLY_EXTRACTION` |
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkscope::{detect, reader::Capabilities};
//! use std::path::Path;
//!
//! let detection = detect(Path::new("app.apk"))?;
//! if let Some(reader) = detection.reader() {
//!     if reader.supports(Capabilities::APP_INFO) {
//!         let info = reader.app_info()?;
//!         println!("{:?} runs on {:?}", info.package, info.runtime);
//!     }
//!     let maps = reader.typemaps()?;
//!     println!("{} managed modules", maps.modules.len());
//! }
//! # Ok::<(), apkscope::Error>(())
//! ```

mod elf;
mod facet;
mod options;
mod package;
mod store;

pub use elf::ElfReader;
pub use facet::FacetCell;
pub use options::{ReaderOptions, DEFAULT_ABI_PREFERENCE, DEFAULT_MAX_ENTRY_SIZE};
pub use package::{AabReader, ApkReader, XAMARIN_APP_LIBRARY};
pub use store::AssemblyStoreReader;

use std::{path::Path, sync::Arc};

use bitflags::bitflags;

use crate::{
    android::AppInfo,
    assemblystore::AssemblyStore,
    axml::XmlDocument,
    detect::DetectedFormat,
    native::{TypeMaps, XamarinApp},
    Error, Result,
};

bitflags! {
    /// Facets a reader can provide.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Extracting assemblies out of an assembly store
        const ASSEMBLY_EXTRACTION = 0x01;
        /// The assembly store header
        const ASSEMBLY_STORE = 0x02;
        /// The decoded `libxamarin-app.so`
        const XAMARIN_APP = 0x04;
        /// Type-map tables of `libxamarin-app.so`
        const TYPEMAPS = 0x08;
        /// Manifest derived application facts
        const APP_INFO = 0x10;
    }
}

impl Capabilities {
    /// Human readable name of a single capability.
    #[must_use]
    pub fn name(self) -> &'static str {
        if self == Capabilities::ASSEMBLY_EXTRACTION {
            "assembly extraction"
        } else if self == Capabilities::ASSEMBLY_STORE {
            "assembly store"
        } else if self == Capabilities::XAMARIN_APP {
            "xamarin app"
        } else if self == Capabilities::TYPEMAPS {
            "type maps"
        } else if self == Capabilities::APP_INFO {
            "app info"
        } else {
            "capability set"
        }
    }

    /// Names of every capability in the set.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(Capabilities::name).collect()
    }
}

/// A reader over one detected input.
///
/// Facet accessors of capabilities the reader lacks keep their default implementation,
/// which returns [`Error::NotSupported`] without touching the input.
pub trait InputReader: Send + Sync {
    /// The format this reader was created for.
    fn format(&self) -> DetectedFormat;

    /// The input file.
    fn path(&self) -> &Path;

    /// The capabilities this reader provides.
    fn capabilities(&self) -> Capabilities;

    /// Returns `true` if every capability in `capability` is provided.
    fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities().contains(capability)
    }

    /// Application facts from the manifest and the package layout.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] unless the reader has [`Capabilities::APP_INFO`].
    fn app_info(&self) -> Result<Arc<AppInfo>> {
        Err(not_supported(self.format(), Capabilities::APP_INFO))
    }

    /// The decoded manifest document. Gated by [`Capabilities::APP_INFO`].
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] unless the reader has [`Capabilities::APP_INFO`].
    fn manifest(&self) -> Result<Arc<XmlDocument>> {
        Err(not_supported(self.format(), Capabilities::APP_INFO))
    }

    /// The decoded `libxamarin-app.so`.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] unless the reader has [`Capabilities::XAMARIN_APP`].
    fn xamarin_app(&self) -> Result<Arc<XamarinApp>> {
        Err(not_supported(self.format(), Capabilities::XAMARIN_APP))
    }

    /// Type-map tables of `libxamarin-app.so`.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] unless the reader has [`Capabilities::TYPEMAPS`].
    fn typemaps(&self) -> Result<Arc<TypeMaps>> {
        Err(not_supported(self.format(), Capabilities::TYPEMAPS))
    }

    /// The assembly store.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] unless the reader has [`Capabilities::ASSEMBLY_STORE`].
    fn assembly_store(&self) -> Result<Arc<AssemblyStore>> {
        Err(not_supported(self.format(), Capabilities::ASSEMBLY_STORE))
    }
}

impl std::fmt::Debug for dyn InputReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputReader")
            .field("format", &self.format())
            .field("path", &self.path())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

pub(crate) fn not_supported(format: DetectedFormat, capability: Capabilities) -> Error {
    Error::NotSupported {
        capability: capability.name(),
        format: format.name(),
    }
}

/// Fails with [`Error::NotSupported`] if `reader` lacks `capability`.
pub(crate) fn require<R: InputReader + ?Sized>(reader: &R, capability: Capabilities) -> Result<()> {
    if reader.supports(capability) {
        Ok(())
    } else {
        Err(not_supported(reader.format(), capability))
    }
}
