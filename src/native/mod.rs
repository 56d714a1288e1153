//! Decoders for the data structures baked into `libxamarin-app.so`.
//!
//! Every structure is located by its exported symbol and decoded with the ABI-aware reader
//! from [`layout`]; string and pointer fields are resolved through
//! [`crate::elf::SymbolAccessor`]. The format tag of the library selects the layout:
//! unknown tags are rejected rather than decoded on a best-effort basis.
//!
//! [`XamarinApp`] bundles the decoders over one loaded image and is what
//! [`crate::reader::InputReader::xamarin_app`] hands out.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkscope::native::{ApplicationConfig, XamarinApp};
//! use std::path::Path;
//!
//! let app = XamarinApp::from_file(Path::new("libxamarin-app.so"))?;
//! if let ApplicationConfig::V2(config) = app.application_config()? {
//!     println!("package: {:?}", config.android_package_name);
//!     println!("assembly store: {}", config.have_assembly_store);
//! }
//! for entry in app.dso_cache()? {
//!     println!("{:016x} {:?}", entry.hash, entry.name);
//! }
//! # Ok::<(), apkscope::Error>(())
//! ```

pub mod appconfig;
pub mod dsocache;
pub mod layout;
pub mod marshal;
pub mod typemap;

pub use appconfig::{ApplicationConfig, ApplicationConfigV2, FormatVersion, MonoComponents};
pub use dsocache::DsoCacheEntry;
pub use marshal::{MarshalMethodName, MarshalMethodsManagedClass};
pub use typemap::{TypeMapJava, TypeMapModule, TypeMapModuleEntry, TypeMaps};

use std::path::Path;

use crate::{elf::ElfImage, Error, Result};

/// Symbol holding `name, value` pairs exported to the process environment.
pub const ENVIRONMENT_VARIABLES_SYMBOL: &str = "app_environment_variables";
/// Symbol holding `name, value` pairs set as system properties.
pub const SYSTEM_PROPERTIES_SYMBOL: &str = "app_system_properties";

/// The decoded view of one `libxamarin-app.so`.
pub struct XamarinApp {
    image: ElfImage,
    version: FormatVersion,
}

impl XamarinApp {
    /// Wraps an already loaded image, validating its format tag.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the image has no `format_tag`, and
    /// [`crate::Error::UnsupportedFormatTag`] for unknown generators.
    pub fn new(image: ElfImage) -> Result<Self> {
        let version = FormatVersion::read(&image)?;
        log::debug!(
            "{}: libxamarin-app.so generator {:?}",
            image.path().display(),
            version
        );
        Ok(XamarinApp { image, version })
    }

    /// Loads and wraps the library at `path`.
    ///
    /// # Errors
    /// Fails on I/O errors, non-ELF input, or the errors of [`XamarinApp::new`].
    pub fn from_file(path: &Path) -> Result<Self> {
        match ElfImage::from_file(path)? {
            Some(image) => Self::new(image),
            None => Err(malformed_error!(
                "{} is not a supported shared library",
                path.display()
            )),
        }
    }

    /// Loads and wraps a library extracted into memory.
    ///
    /// # Errors
    /// See [`XamarinApp::from_file`].
    pub fn from_mem(data: Vec<u8>, path: &Path) -> Result<Self> {
        match ElfImage::from_mem(data, path)? {
            Some(image) => Self::new(image),
            None => Err(malformed_error!(
                "{} is not a supported shared library",
                path.display()
            )),
        }
    }

    /// The underlying image.
    #[must_use]
    pub fn image(&self) -> &ElfImage {
        &self.image
    }

    /// Generator version selected by `format_tag`.
    #[must_use]
    pub fn format_version(&self) -> FormatVersion {
        self.version
    }

    /// `application_config`.
    ///
    /// # Errors
    /// See [`ApplicationConfigV2::read`].
    pub fn application_config(&self) -> Result<ApplicationConfig> {
        match self.version {
            FormatVersion::V1 => Ok(ApplicationConfig::V1),
            FormatVersion::V2 => Ok(ApplicationConfig::V2(ApplicationConfigV2::read(
                &self.image,
            )?)),
        }
    }

    /// Rows of `dso_cache`.
    ///
    /// # Errors
    /// See [`DsoCacheEntry::read_all`].
    pub fn dso_cache(&self) -> Result<Vec<DsoCacheEntry>> {
        self.require_v2("dso_cache")?;
        DsoCacheEntry::read_all(&self.image)
    }

    /// Rows of `marshal_methods_class_cache`.
    ///
    /// # Errors
    /// See [`MarshalMethodsManagedClass::read_all`].
    pub fn marshal_classes(&self) -> Result<Vec<MarshalMethodsManagedClass>> {
        self.require_v2("marshal_methods_class_cache")?;
        MarshalMethodsManagedClass::read_all(&self.image)
    }

    /// Rows of `mm_method_names`.
    ///
    /// # Errors
    /// See [`MarshalMethodName::read_all`].
    pub fn marshal_method_names(&self) -> Result<Vec<MarshalMethodName>> {
        self.require_v2("mm_method_names")?;
        MarshalMethodName::read_all(&self.image)
    }

    /// Entries of `mm_class_names`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
    pub fn marshal_class_names(&self) -> Result<Vec<Option<String>>> {
        self.require_v2("mm_class_names")?;
        marshal::class_names(&self.image)
    }

    /// `name=value` pairs of `app_environment_variables`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
    pub fn environment_variables(&self) -> Result<Vec<(String, String)>> {
        self.string_pairs(ENVIRONMENT_VARIABLES_SYMBOL)
    }

    /// `name=value` pairs of `app_system_properties`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if the table is absent.
    pub fn system_properties(&self) -> Result<Vec<(String, String)>> {
        self.string_pairs(SYSTEM_PROPERTIES_SYMBOL)
    }

    /// All type-map tables.
    ///
    /// # Errors
    /// See [`TypeMaps::read`].
    pub fn typemaps(&self) -> Result<TypeMaps> {
        self.require_v2("type maps")?;
        TypeMaps::read(&self.image)
    }

    fn require_v2(&self, what: &'static str) -> Result<()> {
        match self.version {
            FormatVersion::V2 => Ok(()),
            FormatVersion::V1 => {
                log::debug!("{what} is not decodable for V1 libraries");
                Err(Error::NotImplemented(
                    "decoding tables of V1 libxamarin-app.so",
                ))
            }
        }
    }

    fn string_pairs(&self, name: &str) -> Result<Vec<(String, String)>> {
        let strings = self.image.pointer_array_strings(name)?;
        if strings.len() % 2 != 0 {
            log::warn!("{name} has an odd number of entries, ignoring the last one");
        }

        Ok(strings
            .chunks_exact(2)
            .map(|pair| {
                (
                    pair[0].clone().unwrap_or_default(),
                    pair[1].clone().unwrap_or_default(),
                )
            })
            .collect())
    }
}

impl std::fmt::Debug for XamarinApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XamarinApp")
            .field("path", &self.image.path())
            .field("abi", &self.image.abi_name())
            .field("version", &self.version)
            .finish()
    }
}
