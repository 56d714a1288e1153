//! # apkscope Prelude
//!
//! The types needed for the common path: detect an input, check what its reader offers,
//! and decode the facets.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all apkscope operations
pub use crate::Error;

/// The result type used throughout apkscope
pub use crate::Result;

// ================================================================================================
// Detection and Readers
// ================================================================================================

/// Detection entry points and results
pub use crate::detect::{detect, detect_with_options, DetectedFormat, DetectionResult};

/// Reader trait, capabilities and options
pub use crate::reader::{Capabilities, InputReader, ReaderOptions};

// ================================================================================================
// Facets
// ================================================================================================

/// Manifest derived application facts
pub use crate::android::{AppInfo, Runtime};

/// Decoded binary XML
pub use crate::axml::{XmlDocument, XmlElement};

/// `libxamarin-app.so` decoders
pub use crate::native::{
    ApplicationConfig, ApplicationConfigV2, DsoCacheEntry, FormatVersion, MarshalMethodName,
    MarshalMethodsManagedClass, TypeMaps, XamarinApp,
};

/// Assembly stores
pub use crate::assemblystore::{
    AssemblyStore, AssemblyStoreAssembly, AssemblyStoreHashEntry, AssemblyStoreHeader,
};

// ================================================================================================
// Low-level Access
// ================================================================================================

/// Shared library symbol access
pub use crate::elf::{ElfImage, SymbolAccessor};

/// Cursor-style binary reader
pub use crate::Parser;
