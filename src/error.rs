use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// Builds an [`crate::Error::InvalidData`] carrying the byte offset at which decoding failed.
macro_rules! invalid_data {
    ($offset:expr, $msg:expr) => {
        crate::Error::InvalidData {
            offset: $offset,
            message: $msg.to_string(),
        }
    };

    ($offset:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidData {
            offset: $offset,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Two families are kept strictly apart. A *capability* error ([`Error::NotSupported`]) means
/// the detected input format cannot provide the requested facet at all; it is raised before
/// any I/O happens. A *format* error means a supported structure turned out to be malformed
/// or truncated. Recoverable anomalies are never reported here; they are logged through the
/// `log` facade and decoding continues.
///
/// # Error Categories
///
/// ## Capability Errors
/// - [`Error::NotSupported`] - The reader for this format does not provide the facet
/// - [`Error::NotImplemented`] - The code path exists but is explicitly unfinished
///
/// ## Format Errors
/// - [`Error::InvalidData`] - Binary content rejected at a specific byte offset
/// - [`Error::Malformed`] - Corrupted or inconsistent structure
/// - [`Error::TruncatedStruct`] - A native struct is larger than the bytes backing it
/// - [`Error::OutOfBounds`] - Attempted to read beyond the available data
/// - [`Error::UnsupportedFormatTag`] - Unknown `libxamarin-app.so` generator version
/// - [`Error::Empty`] - Empty input provided
///
/// ## Lookup Errors
/// - [`Error::SymbolNotFound`] - ELF symbol missing from both symbol tables
/// - [`Error::EntryNotFound`] - Archive entry missing from a package
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - ELF parsing errors from goblin
/// - [`Error::ZipError`] - Archive errors from zip
/// - [`Error::XmlError`] - Text XML reading or writing errors from quick-xml
///
/// # Examples
///
/// ```rust,no_run
/// use apkscope::{detect, Error};
/// use std::path::Path;
///
/// let detection = detect(Path::new("app.apk"))?;
/// if let Some(reader) = detection.reader() {
///     match reader.assembly_store() {
///         Ok(store) => println!("{:?}", store.header()),
///         Err(Error::NotSupported { capability, format }) => {
///             eprintln!("{format} inputs do not carry {capability}");
///         }
///         Err(e) => eprintln!("Failed to decode: {e}"),
///     }
/// }
/// # Ok::<(), apkscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The reader for the detected format does not provide the requested facet.
    ///
    /// Raised before any attempt to open or parse the input.
    #[error("{format} inputs do not support the '{capability}' capability")]
    NotSupported {
        /// Display name of the requested capability
        capability: &'static str,
        /// Display name of the detected input format
        format: &'static str,
    },

    /// The requested functionality is explicitly unfinished.
    #[error("Not implemented - {0}")]
    NotImplemented(&'static str),

    /// Binary content was rejected while decoding.
    ///
    /// The offset is relative to the start of the buffer being decoded (the manifest entry,
    /// the store file, ...).
    #[error("Invalid data at offset 0x{offset:x}: {message}")]
    InvalidData {
        /// Byte offset at which decoding failed
        offset: usize,
        /// What was wrong
        message: String,
    },

    /// The input is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A native struct needs more bytes than its backing buffer provides.
    #[error("Truncated struct - need {needed} bytes, only {available} available")]
    TruncatedStruct {
        /// Size of the struct according to the target ABI layout
        needed: usize,
        /// Bytes actually present
        available: usize,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The `format_tag` of a `libxamarin-app.so` is not one this library can decode.
    #[error("Unsupported libxamarin-app.so format tag 0x{0:016x}")]
    UnsupportedFormatTag(u64),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A symbol is missing from both `.symtab` and `.dynsym`.
    #[error("Symbol '{0}' not found")]
    SymbolNotFound(String),

    /// An archive entry is missing from the package.
    #[error("Entry '{0}' not found in archive")]
    EntryNotFound(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during ELF parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Error from the zip crate while reading a package.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Error while reading or writing text XML.
    #[error("XML error - {0}")]
    XmlError(String),

    /// Failed to lock target.
    ///
    /// This error occurs when a facet lock or the archive lock has been poisoned by a
    /// panicking thread.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns `true` for errors saying the input cannot provide what was asked for, as opposed
    /// to errors produced while decoding something it does provide.
    #[must_use]
    pub fn is_capability_error(&self) -> bool {
        matches!(self, Error::NotSupported { .. } | Error::NotImplemented(_))
    }
}

pub(crate) fn xml_error<E: std::fmt::Display>(error: E) -> Error {
    Error::XmlError(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_errors_are_distinct() {
        let not_supported = Error::NotSupported {
            capability: "assembly store",
            format: "APK",
        };
        assert!(not_supported.is_capability_error());
        assert_eq!(
            not_supported.to_string(),
            "APK inputs do not support the 'assembly store' capability"
        );

        assert!(!invalid_data!(0x10, "bad magic").is_capability_error());
        assert!(!Error::TruncatedStruct {
            needed: 8,
            available: 4
        }
        .is_capability_error());
    }

    #[test]
    fn invalid_data_formats_offset() {
        let err = invalid_data!(0x2c, "header size {} != {}", 12, 28);
        assert_eq!(
            err.to_string(),
            "Invalid data at offset 0x2c: header size 12 != 28"
        );
    }

    #[test]
    fn malformed_records_location() {
        match malformed_error!("broken") {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "broken");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
