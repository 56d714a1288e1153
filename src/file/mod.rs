//! Byte sources and low-level readers shared by every decoder.
//!
//! Inputs reach the decoders in two shapes: files on disk (standalone `.so` libraries and
//! assembly stores) which are memory-mapped, and buffers extracted from a package archive.
//! Both are exposed through the [`Backend`] trait so the ELF accessor can own either.
//!
//! # Key Components
//!
//! - [`Backend`] - Trait for different data sources (disk files, memory buffers)
//! - [`Physical`] - Memory-mapped file backend
//! - [`Memory`] - Owned buffer backend, used for archive entries
//! - [`parser::Parser`] - Cursor-style reader for sequential binary formats
//! - [`io`] - Bounds-checked little/big endian primitive reads and writes
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkscope::file::{Backend, Physical};
//! use std::path::Path;
//!
//! let backend = Physical::new(Path::new("libxamarin-app.so"))?;
//! let magic = backend.data_slice(0, 4)?;
//! assert_eq!(magic, b"\x7fELF");
//! # Ok::<(), apkscope::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use crate::Result;

/// Backend trait for input data sources.
///
/// This trait abstracts over the source of binary data, allowing for both in-memory and on-disk
/// representations. All implementations must be thread-safe, since readers hand out facets to
/// multiple threads.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the backend holds no data.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared bounds check for backends that expose a contiguous buffer.
pub(crate) fn checked_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let Some(offset_end) = offset.checked_add(len) else {
        return Err(out_of_bounds_error!());
    };

    if offset_end > data.len() {
        return Err(out_of_bounds_error!());
    }

    Ok(&data[offset..offset_end])
}
