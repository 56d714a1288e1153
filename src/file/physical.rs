//! Memory-mapped file backend.
//!
//! Standalone shared libraries and assembly stores are mapped read-only instead of being
//! read into memory; the decoders only touch the pages they need (symbol data, the store
//! header).

use super::{checked_slice, Backend};
use crate::{
    Error::{Empty, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O.
///
/// The mapping lives as long as the backend; dropping it unmaps the file.
///
/// # Examples
///
/// ```rust,no_run
/// use apkscope::file::{Backend, Physical};
/// use std::path::Path;
///
/// let physical = Physical::new(Path::new("assemblies.arm64_v8a.blob"))?;
/// assert_eq!(physical.data_slice(0, 4)?, b"XABA");
/// # Ok::<(), apkscope::Error>(())
/// ```
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file backend by memory-mapping the specified file.
    ///
    /// # Arguments
    /// * `path` - Path to the file on disk
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Empty`] for zero-length files (which cannot be mapped portably).
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;
        Self::from_std_file(&file)
    }

    /// Creates a new physical file backend from an opened [`std::fs::File`].
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if mapping fails, [`crate::Error::Empty`] for
    /// zero-length files.
    pub fn from_std_file(file: &fs::File) -> Result<Physical> {
        if file.metadata()?.len() == 0 {
            return Err(Empty);
        }

        // SAFETY: read-only mapping; the file must not be truncated while mapped.
        let mmap = unsafe { Mmap::map(file) }.map_err(FileError)?;
        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        checked_slice(&self.data, offset, len)
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn physical() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"XABA\x01\x00\x00\x00").unwrap();
        file.flush().unwrap();

        let physical = Physical::new(file.path()).unwrap();
        assert_eq!(physical.len(), 8);
        assert_eq!(physical.data_slice(0, 4).unwrap(), b"XABA");
        assert_eq!(physical.data()[4], 1);
        assert!(physical.data_slice(6, 4).is_err());
        assert!(physical.data_slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn invalid_path() {
        let result = Physical::new("/definitely/not/here.so");
        assert!(matches!(result, Err(FileError(_))));
    }

    #[test]
    fn empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(Physical::new(file.path()), Err(Empty)));
    }
}
