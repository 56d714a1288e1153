use std::{
    cell::OnceCell,
    fs::{self, File, Metadata},
    io::Read,
    path::{Path, PathBuf},
};

use crate::{container::ZipContainer, reader::ReaderOptions, Result};

/// Bytes read from the start of the input for magic checks.
pub const HEADER_SAMPLE_SIZE: usize = 64;

/// What detectors see of the input.
///
/// The header bytes are read once when the context is created; the zip directory is read
/// the first time a detector asks for it.
pub struct DetectionContext {
    path: PathBuf,
    metadata: Metadata,
    header: Vec<u8>,
    options: ReaderOptions,
    zip: OnceCell<ZipContainer>,
}

impl DetectionContext {
    /// Stats `path` and reads its first [`HEADER_SAMPLE_SIZE`] bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the path does not exist or a regular file
    /// cannot be read.
    pub fn new(path: &Path, options: ReaderOptions) -> Result<Self> {
        let metadata = fs::metadata(path)?;

        let mut header = Vec::with_capacity(HEADER_SAMPLE_SIZE);
        if metadata.is_file() {
            File::open(path)?
                .take(HEADER_SAMPLE_SIZE as u64)
                .read_to_end(&mut header)?;
        }

        Ok(DetectionContext {
            path: path.to_path_buf(),
            metadata,
            header,
            options,
            zip: OnceCell::new(),
        })
    }

    /// The input path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filesystem metadata of the input.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Up to the first [`HEADER_SAMPLE_SIZE`] bytes of the input.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Options handed to the resolved reader.
    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// The input opened as a zip archive.
    ///
    /// # Errors
    /// Returns [`crate::Error::ZipError`] if the central directory cannot be read.
    pub fn zip(&self) -> Result<&ZipContainer> {
        if let Some(container) = self.zip.get() {
            return Ok(container);
        }
        let container = ZipContainer::open(&self.path)?;
        Ok(self.zip.get_or_init(|| container))
    }

    /// Returns `true` if the zip archive has an entry called `name`, honouring the
    /// configured case sensitivity.
    ///
    /// # Errors
    /// See [`DetectionContext::zip`].
    pub fn zip_contains(&self, name: &str) -> Result<bool> {
        Ok(self.zip()?.contains(name, self.options.case_sensitive))
    }
}
