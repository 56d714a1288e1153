//! Read access to zip based packages (APK and AAB).
//!
//! `ZipArchive` needs `&mut self` to read an entry, so the archive lives behind a mutex and
//! the entry names are collected once when the package is opened.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::Mutex,
};

use zip::ZipArchive;

use crate::{Error, Result};

/// An opened zip package.
pub struct ZipContainer {
    path: PathBuf,
    names: Vec<String>,
    archive: Mutex<ZipArchive<File>>,
}

impl ZipContainer {
    /// Opens the package at `path` and reads its central directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] or [`crate::Error::ZipError`].
    pub fn open(path: &Path) -> Result<Self> {
        let archive = ZipArchive::new(File::open(path)?)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        log::debug!("{}: {} zip entries", path.display(), names.len());

        Ok(ZipContainer {
            path: path.to_path_buf(),
            names,
            archive: Mutex::new(archive),
        })
    }

    /// The package file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entry names, in central directory order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.names
    }

    /// Finds an entry, returning its name as stored in the archive.
    #[must_use]
    pub fn find(&self, name: &str, case_sensitive: bool) -> Option<&str> {
        self.names
            .iter()
            .find(|entry| {
                if case_sensitive {
                    entry.as_str() == name
                } else {
                    entry.eq_ignore_ascii_case(name)
                }
            })
            .map(String::as_str)
    }

    /// Returns `true` if the package has an entry called `name`.
    #[must_use]
    pub fn contains(&self, name: &str, case_sensitive: bool) -> bool {
        self.find(name, case_sensitive).is_some()
    }

    /// Reads and decompresses the entry called `name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::EntryNotFound`] if there is no such entry, and
    /// [`crate::Error::Malformed`] if the entry is larger than `max_size` bytes.
    pub fn read_entry(&self, name: &str, max_size: u64) -> Result<Vec<u8>> {
        let mut archive = lock!(self.archive);
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(Error::EntryNotFound(name.to_string()))
            }
            Err(error) => return Err(error.into()),
        };

        if entry.size() > max_size {
            return Err(malformed_error!(
                "{}: entry '{}' has {} bytes, more than the allowed {}",
                self.path.display(),
                name,
                entry.size(),
                max_size
            ));
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        (&mut entry).take(max_size + 1).read_to_end(&mut data)?;
        if data.len() as u64 > max_size {
            return Err(malformed_error!(
                "{}: entry '{}' inflates past the allowed {} bytes",
                self.path.display(),
                name,
                max_size
            ));
        }
        Ok(data)
    }
}

impl std::fmt::Debug for ZipContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipContainer")
            .field("path", &self.path)
            .field("entries", &self.names.len())
            .finish()
    }
}
