use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    detect::DetectedFormat,
    native::{TypeMaps, XamarinApp},
    Result,
};

use super::{require, Capabilities, FacetCell, InputReader};

/// Reader for a standalone shared library, typically an extracted `libxamarin-app.so`.
pub struct ElfReader {
    path: PathBuf,
    xamarin_app: FacetCell<XamarinApp>,
    typemaps: FacetCell<TypeMaps>,
}

impl ElfReader {
    /// Creates a reader; the library is mapped on first facet access.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        ElfReader {
            path: path.to_path_buf(),
            xamarin_app: FacetCell::new(),
            typemaps: FacetCell::new(),
        }
    }
}

impl InputReader for ElfReader {
    fn format(&self) -> DetectedFormat {
        DetectedFormat::ElfSharedLibrary
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::XAMARIN_APP | Capabilities::TYPEMAPS
    }

    fn xamarin_app(&self) -> Result<Arc<XamarinApp>> {
        require(self, Capabilities::XAMARIN_APP)?;
        self.xamarin_app
            .get_or_try_init(|| XamarinApp::from_file(&self.path))
    }

    fn typemaps(&self) -> Result<Arc<TypeMaps>> {
        require(self, Capabilities::TYPEMAPS)?;
        self.typemaps
            .get_or_try_init(|| self.xamarin_app()?.typemaps())
    }
}
