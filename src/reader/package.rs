use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    android::{native_library, AppInfo},
    axml::XmlDocument,
    container::ZipContainer,
    detect::DetectedFormat,
    native::{TypeMaps, XamarinApp},
    Error, Result,
};

use super::{require, Capabilities, FacetCell, InputReader, ReaderOptions};

/// File name of the generated native application library.
pub const XAMARIN_APP_LIBRARY: &str = "libxamarin-app.so";

const APK_MANIFEST: &str = "AndroidManifest.xml";

/// State shared by the APK and AAB readers.
struct Package {
    format: DetectedFormat,
    // "" for APKs, "base/" for the base module of bundles
    prefix: &'static str,
    path: PathBuf,
    options: ReaderOptions,
    container: FacetCell<ZipContainer>,
    xamarin_app: FacetCell<XamarinApp>,
    typemaps: FacetCell<TypeMaps>,
}

impl Package {
    fn new(format: DetectedFormat, prefix: &'static str, path: &Path, options: ReaderOptions) -> Self {
        Package {
            format,
            prefix,
            path: path.to_path_buf(),
            options,
            container: FacetCell::new(),
            xamarin_app: FacetCell::new(),
            typemaps: FacetCell::new(),
        }
    }

    fn container(&self) -> Result<Arc<ZipContainer>> {
        self.container
            .get_or_try_init(|| ZipContainer::open(&self.path))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let container = self.container()?;
        let Some(entry) = container.find(name, self.options.case_sensitive) else {
            return Err(Error::EntryNotFound(name.to_string()));
        };
        container.read_entry(entry, self.options.max_entry_size)
    }

    /// Entry name of `libxamarin-app.so` for the first preferred ABI that has one, falling
    /// back to any other ABI directory.
    fn xamarin_library_entry(&self, container: &ZipContainer) -> Result<String> {
        for abi in &self.options.abi_preference {
            let name = format!("{}lib/{abi}/{XAMARIN_APP_LIBRARY}", self.prefix);
            if let Some(entry) = container.find(&name, self.options.case_sensitive) {
                return Ok(entry.to_string());
            }
        }

        let fallback = container.entries().iter().find(|entry| {
            entry.starts_with(self.prefix)
                && native_library(entry).is_some_and(|(_, name)| {
                    if self.options.case_sensitive {
                        name == XAMARIN_APP_LIBRARY
                    } else {
                        name.eq_ignore_ascii_case(XAMARIN_APP_LIBRARY)
                    }
                })
        });
        match fallback {
            Some(entry) => {
                log::info!(
                    "{}: no {XAMARIN_APP_LIBRARY} for the preferred ABIs, using {entry}",
                    self.path.display()
                );
                Ok(entry.clone())
            }
            None => Err(Error::EntryNotFound(format!(
                "{}lib/<abi>/{XAMARIN_APP_LIBRARY}",
                self.prefix
            ))),
        }
    }

    fn xamarin_app(&self) -> Result<Arc<XamarinApp>> {
        self.xamarin_app.get_or_try_init(|| {
            let container = self.container()?;
            let entry = self.xamarin_library_entry(&container)?;
            let data = container.read_entry(&entry, self.options.max_entry_size)?;
            log::debug!(
                "{}: decoding {entry} ({} bytes)",
                self.path.display(),
                data.len()
            );
            XamarinApp::from_mem(data, Path::new(&entry))
        })
    }

    fn typemaps(&self) -> Result<Arc<TypeMaps>> {
        self.typemaps
            .get_or_try_init(|| self.xamarin_app()?.typemaps())
    }
}

/// Reader for Android application packages.
pub struct ApkReader {
    package: Package,
    manifest: FacetCell<XmlDocument>,
    app_info: FacetCell<AppInfo>,
}

impl ApkReader {
    /// Creates a reader; the package is opened on first facet access.
    #[must_use]
    pub fn new(path: &Path, options: ReaderOptions) -> Self {
        ApkReader {
            package: Package::new(DetectedFormat::Apk, "", path, options),
            manifest: FacetCell::new(),
            app_info: FacetCell::new(),
        }
    }
}

impl InputReader for ApkReader {
    fn format(&self) -> DetectedFormat {
        self.package.format
    }

    fn path(&self) -> &Path {
        &self.package.path
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::APP_INFO | Capabilities::XAMARIN_APP | Capabilities::TYPEMAPS
    }

    fn manifest(&self) -> Result<Arc<XmlDocument>> {
        require(self, Capabilities::APP_INFO)?;
        self.manifest.get_or_try_init(|| {
            let data = self.package.read(APK_MANIFEST)?;
            XmlDocument::from_bytes(&data)
        })
    }

    fn app_info(&self) -> Result<Arc<AppInfo>> {
        require(self, Capabilities::APP_INFO)?;
        self.app_info.get_or_try_init(|| {
            let manifest = self.manifest()?;
            let container = self.package.container()?;
            Ok(AppInfo::from_document(&manifest)?
                .with_entries(container.entries().iter().map(String::as_str)))
        })
    }

    fn xamarin_app(&self) -> Result<Arc<XamarinApp>> {
        require(self, Capabilities::XAMARIN_APP)?;
        self.package.xamarin_app()
    }

    fn typemaps(&self) -> Result<Arc<TypeMaps>> {
        require(self, Capabilities::TYPEMAPS)?;
        self.package.typemaps()
    }
}

/// Reader for Android App Bundles and for their base module on its own.
///
/// The bundle manifest is a protocol buffer, so bundles have no [`Capabilities::APP_INFO`].
pub struct AabReader {
    package: Package,
}

impl AabReader {
    /// Creates a reader; the bundle is opened on first facet access.
    #[must_use]
    pub fn new(path: &Path, options: ReaderOptions) -> Self {
        AabReader {
            package: Package::new(DetectedFormat::Aab, "base/", path, options),
        }
    }

    /// Creates a reader for an extracted base module, whose entries carry no `base/` prefix.
    #[must_use]
    pub fn base_module(path: &Path, options: ReaderOptions) -> Self {
        AabReader {
            package: Package::new(DetectedFormat::AabBase, "", path, options),
        }
    }
}

impl InputReader for AabReader {
    fn format(&self) -> DetectedFormat {
        self.package.format
    }

    fn path(&self) -> &Path {
        &self.package.path
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::XAMARIN_APP | Capabilities::TYPEMAPS
    }

    fn xamarin_app(&self) -> Result<Arc<XamarinApp>> {
        require(self, Capabilities::XAMARIN_APP)?;
        self.package.xamarin_app()
    }

    fn typemaps(&self) -> Result<Arc<TypeMaps>> {
        require(self, Capabilities::TYPEMAPS)?;
        self.package.typemaps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        elf::SymbolAccessor,
        native::FormatVersion,
        test::{elf::xamarin_app_library, package::write_zip},
    };

    const MANIFEST: &[u8] = br#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.store">
  <uses-permission android:name="android.permission.INTERNET"/>
</manifest>"#;

    #[test]
    fn apk_facets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        let arm = xamarin_app_library(false);
        let arm64 = xamarin_app_library(true);
        write_zip(
            &path,
            &[
                ("AndroidManifest.xml", MANIFEST),
                ("lib/armeabi-v7a/libxamarin-app.so", &arm),
                ("lib/arm64-v8a/libxamarin-app.so", &arm64),
                ("lib/arm64-v8a/libmonosgen-2.0.so", b"\x7fELF"),
            ],
        );

        let reader = ApkReader::new(&path, ReaderOptions::default());
        let info = reader.app_info().unwrap();
        assert_eq!(info.package.as_deref(), Some("com.example.store"));
        assert_eq!(info.permissions, vec!["android.permission.INTERNET"]);
        assert_eq!(info.abis, vec!["arm64-v8a", "armeabi-v7a"]);
        assert!(Arc::ptr_eq(&info, &reader.app_info().unwrap()));

        let app = reader.xamarin_app().unwrap();
        assert!(app.image().is_64bit());
        assert_eq!(app.format_version(), FormatVersion::V2);
        assert_eq!(
            app.environment_variables().unwrap(),
            vec![("MONO_LOG_LEVEL".to_string(), "info".to_string())]
        );

        // the crafted library has no type maps
        let error = reader.typemaps().unwrap_err();
        assert!(!error.is_capability_error());
        assert!(reader.assembly_store().unwrap_err().is_capability_error());
    }

    #[test]
    fn abi_preference_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        let arm = xamarin_app_library(false);
        let arm64 = xamarin_app_library(true);
        write_zip(
            &path,
            &[
                ("AndroidManifest.xml", MANIFEST),
                ("lib/arm64-v8a/libxamarin-app.so", &arm64),
                ("lib/armeabi-v7a/libxamarin-app.so", &arm),
            ],
        );

        let options = ReaderOptions::default().with_abi_preference(&["armeabi-v7a"]);
        let reader = ApkReader::new(&path, options);
        assert!(!reader.xamarin_app().unwrap().image().is_64bit());

        let options = ReaderOptions::default().with_abi_preference(&["riscv64"]);
        let reader = ApkReader::new(&path, options);
        assert!(reader.xamarin_app().unwrap().image().is_64bit());
    }

    #[test]
    fn concurrent_first_access_shares_one_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        let arm64 = xamarin_app_library(true);
        write_zip(
            &path,
            &[
                ("AndroidManifest.xml", MANIFEST),
                ("lib/arm64-v8a/libxamarin-app.so", &arm64),
            ],
        );

        let reader = ApkReader::new(&path, ReaderOptions::default());
        let apps: Vec<Arc<XamarinApp>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| reader.xamarin_app().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(apps.iter().all(|app| Arc::ptr_eq(app, &apps[0])));
    }

    #[test]
    fn aab_reads_base_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.aab");
        let arm64 = xamarin_app_library(true);
        write_zip(
            &path,
            &[
                ("BundleConfig.pb", b"\x0a\x00"),
                ("base/manifest/AndroidManifest.xml", b"\x0a\x03foo"),
                ("base/lib/arm64-v8a/libxamarin-app.so", &arm64),
            ],
        );

        let reader = AabReader::new(&path, ReaderOptions::default());
        assert_eq!(reader.format(), DetectedFormat::Aab);
        assert!(reader.xamarin_app().is_ok());
        assert!(matches!(
            reader.app_info(),
            Err(Error::NotSupported {
                capability: "app info",
                ..
            })
        ));
        assert!(reader.manifest().unwrap_err().is_capability_error());
    }

    #[test]
    fn missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.apk");
        write_zip(&path, &[("AndroidManifest.xml", MANIFEST)]);

        let reader = ApkReader::new(&path, ReaderOptions::default());
        assert!(matches!(
            reader.xamarin_app(),
            Err(Error::EntryNotFound(_))
        ));
        // failures are retried, not cached
        assert!(matches!(
            reader.xamarin_app(),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[test]
    fn unsupported_facet_does_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.aab");
        write_zip(&path, &[("BundleConfig.pb", b"")]);

        let reader = AabReader::new(&path, ReaderOptions::default());
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            reader.assembly_store(),
            Err(Error::NotSupported { .. })
        ));
        assert!(matches!(reader.app_info(), Err(Error::NotSupported { .. })));
        assert!(matches!(reader.xamarin_app(), Err(Error::FileError(_))));
    }
}
