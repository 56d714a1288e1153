//! The detectors of the default chain.

use crate::{
    assemblystore::{has_store_magic, PAYLOAD_SECTION},
    elf::{ElfImage, ELF_MAGIC},
    reader::{AabReader, ApkReader, AssemblyStoreReader, ElfReader},
    Error, Result,
};

use super::{Detection, DetectionContext, Detector};

/// Local file header signature that starts every zip archive.
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

const APK_MANIFEST: &str = "AndroidManifest.xml";
const AAB_MANIFEST: &str = "base/manifest/AndroidManifest.xml";
const AAB_BUNDLE_CONFIG: &str = "BundleConfig.pb";
const AAB_BASE_MANIFEST: &str = "manifest/AndroidManifest.xml";

const EI_VERSION: usize = 6;
const EI_OSABI: usize = 7;
const EV_CURRENT: u8 = 1;
const ELFOSABI_SYSV: u8 = 0;
const ELFOSABI_LINUX: u8 = 3;
const ET_DYN: u16 = 3;

fn is_aab(ctx: &DetectionContext) -> Result<bool> {
    Ok(ctx.zip_contains(AAB_MANIFEST)? && ctx.zip_contains(AAB_BUNDLE_CONFIG)?)
}

/// Accepts regular files; directories and special files end detection.
pub struct IsRegularFile;

impl Detector for IsRegularFile {
    fn name(&self) -> &'static str {
        "IsRegularFile"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        Ok(Detection::accept_if(ctx.metadata().is_file()))
    }
}

/// Accepts zip archives.
pub struct IsZip;

impl Detector for IsZip {
    fn name(&self) -> &'static str {
        "IsZip"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        Ok(Detection::accept_if(ctx.header().starts_with(&ZIP_MAGIC)))
    }
}

/// Resolves archives with a top-level `AndroidManifest.xml` that are not bundles.
pub struct IsApk;

impl Detector for IsApk {
    fn name(&self) -> &'static str {
        "IsApk"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        if !ctx.zip_contains(APK_MANIFEST)? || is_aab(ctx)? {
            return Ok(Detection::Rejected);
        }
        Ok(Detection::Resolved(Box::new(ApkReader::new(
            ctx.path(),
            ctx.options().clone(),
        ))))
    }
}

/// Resolves Android App Bundles.
pub struct IsAab;

impl Detector for IsAab {
    fn name(&self) -> &'static str {
        "IsAab"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        if !is_aab(ctx)? {
            return Ok(Detection::Rejected);
        }
        Ok(Detection::Resolved(Box::new(AabReader::new(
            ctx.path(),
            ctx.options().clone(),
        ))))
    }
}

/// Resolves the base module of a bundle on its own, as produced by `bundletool`.
///
/// Only matches archives that are neither APKs nor whole bundles.
pub struct IsAabBase;

impl Detector for IsAabBase {
    fn name(&self) -> &'static str {
        "IsAabBase"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        if !ctx.zip_contains(AAB_BASE_MANIFEST)? || ctx.zip_contains(APK_MANIFEST)? || is_aab(ctx)? {
            return Ok(Detection::Rejected);
        }
        Ok(Detection::Resolved(Box::new(AabReader::base_module(
            ctx.path(),
            ctx.options().clone(),
        ))))
    }
}

/// Accepts current-version ELF files for System V or Linux.
pub struct IsElf;

impl Detector for IsElf {
    fn name(&self) -> &'static str {
        "IsElf"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        let header = ctx.header();
        if !header.starts_with(&ELF_MAGIC) || header.len() <= EI_OSABI {
            return Ok(Detection::Rejected);
        }
        if header[EI_VERSION] != EV_CURRENT {
            log::debug!(
                "{}: ELF identification version {}",
                ctx.path().display(),
                header[EI_VERSION]
            );
            return Ok(Detection::Rejected);
        }
        Ok(Detection::accept_if(matches!(
            header[EI_OSABI],
            ELFOSABI_SYSV | ELFOSABI_LINUX
        )))
    }
}

/// Would recognise `libxamarin-app.so` by content rather than by being a shared library.
pub struct IsXamarinAppLibrary;

impl Detector for IsXamarinAppLibrary {
    fn name(&self) -> &'static str {
        "IsXamarinAppLibrary"
    }

    fn detect(&self, _ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        Err(Error::NotImplemented(
            "recognising libxamarin-app.so by its symbols",
        ))
    }
}

/// Resolves shared libraries whose `payload` section holds an assembly store.
///
/// Parses the section headers, so it runs before [`IsSharedLibrary`] claims the file.
pub struct HasAssemblyStorePayload;

impl Detector for HasAssemblyStorePayload {
    fn name(&self) -> &'static str {
        "HasAssemblyStorePayload"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        let Some(image) = ElfImage::from_file(ctx.path())? else {
            return Ok(Detection::Rejected);
        };
        match image.section_bytes(PAYLOAD_SECTION) {
            Some(payload) if has_store_magic(payload) => Ok(Detection::Resolved(Box::new(
                AssemblyStoreReader::from_elf_payload(ctx.path()),
            ))),
            Some(_) => {
                log::debug!(
                    "{}: '{PAYLOAD_SECTION}' section does not hold an assembly store",
                    ctx.path().display()
                );
                Ok(Detection::Rejected)
            }
            None => Ok(Detection::Rejected),
        }
    }
}

/// Resolves `ET_DYN` images to the shared library reader.
pub struct IsSharedLibrary;

impl Detector for IsSharedLibrary {
    fn name(&self) -> &'static str {
        "IsSharedLibrary"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        // e_type follows the 16 byte identification; Android images are little-endian
        let Some(e_type) = ctx.header().get(16..18) else {
            return Ok(Detection::Rejected);
        };
        if u16::from_le_bytes([e_type[0], e_type[1]]) != ET_DYN {
            return Ok(Detection::Rejected);
        }
        Ok(Detection::Resolved(Box::new(ElfReader::new(ctx.path()))))
    }
}

/// Resolves files starting with the assembly store magic.
pub struct IsAssemblyStore;

impl Detector for IsAssemblyStore {
    fn name(&self) -> &'static str {
        "IsAssemblyStore"
    }

    fn detect(&self, ctx: &DetectionContext, _parent: Option<&dyn Detector>) -> Result<Detection> {
        if !has_store_magic(ctx.header()) {
            return Ok(Detection::Rejected);
        }
        Ok(Detection::Resolved(Box::new(AssemblyStoreReader::new(
            ctx.path(),
        ))))
    }
}
