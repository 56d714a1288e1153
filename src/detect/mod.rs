//! Content-sniffing format detection.
//!
//! Detection runs a tree of [`Detector`]s over a [`DetectionContext`]. The tree is walked
//! depth first in declaration order:
//!
//! - a detector that *rejects* skips its whole subtree;
//! - a detector that *accepts* lets its children run, in order;
//! - the first detector that *resolves* a reader ends detection.
//!
//! A detector that fails is logged and counts as a rejection, so a sibling branch can still
//! match. An input no detector resolves is reported as [`DetectedFormat::Unknown`] rather
//! than as an error.
//!
//! The default chain is:
//!
//! ```text
//! IsRegularFile
//! ├── IsZip
//! │   ├── IsApk
//! │   ├── IsAab
//! │   └── IsAabBase
//! ├── IsElf
//! │   ├── IsXamarinAppLibrary
//! │   ├── HasAssemblyStorePayload
//! │   └── IsSharedLibrary
//! └── IsAssemblyStore
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkscope::{detect, DetectedFormat};
//! use std::path::Path;
//!
//! let detection = detect(Path::new("libxamarin-app.so"))?;
//! assert_eq!(detection.format(), DetectedFormat::ElfSharedLibrary);
//! # Ok::<(), apkscope::Error>(())
//! ```

mod context;
pub mod detectors;

pub use context::{DetectionContext, HEADER_SAMPLE_SIZE};

use std::path::Path;

use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    reader::{InputReader, ReaderOptions},
    Error, Result,
};
use detectors::{
    HasAssemblyStorePayload, IsAab, IsAabBase, IsApk, IsAssemblyStore, IsElf, IsRegularFile,
    IsSharedLibrary, IsXamarinAppLibrary, IsZip,
};

/// Input formats detection can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum DetectedFormat {
    /// Android application package
    #[strum(serialize = "APK")]
    Apk,
    /// Android App Bundle
    #[strum(serialize = "AAB")]
    Aab,
    /// The base module of a bundle, extracted on its own
    #[strum(serialize = "AAB base module")]
    AabBase,
    /// A standalone shared library
    #[strum(serialize = "ELF shared library")]
    ElfSharedLibrary,
    /// An assembly store, standalone or in the `payload` section of a shared library
    #[strum(serialize = "assembly store")]
    AssemblyStore,
    /// Nothing matched
    #[strum(serialize = "unknown")]
    Unknown,
}

impl DetectedFormat {
    /// Display name of the format.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Outcome of a single detector.
pub enum Detection {
    /// Not this format; the subtree is skipped
    Rejected,
    /// Plausible; the children decide
    Accepted,
    /// Recognised, with the reader to use
    Resolved(Box<dyn InputReader>),
}

impl Detection {
    /// [`Detection::Accepted`] if `condition` holds, else [`Detection::Rejected`].
    #[must_use]
    pub fn accept_if(condition: bool) -> Self {
        if condition {
            Detection::Accepted
        } else {
            Detection::Rejected
        }
    }
}

impl std::fmt::Debug for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detection::Rejected => write!(f, "Rejected"),
            Detection::Accepted => write!(f, "Accepted"),
            Detection::Resolved(reader) => write!(f, "Resolved({})", reader.format()),
        }
    }
}

/// One step of format detection.
pub trait Detector: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Inspects the input. `parent` is the detector that accepted it, if any.
    ///
    /// # Errors
    /// Errors are logged by the chain and treated like [`Detection::Rejected`].
    fn detect(&self, ctx: &DetectionContext, parent: Option<&dyn Detector>) -> Result<Detection>;
}

/// A detector and the detectors that run after it accepted.
pub struct DetectorNode {
    detector: Box<dyn Detector>,
    children: Vec<DetectorNode>,
}

impl DetectorNode {
    /// A node without children.
    pub fn new<D: Detector + 'static>(detector: D) -> Self {
        DetectorNode {
            detector: Box::new(detector),
            children: Vec::new(),
        }
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: DetectorNode) -> Self {
        self.children.push(child);
        self
    }

    /// The detector of this node.
    #[must_use]
    pub fn detector(&self) -> &dyn Detector {
        self.detector.as_ref()
    }

    /// The child nodes.
    #[must_use]
    pub fn children(&self) -> &[DetectorNode] {
        &self.children
    }

    fn visit(
        &self,
        ctx: &DetectionContext,
        parent: Option<&dyn Detector>,
    ) -> Option<Box<dyn InputReader>> {
        let name = self.detector.name();
        match self.detector.detect(ctx, parent) {
            Ok(Detection::Rejected) => {
                log::trace!("{name} rejected {}", ctx.path().display());
                None
            }
            Ok(Detection::Accepted) => {
                log::trace!("{name} accepted {}", ctx.path().display());
                self.children
                    .iter()
                    .find_map(|child| child.visit(ctx, Some(self.detector.as_ref())))
            }
            Ok(Detection::Resolved(reader)) => {
                log::debug!(
                    "{name} resolved {} as {}",
                    ctx.path().display(),
                    reader.format()
                );
                Some(reader)
            }
            Err(Error::NotImplemented(what)) => {
                log::debug!("{name} skipped: not implemented - {what}");
                None
            }
            Err(error) => {
                log::warn!("{name} failed on {}: {error}", ctx.path().display());
                None
            }
        }
    }
}

/// An ordered forest of detectors.
pub struct DetectionChain {
    roots: Vec<DetectorNode>,
}

impl Default for DetectionChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DetectionChain {
    /// An empty chain, which detects nothing.
    #[must_use]
    pub fn new() -> Self {
        DetectionChain { roots: Vec::new() }
    }

    /// The chain used by [`detect`].
    #[must_use]
    pub fn with_defaults() -> Self {
        DetectionChain::new().with_root(
            DetectorNode::new(IsRegularFile)
                .with_child(
                    DetectorNode::new(IsZip)
                        .with_child(DetectorNode::new(IsApk))
                        .with_child(DetectorNode::new(IsAab))
                        .with_child(DetectorNode::new(IsAabBase)),
                )
                .with_child(
                    DetectorNode::new(IsElf)
                        .with_child(DetectorNode::new(IsXamarinAppLibrary))
                        .with_child(DetectorNode::new(HasAssemblyStorePayload))
                        .with_child(DetectorNode::new(IsSharedLibrary)),
                )
                .with_child(DetectorNode::new(IsAssemblyStore)),
        )
    }

    /// Appends a top-level node.
    #[must_use]
    pub fn with_root(mut self, root: DetectorNode) -> Self {
        self.roots.push(root);
        self
    }

    /// The top-level nodes.
    #[must_use]
    pub fn roots(&self) -> &[DetectorNode] {
        &self.roots
    }

    /// Runs the chain over `ctx`.
    #[must_use]
    pub fn run(&self, ctx: &DetectionContext) -> DetectionResult {
        let reader = self.roots.iter().find_map(|root| root.visit(ctx, None));
        DetectionResult::new(reader)
    }
}

/// The detected format and, unless it is [`DetectedFormat::Unknown`], its reader.
pub struct DetectionResult {
    format: DetectedFormat,
    reader: Option<Box<dyn InputReader>>,
}

impl DetectionResult {
    fn new(reader: Option<Box<dyn InputReader>>) -> Self {
        DetectionResult {
            format: reader
                .as_ref()
                .map_or(DetectedFormat::Unknown, |reader| reader.format()),
            reader,
        }
    }

    /// The detected format.
    #[must_use]
    pub fn format(&self) -> DetectedFormat {
        self.format
    }

    /// Returns `true` unless the format is [`DetectedFormat::Unknown`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.reader.is_some()
    }

    /// The reader for the detected format.
    #[must_use]
    pub fn reader(&self) -> Option<&dyn InputReader> {
        self.reader.as_deref()
    }

    /// Takes ownership of the reader.
    #[must_use]
    pub fn into_reader(self) -> Option<Box<dyn InputReader>> {
        self.reader
    }
}

impl std::fmt::Debug for DetectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionResult")
            .field("format", &self.format)
            .field("reader", &self.reader)
            .finish()
    }
}

/// Detects the format of the file at `path` with default [`ReaderOptions`].
///
/// # Errors
/// Returns [`crate::Error::FileError`] if `path` cannot be accessed. An unrecognised input
/// is not an error; it yields [`DetectedFormat::Unknown`].
pub fn detect(path: &Path) -> Result<DetectionResult> {
    detect_with_options(path, ReaderOptions::default())
}

/// Detects the format of the file at `path`; the resolved reader uses `options`.
///
/// # Errors
/// See [`detect`].
pub fn detect_with_options(path: &Path, options: ReaderOptions) -> Result<DetectionResult> {
    let ctx = DetectionContext::new(path, options)?;
    Ok(DetectionChain::with_defaults().run(&ctx))
}
