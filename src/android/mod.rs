//! Application level facts taken from the Android manifest and the package layout.
//!
//! [`AppInfo`] is what [`crate::reader::InputReader::app_info`] returns for APK inputs. It
//! is built from the decoded manifest tree, which either came out of the binary XML decoder
//! or, for manifests stored as text, out of `quick-xml`.

mod manifest;

pub use manifest::{AppInfo, FASTDEV_LAUNCHER};

use strum::{Display, EnumIter};

/// Native libraries that identify the managed runtime of a package.
pub const MONOVM_LIBRARY: &str = "libmonosgen-2.0.so";
/// See [`MONOVM_LIBRARY`].
pub const CORECLR_LIBRARY: &str = "libcoreclr.so";

/// The managed runtime a package ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Runtime {
    /// Mono, `libmonosgen-2.0.so`
    #[strum(to_string = "MonoVM")]
    MonoVm,
    /// CoreCLR, `libcoreclr.so`
    #[strum(to_string = "CoreCLR")]
    CoreClr,
}

impl Runtime {
    /// Finds the runtime library among package entry names.
    ///
    /// Libraries are looked for under `lib/<abi>/` and `base/lib/<abi>/`. When a package
    /// carries both, MonoVM wins.
    pub fn detect<'a>(entries: impl IntoIterator<Item = &'a str>) -> Option<Runtime> {
        let mut found = None;
        for entry in entries {
            match native_library(entry) {
                Some((_, MONOVM_LIBRARY)) => return Some(Runtime::MonoVm),
                Some((_, CORECLR_LIBRARY)) => found = Some(Runtime::CoreClr),
                _ => {}
            }
        }
        found
    }
}

/// Splits `lib/<abi>/<name>` (optionally below `base/`) into ABI and library name.
#[must_use]
pub fn native_library(entry: &str) -> Option<(&str, &str)> {
    let rest = entry.strip_prefix("base/").unwrap_or(entry);
    let rest = rest.strip_prefix("lib/")?;
    let (abi, name) = rest.split_once('/')?;
    if abi.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((abi, name))
}

/// The ABIs that have native libraries in a package, sorted and deduplicated.
pub fn package_abis<'a>(entries: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut abis: Vec<String> = entries
        .into_iter()
        .filter_map(native_library)
        .map(|(abi, _)| abi.to_string())
        .collect();
    abis.sort();
    abis.dedup();
    abis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_library_paths() {
        assert_eq!(
            native_library("lib/arm64-v8a/libxamarin-app.so"),
            Some(("arm64-v8a", "libxamarin-app.so"))
        );
        assert_eq!(
            native_library("base/lib/x86/libcoreclr.so"),
            Some(("x86", "libcoreclr.so"))
        );
        assert_eq!(native_library("lib/libfoo.so"), None);
        assert_eq!(native_library("assets/lib/x86/libfoo.so"), None);
        assert_eq!(native_library("lib/x86/sub/libfoo.so"), None);
    }

    #[test]
    fn runtime_detection() {
        assert_eq!(
            Runtime::detect(["AndroidManifest.xml", "lib/x86_64/libmonosgen-2.0.so"]),
            Some(Runtime::MonoVm)
        );
        assert_eq!(
            Runtime::detect(["base/lib/arm64-v8a/libcoreclr.so"]),
            Some(Runtime::CoreClr)
        );
        assert_eq!(
            Runtime::detect([
                "lib/arm64-v8a/libcoreclr.so",
                "lib/arm64-v8a/libmonosgen-2.0.so"
            ]),
            Some(Runtime::MonoVm)
        );
        assert_eq!(Runtime::detect(["classes.dex"]), None);
        assert_eq!(Runtime::MonoVm.to_string(), "MonoVM");
        assert_eq!(Runtime::CoreClr.to_string(), "CoreCLR");
    }

    #[test]
    fn abis_are_sorted() {
        let abis = package_abis([
            "lib/x86/libxamarin-app.so",
            "lib/arm64-v8a/libxamarin-app.so",
            "lib/x86/libmonosgen-2.0.so",
            "classes.dex",
        ]);
        assert_eq!(abis, vec!["arm64-v8a", "x86"]);
    }
}
