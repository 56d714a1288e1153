/// Android ABIs in the order packages are searched for native libraries by default.
pub const DEFAULT_ABI_PREFERENCE: [&str; 4] = ["arm64-v8a", "armeabi-v7a", "x86_64", "x86"];

/// Largest archive entry a reader inflates by default, 512 MiB.
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;

/// Settings shared by every reader created during detection.
///
/// # Examples
///
/// ```rust,no_run
/// use apkscope::{detect_with_options, reader::ReaderOptions};
/// use std::path::Path;
///
/// let options = ReaderOptions::default().with_abi_preference(&["x86_64"]);
/// let detection = detect_with_options(Path::new("app.apk"), options)?;
/// # Ok::<(), apkscope::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// ABI directories tried, in order, when looking for `libxamarin-app.so`
    pub abi_preference: Vec<String>,
    /// Compare archive entry names exactly; when `false`, ASCII case is ignored
    pub case_sensitive: bool,
    /// Entries whose uncompressed size exceeds this are refused
    pub max_entry_size: u64,
}

impl ReaderOptions {
    /// Replaces the ABI search order.
    #[must_use]
    pub fn with_abi_preference(mut self, abis: &[&str]) -> Self {
        self.abi_preference = abis.iter().map(|abi| (*abi).to_string()).collect();
        self
    }

    /// Sets entry name case sensitivity.
    #[must_use]
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Sets the entry size limit.
    #[must_use]
    pub fn with_max_entry_size(mut self, max_entry_size: u64) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            abi_preference: DEFAULT_ABI_PREFERENCE
                .iter()
                .map(|abi| (*abi).to_string())
                .collect(),
            case_sensitive: true,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}
