#![allow(unused_macros)]

/// Helper macro for locking items
///
/// Poisoned locks are surfaced as [`crate::Error::LockError`] instead of panicking, so the
/// macro can only be used inside functions returning [`crate::Result`].
///
/// ```rust, ignore
///  let mut archive = lock!(self.archive);
///  archive.by_name("AndroidManifest.xml")?;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}
