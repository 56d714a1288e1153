use std::sync::{Arc, Mutex, OnceLock};

use crate::Result;

/// A lazily built, shared facet of an input.
///
/// The first caller runs the provider while holding the init lock; callers arriving
/// meanwhile block on the same lock and then see the stored value. Once set, the value is
/// returned without locking. A provider that fails leaves the cell empty, so the next call
/// retries.
pub struct FacetCell<T> {
    value: OnceLock<Arc<T>>,
    init: Mutex<()>,
}

impl<T> FacetCell<T> {
    /// Creates an empty cell.
    #[must_use]
    pub const fn new() -> Self {
        FacetCell {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The stored value, if the provider already succeeded.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.get().cloned()
    }

    /// Returns the stored value, running `provider` first if the cell is empty.
    ///
    /// # Errors
    /// Returns the provider's error, or [`crate::Error::LockError`] if a previous provider
    /// panicked.
    pub fn get_or_try_init<F>(&self, provider: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        let _guard = lock!(self.init);
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        let value = Arc::new(provider()?);
        // only written under the init lock
        let _ = self.value.set(value.clone());
        Ok(value)
    }
}

impl<T> Default for FacetCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
