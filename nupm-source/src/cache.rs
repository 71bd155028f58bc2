//! Memoization of dependency info within one resolution.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use nupm_types::{FrameworkName, PackageIdentity};

use crate::{Error, ResolvedDependencyInfo};

/// The cache key: one source, one identity, one framework.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GatherKey {
    /// The URL of the source that was asked.
    pub source_url: String,
    /// The identity that was asked for.
    pub identity: PackageIdentity,
    /// The framework the dependency info was reduced to.
    pub framework: FrameworkName,
}

/// A fetched-or-absent cache slot; `None` means not yet fetched.
type Slot = Arc<Mutex<Option<Option<ResolvedDependencyInfo>>>>;

/// A per-resolution cache of dependency info fetches.
///
/// Concurrent requests for the same key share one in-flight fetch: the
/// second caller blocks on the key's slot until the first caller has stored
/// a result. A failed fetch stores nothing, so a later request retries.
///
/// The cache lives exactly as long as the resolution context owning it; it
/// is never shared across operations.
#[derive(Debug, Default)]
pub struct GatherCache {
    slots: Mutex<HashMap<GatherKey, Slot>>,
}

impl GatherCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        GatherCache::default()
    }

    /// Returns the cached value for `key`, fetching it with `fetch` if
    /// absent.
    ///
    /// `Ok(None)` results ("this source does not carry the identity") are
    /// cached like hits; only `Err` results are left uncached.
    ///
    /// # Errors
    ///
    /// Returns the error of `fetch`, if it ran and failed.
    pub fn get_or_fetch<F>(
        &self,
        key: GatherKey,
        fetch: F,
    ) -> Result<Option<ResolvedDependencyInfo>, Error>
    where
        F: FnOnce() -> Result<Option<ResolvedDependencyInfo>, Error>,
    {
        let slot = {
            let mut slots = self.slots.lock().expect("cache mutex is never poisoned");
            slots.entry(key).or_default().clone()
        };

        let mut slot = slot.lock().expect("cache slot mutex is never poisoned");
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.clone());
        }
        let fetched = fetch()?;
        *slot = Some(fetched.clone());
        Ok(fetched)
    }

    /// Returns the number of cached keys.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("cache mutex is never poisoned").len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
