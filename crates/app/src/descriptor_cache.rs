//! Descriptor cache — static metadata per remote device, fetched once.
//!
//! Descriptors (what a measurement id or overrun id *means*) never change
//! while a device stays connected, so the first successful fetch is kept
//! until the device is removed. Failed fetches are not cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use cem_domain::error::CemError;
use cem_domain::ski::Ski;

/// Per-device descriptor store for one use case.
///
/// Reads may happen concurrently from every device task; writes go through
/// a single lock so there is one writer at a time.
pub struct DescriptorCache<D> {
    entries: RwLock<HashMap<Ski, Arc<[D]>>>,
}

impl<D> Default for DescriptorCache<D> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<D> DescriptorCache<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached descriptors for `ski`, without any remote call.
    pub fn get(&self, ski: &Ski) -> Option<Arc<[D]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ski)
            .map(Arc::clone)
    }

    pub fn contains(&self, ski: &Ski) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(ski)
    }

    /// Return the cached descriptors, or run `fetch` and cache its result.
    ///
    /// Nothing is cached when `fetch` fails, so the next caller retries.
    /// Nothing is cached either once `live` is cancelled: the device is gone
    /// and its entry must not outlive it.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returned.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        ski: &Ski,
        live: &CancellationToken,
        fetch: F,
    ) -> Result<Arc<[D]>, CemError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<D>, CemError>>,
    {
        if let Some(hit) = self.get(ski) {
            return Ok(hit);
        }

        let fetched: Arc<[D]> = fetch().await?.into();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if live.is_cancelled() {
            return Ok(fetched);
        }
        tracing::debug!(%ski, count = fetched.len(), "storing descriptors");
        Ok(Arc::clone(entries.entry(ski.clone()).or_insert(fetched)))
    }

    /// Drop the entry for `ski`. Returns whether one existed.
    pub fn remove(&self, ski: &Ski) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(ski)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
