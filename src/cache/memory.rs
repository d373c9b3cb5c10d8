//! Process-local cache backend.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CacheError, CacheStore};
use crate::BoxFuture;
use crate::http::{Fingerprint, Response};

/// An in-memory [`CacheStore`] backed by a `HashMap`.
///
/// Entries live until the store is dropped; nothing is evicted.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use httpstash::cache::{CacheStore, MemoryStore};
///
/// let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Fingerprint, Response>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(
        &'a self,
        key: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Option<Response>, CacheError>> {
        let found = self
            .entries
            .read()
            .map(|entries| entries.get(key).cloned())
            .map_err(|_| CacheError::Poisoned);
        Box::pin(async move { found })
    }

    fn set<'a>(
        &'a self,
        key: &'a Fingerprint,
        response: Response,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        let stored = self
            .entries
            .write()
            .map(|mut entries| {
                entries.insert(key.clone(), response);
            })
            .map_err(|_| CacheError::Poisoned);
        Box::pin(async move { stored })
    }
}
