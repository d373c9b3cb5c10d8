//! Response caching: the pluggable store and the logic that drives it.
//!
//! A [`CacheStore`] is a plain point-read/point-write map from a request
//! [`Fingerprint`] to a [`Response`]. The crate never iterates or evicts
//! entries; that is the backend's business. [`CacheLogic`] decides, per
//! request, whether to serve, revalidate, or refetch.
//!
//! Backends shipped here:
//!
//! - [`MemoryStore`]: a process-local map.
//! - [`EncodedStore`]: serializes responses for any byte-oriented
//!   [`ByteStore`] (memcached, redis, disk).

use thiserror::Error;

use crate::BoxFuture;
use crate::http::{Fingerprint, Response};

pub mod encoded;
pub mod logic;
pub mod memory;

pub use encoded::{ByteStore, EncodedStore};
pub use logic::{CacheLogic, DefaultCacheLogic};
pub use memory::MemoryStore;

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(String),

    #[error("failed to encode or decode a cached response: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

/// A key/value store for responses.
///
/// Implementations must be shareable across tasks; the same store is usually
/// handed to many requests as an `Arc<dyn CacheStore>`.
pub trait CacheStore: Send + Sync {
    /// Returns the response stored under `key`, if any.
    fn get<'a>(
        &'a self,
        key: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Option<Response>, CacheError>>;

    /// Stores `response` under `key`, replacing any previous entry.
    fn set<'a>(
        &'a self,
        key: &'a Fingerprint,
        response: Response,
    ) -> BoxFuture<'a, Result<(), CacheError>>;
}
