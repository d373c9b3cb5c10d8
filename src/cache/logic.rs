//! Serve, revalidate, or refetch: the per-request caching decision.
//!
//! [`CacheLogic::new`] picks the variant once, when a [`Get`] is built:
//!
//! - [`CacheLogic::Null`] when no store is configured. Every call goes to
//!   the network.
//! - [`CacheLogic::Default`] otherwise, which runs the lookup below.
//!
//! | Store lookup                   | Action                                       |
//! |--------------------------------|----------------------------------------------|
//! | miss                           | fetch; store if cacheable                    |
//! | hit, fresh                     | return the stored response                   |
//! | hit, stale, no validator       | fetch; store if cacheable                    |
//! | hit, stale, ETag/Last-Modified | conditional GET; 304 merges, else as a fetch |
//!
//! The lookup and the write are not atomic. Two concurrent misses for the same
//! key both fetch, and the last write wins.

use std::sync::Arc;

use tracing::debug;

use super::CacheStore;
use crate::clock::Clock;
use crate::error::Result;
use crate::http::headers::names;
use crate::http::{Fingerprint, Get, Response};

/// Caching strategy of one request.
#[derive(Clone)]
pub enum CacheLogic {
    Null,
    Default(DefaultCacheLogic),
}

impl CacheLogic {
    /// `Null` without a store, `Default` with one.
    pub fn new(store: Option<Arc<dyn CacheStore>>, clock: Arc<dyn Clock>) -> Self {
        match store {
            Some(store) => Self::Default(DefaultCacheLogic::new(store, clock)),
            None => Self::Null,
        }
    }

    /// `true` for the store-backed variant.
    pub fn is_caching(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    /// Produces the response for `request`.
    pub async fn get(&self, request: &Get) -> Result<Response> {
        match self {
            Self::Null => request.invoke_without_cache_check().await,
            Self::Default(logic) => logic.get(request).await,
        }
    }
}

/// Store-backed caching per RFC 2616 §13.
#[derive(Clone)]
pub struct DefaultCacheLogic {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl DefaultCacheLogic {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(&self, request: &Get) -> Result<Response> {
        let key = request.fingerprint();

        let Some(cached) = self.store.get(key).await? else {
            debug!(uri = %request.uri(), "cache miss");
            return self.fetch_fresh(request).await;
        };

        if !cached.is_expired(self.clock.now()) {
            debug!(uri = %request.uri(), "cache hit");
            return Ok(cached);
        }

        let Some((name, value)) = validator_for(&cached) else {
            debug!(uri = %request.uri(), "stale entry has no validator; refetching");
            return self.fetch_fresh(request).await;
        };

        debug!(uri = %request.uri(), validator = name, "revalidating stale entry");
        let validation = request
            .validation_request(name, value)
            .invoke_without_cache_check()
            .await?;

        if validation.is_not_modified() {
            let merged = cached.merge_not_modified(&validation, self.clock.now());
            self.store.set(key, merged.clone()).await?;
            debug!(uri = %request.uri(), "not modified; entry refreshed");
            Ok(merged)
        } else {
            debug!(uri = %request.uri(), status = validation.code(), "validation returned a new representation");
            self.cache(key, validation).await
        }
    }

    async fn fetch_fresh(&self, request: &Get) -> Result<Response> {
        let response = request.invoke_without_cache_check().await?;
        self.cache(request.fingerprint(), response).await
    }

    /// Stores `response` if it is cacheable, then hands it back.
    async fn cache(&self, key: &Fingerprint, response: Response) -> Result<Response> {
        if response.is_cacheable() {
            self.store.set(key, response.clone()).await?;
        }
        Ok(response)
    }
}

/// The conditional header to revalidate `cached` with. The ETag wins when both
/// validators are present.
fn validator_for(cached: &Response) -> Option<(&'static str, &str)> {
    match (cached.etag(), cached.last_modified()) {
        (Some(etag), _) => Some((names::IF_NONE_MATCH, etag)),
        (None, Some(last_modified)) => Some((names::IF_MODIFIED_SINCE, last_modified)),
        (None, None) => None,
    }
}
