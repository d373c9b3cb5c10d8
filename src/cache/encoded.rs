//! Adapter that lets byte-oriented key/value services act as a [`CacheStore`].
//!
//! Networked caches such as memcached or redis store opaque bytes under string
//! keys. [`EncodedStore`] namespaces the request fingerprint into such a key and
//! serializes the response as JSON; the network client only has to implement
//! [`ByteStore`].

use tracing::trace;

use super::{CacheError, CacheStore};
use crate::BoxFuture;
use crate::http::{Fingerprint, Response};

/// A remote (or otherwise byte-level) key/value service.
pub trait ByteStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>>;

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>>;
}

/// A [`CacheStore`] that encodes responses onto a [`ByteStore`].
///
/// Keys take the form `<namespace>:<fingerprint>`, so several clients can
/// share one backend without seeing each other's entries.
#[derive(Debug)]
pub struct EncodedStore<B> {
    backend: B,
    namespace: String,
}

impl<B: ByteStore> EncodedStore<B> {
    pub fn new(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn key_for(&self, fingerprint: &Fingerprint) -> String {
        format!("{}:{}", self.namespace, fingerprint)
    }
}

impl<B: ByteStore> CacheStore for EncodedStore<B> {
    fn get<'a>(
        &'a self,
        key: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Option<Response>, CacheError>> {
        Box::pin(async move {
            let key = self.key_for(key);
            match self.backend.get(&key).await? {
                Some(bytes) => {
                    trace!(%key, len = bytes.len(), "decoding cached response");
                    Ok(Some(serde_json::from_slice(&bytes)?))
                }
                None => Ok(None),
            }
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a Fingerprint,
        response: Response,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            let key = self.key_for(key);
            let bytes = serde_json::to_vec(&response)?;
            trace!(%key, len = bytes.len(), "storing encoded response");
            self.backend.set(&key, bytes).await
        })
    }
}
