//! Cache-aware GET requests.
//!
//! A [`Get`] is immutable once built. Construction computes its
//! [`Fingerprint`] (the cache key) and picks its [`CacheLogic`] from the
//! options, so neither is re-derived per call.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use url::{Position, Url};
use url::form_urlencoded;

use super::headers::{names, tokens};
use super::{Headers, Method, Response};
use crate::cache::CacheLogic;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::session::SessionLink;
use crate::transport::{Origin, RawRequest, Transport};

/// Query parameters, in the order they are appended to the URI.
pub type Params = Vec<(String, String)>;

/// Deterministic cache key of a request.
///
/// Built from the method, URI, parameters and headers and nothing else.
/// Parameters and headers are sorted (header names lower-cased) before
/// encoding, so their order does not matter. The rendered form is a single
/// form-urlencoded line with no whitespace, safe to use as a key in remote
/// stores.
///
/// # Examples
///
/// ```
/// use httpstash::http::{Fingerprint, Headers, Method};
/// use url::Url;
///
/// let uri = Url::parse("http://localhost/foo").unwrap();
/// let a = Fingerprint::compute(&Method::Get, &uri, &[("a".into(), "10".into())], &Headers::new());
/// let b = Fingerprint::compute(&Method::Get, &uri, &[], &Headers::new());
/// assert_ne!(a, b);
/// assert_eq!(b.as_str(), "method=GET&uri=http%3A%2F%2Flocalhost%2Ffoo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(
        method: &Method,
        uri: &Url,
        params: &[(String, String)],
        headers: &Headers,
    ) -> Self {
        let mut params: Vec<(&str, &str)> = params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        params.sort_unstable();

        let mut headers: Vec<(String, &str)> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        headers.sort_unstable();

        let mut encoded = form_urlencoded::Serializer::new(String::new());
        encoded.append_pair("method", method.as_str());
        encoded.append_pair("uri", uri.as_str());
        for (name, value) in params {
            encoded.append_pair(&format!("p.{name}"), value);
        }
        for (name, value) in headers {
            encoded.append_pair(&format!("h.{name}"), value);
        }
        Self(encoded.finish())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a request's bytes reach the origin.
#[derive(Clone)]
pub(crate) enum Channel {
    /// A fresh connection per request, dropped afterwards.
    Direct(Arc<dyn Transport>),
    /// The persistent connection of a [`Session`](crate::session::Session).
    Session(SessionLink),
}

/// A GET request that consults a cache before going to the network.
///
/// Two `Get`s are equal, and hash alike, exactly when their fingerprints are
/// equal; the option bag (including the cache store) is ignored.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use httpstash::cache::MemoryStore;
/// use httpstash::http::{Get, Headers};
/// use httpstash::options::Options;
/// use httpstash::transport::TcpTransport;
///
/// # async fn run() -> httpstash::Result<()> {
/// let options = Options::default().with_cache_store(Arc::new(MemoryStore::new()));
/// let get = Get::parse(
///     Arc::new(TcpTransport::new()),
///     "http://localhost:3000/cacheable/with_max_age/300",
///     vec![],
///     Headers::new(),
///     options,
/// )?;
/// let first = get.invoke().await?;
/// let second = get.invoke().await?; // served from the store
/// assert_eq!(first.body(), second.body());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Get {
    uri: Url,
    params: Params,
    headers: Headers,
    options: Options,
    channel: Channel,
    fingerprint: Fingerprint,
    cache_logic: CacheLogic,
}

impl Get {
    /// Builds a request that opens its own connection through `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        uri: Url,
        params: Params,
        headers: Headers,
        options: Options,
    ) -> Self {
        Self::with_channel(Channel::Direct(transport), uri, params, headers, options)
    }

    /// Like [`Get::new`], parsing `uri` first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUri`] if `uri` is not an absolute URL.
    pub fn parse(
        transport: Arc<dyn Transport>,
        uri: &str,
        params: Params,
        headers: Headers,
        options: Options,
    ) -> Result<Self> {
        let parsed = Url::parse(uri).map_err(|source| Error::InvalidUri {
            uri: uri.to_owned(),
            source,
        })?;
        Ok(Self::new(transport, parsed, params, headers, options))
    }

    pub(crate) fn with_channel(
        channel: Channel,
        uri: Url,
        params: Params,
        headers: Headers,
        options: Options,
    ) -> Self {
        let fingerprint = Fingerprint::compute(&Method::Get, &uri, &params, &headers);
        let cache_logic =
            CacheLogic::new(options.cache_store.clone(), Arc::clone(&options.clock));
        Self {
            uri,
            params,
            headers,
            options,
            channel,
            fingerprint,
            cache_logic,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn cache_logic(&self) -> &CacheLogic {
        &self.cache_logic
    }

    /// Performs the request, serving from or revalidating against the cache
    /// when one is configured.
    pub async fn invoke(&self) -> Result<Response> {
        self.cache_logic.get(self).await
    }

    /// Performs the request on the network, ignoring any cache.
    pub async fn invoke_without_cache_check(&self) -> Result<Response> {
        let mut headers = self.headers.clone();
        let reply = match &self.channel {
            Channel::Direct(transport) => {
                let origin = Origin::from_url(&self.uri).ok_or_else(|| Error::MissingHost {
                    uri: self.uri.to_string(),
                })?;
                let request = self.raw_request(headers);
                let mut connection = transport.connect(&origin).await?;
                connection.set_read_timeout(self.options.read_timeout);
                connection.send(&request).await?
            }
            Channel::Session(link) => {
                headers.set(names::CONNECTION, tokens::KEEP_ALIVE);
                link.send(&self.raw_request(headers)).await?
            }
        };
        Ok(Response::new(reply, self.options.clock.now()))
    }

    /// A conditional request for the same resource: same URI, parameters and
    /// channel, the original headers minus any conditional ones, plus the
    /// single `name: value` validator header. It carries no cache store, so it
    /// always reaches the network.
    pub fn validation_request(&self, name: &str, value: &str) -> Get {
        let mut headers = self.headers.clone();
        headers.remove(names::IF_NONE_MATCH);
        headers.remove(names::IF_MODIFIED_SINCE);
        headers.insert(name, value);
        Self::with_channel(
            self.channel.clone(),
            self.uri.clone(),
            self.params.clone(),
            headers,
            self.options.uncached(),
        )
    }

    /// Origin-form target: path plus the URI's query and the parameters.
    pub fn target(&self) -> String {
        let mut uri = self.uri.clone();
        if !self.params.is_empty() {
            uri.query_pairs_mut().extend_pairs(&self.params);
        }
        uri[Position::BeforePath..Position::AfterQuery].to_owned()
    }

    fn raw_request(&self, headers: Headers) -> RawRequest {
        RawRequest {
            method: Method::Get,
            target: self.target(),
            headers,
            body: Bytes::new(),
        }
    }
}

impl PartialEq for Get {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Get {}

impl Hash for Get {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl fmt::Debug for Get {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Get")
            .field("uri", &self.uri.as_str())
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("options", &self.options)
            .finish()
    }
}
