//! Per-request options and loadable client configuration.
//!
//! [`Options`] is the option bag every [`Get`](crate::http::Get) carries. None
//! of it takes part in the request fingerprint. [`ClientConfig`] is the
//! serializable subset an application can keep in a config file.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::clock::{Clock, SystemClock};

/// Default read timeout applied to every connection, in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Redirect-following settings. Carried through unchanged; this crate does not
/// follow redirects itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectOptions {
    pub follow_redirects: bool,
    pub follow_redirects_count: u32,
    pub follow_redirects_limit: u32,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            follow_redirects_count: 0,
            follow_redirects_limit: 5,
        }
    }
}

/// Serializable client settings.
///
/// # Examples
///
/// ```
/// use httpstash::options::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{ "read_timeout_secs": 5 }"#).unwrap();
/// assert_eq!(config.read_timeout_secs, 5);
/// assert_eq!(config.redirects.follow_redirects_limit, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub read_timeout_secs: u64,
    pub redirects: RedirectOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            redirects: RedirectOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The option bag of a request or session.
#[derive(Clone)]
pub struct Options {
    pub redirects: RedirectOptions,
    /// Where responses are cached. `None` disables caching.
    pub cache_store: Option<Arc<dyn CacheStore>>,
    pub clock: Arc<dyn Clock>,
    pub read_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            redirects: RedirectOptions::default(),
            cache_store: None,
            clock: Arc::new(SystemClock),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

impl Options {
    #[must_use]
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_redirects(mut self, redirects: RedirectOptions) -> Self {
        self.redirects = redirects;
        self
    }

    /// Options for a request the client builds on its own (e.g. a
    /// revalidation): default redirects, no cache, same clock and timeout.
    pub(crate) fn uncached(&self) -> Self {
        Self {
            redirects: RedirectOptions::default(),
            cache_store: None,
            clock: Arc::clone(&self.clock),
            read_timeout: self.read_timeout,
        }
    }
}

impl From<&ClientConfig> for Options {
    fn from(config: &ClientConfig) -> Self {
        Self {
            redirects: config.redirects,
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            ..Self::default()
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("redirects", &self.redirects)
            .field("cache_store", &self.cache_store.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
