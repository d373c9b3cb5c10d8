//! The wire capability the client consumes.
//!
//! A [`Transport`] opens [`Connection`]s to an [`Origin`]; a connection carries
//! one [`RawRequest`] at a time and hands back a [`RawResponse`]. Caching and
//! session logic only ever talk to these traits, so tests substitute scripted
//! fakes and applications can plug in TLS or proxying transports.
//!
//! [`TcpTransport`] is the bundled plain-TCP HTTP/1.1 implementation.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::BoxFuture;
use crate::http::{Headers, Method};

pub mod tcp;

pub use tcp::{DEFAULT_MAX_BODY_SIZE, TcpTransport};

/// Errors raised while talking to an origin.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {origin}: {source}")]
    Connect {
        origin: Origin,
        #[source]
        source: std::io::Error,
    },

    #[error("no data received within the read timeout of {0:?}")]
    ReadTimeout(Duration),

    #[error("malformed HTTP response: {0}")]
    Parse(#[from] httparse::Error),

    #[error("malformed chunk size in chunked response body")]
    InvalidChunkSize,

    #[error("connection closed before the response was complete")]
    Incomplete,

    #[error("response body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    #[error("TLS is not supported by this transport (origin {0})")]
    TlsUnsupported(Origin),
}

/// Scheme, host and port of a server: the unit a connection is opened to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl Origin {
    /// Extracts the origin of `url`. Returns `None` when the URL has no host.
    ///
    /// # Examples
    ///
    /// ```
    /// use httpstash::transport::Origin;
    /// use url::Url;
    ///
    /// let origin = Origin::from_url(&Url::parse("https://example.com/a").unwrap()).unwrap();
    /// assert_eq!(origin.port, 443);
    /// assert!(origin.tls);
    /// ```
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_owned();
        let port = url.port_or_known_default()?;
        Some(Self {
            host,
            port,
            tls: url.scheme() == "https",
        })
    }

    /// Value for the `Host` request header: the port is omitted when it is the
    /// scheme default.
    pub fn authority(&self) -> String {
        let default_port = if self.tls { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// A request as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: Method,
    /// Origin-form request target: path plus query string.
    pub target: String,
    pub headers: Headers,
    pub body: Bytes,
}

/// A reply as it came off the wire, before any cache interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

/// One open connection to an origin.
///
/// Dropping the connection releases the underlying socket.
pub trait Connection: Send {
    /// Bounds how long any single read may wait for data.
    fn set_read_timeout(&mut self, timeout: Duration);

    /// `false` once the connection cannot carry another request, e.g. after a
    /// body that was delimited by the peer closing the socket.
    fn is_reusable(&self) -> bool {
        true
    }

    /// Sends `request` and reads back the complete reply.
    fn send<'a>(
        &'a mut self,
        request: &'a RawRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}

/// Opens connections.
pub trait Transport: Send + Sync {
    fn connect<'a>(
        &'a self,
        origin: &'a Origin,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, TransportError>>;
}
