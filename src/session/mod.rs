//! Keep-alive sessions: sequential requests over one persistent connection.
//!
//! A [`Session`] starts [`Closed`](SessionState::Closed) and opens its
//! connection on the first request that reaches the network. Every request it
//! sends carries `Connection: Keep-Alive`.
//!
//! ```text
//!            send (connect + read timeout)
//!   Closed ───────────────────────────────▶ Open
//!     ▲                                      │
//!     ├──── Connection: Close ───────────────┤
//!     ├──── send error / connection spent ───┤
//!     └──── close() / drop ──────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::http::headers::{names, tokens};
use crate::http::request::Channel;
use crate::http::{Get, Headers, Params, Response};
use crate::options::Options;
use crate::transport::{Connection, Origin, RawRequest, RawResponse, Transport, TransportError};

/// Whether a session currently holds a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
}

/// Handle to a session's connection slot, shared with the requests the session
/// builds (including their revalidation requests).
#[derive(Clone)]
pub(crate) struct SessionLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    origin: Origin,
    transport: Arc<dyn Transport>,
    read_timeout: Duration,
    connection: Mutex<Option<Box<dyn Connection>>>,
}

impl SessionLink {
    fn new(origin: Origin, transport: Arc<dyn Transport>, read_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                origin,
                transport,
                read_timeout,
                connection: Mutex::new(None),
            }),
        }
    }

    /// Sends `request` on the session connection, opening it first if needed.
    ///
    /// The connection is dropped when the reply carries the `Close` token
    /// (compared case-sensitively), when the transport reports it cannot carry
    /// another request, or when the send fails.
    pub(crate) async fn send(&self, request: &RawRequest) -> std::result::Result<RawResponse, TransportError> {
        let inner = &*self.inner;
        let mut slot = inner.connection.lock().await;

        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => {
                let mut connection = inner.transport.connect(&inner.origin).await?;
                connection.set_read_timeout(inner.read_timeout);
                debug!(origin = %inner.origin, "session connection opened");
                connection
            }
        };

        match connection.send(request).await {
            Ok(reply) => {
                if reply.headers.has_token(names::CONNECTION, tokens::CLOSE) {
                    debug!(origin = %inner.origin, "origin closed the session connection");
                } else if !connection.is_reusable() {
                    debug!(origin = %inner.origin, "session connection spent; dropping it");
                } else {
                    *slot = Some(connection);
                }
                Ok(reply)
            }
            Err(e) => {
                warn!(origin = %inner.origin, error = %e, "session connection failed; dropping it");
                Err(e)
            }
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        match self.inner.connection.try_lock() {
            Ok(slot) if slot.is_none() => SessionState::Closed,
            // A held lock means a send is in flight on an open connection.
            _ => SessionState::Open,
        }
    }

    /// Drops the connection, if any. Returns `true` when one was open.
    pub(crate) fn release(&self) -> bool {
        match self.inner.connection.try_lock() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => false,
        }
    }
}

/// A series of GETs to one origin over a shared keep-alive connection.
///
/// Requests take `&mut self`, so one session is never used by two tasks at
/// once. The connection is released when the session is dropped or
/// [`close`](Session::close)d. When the options carry a cache store, session
/// requests are served and revalidated through it like any other [`Get`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use httpstash::options::Options;
/// use httpstash::session::Session;
/// use httpstash::transport::TcpTransport;
///
/// # async fn run() -> httpstash::Result<()> {
/// let mut session = Session::new(
///     Arc::new(TcpTransport::new()),
///     "http://localhost:3000",
///     Options::default(),
/// )?;
/// let glassware = session
///     .get("/glassware", vec![("owner".into(), "Kai".into())])
///     .await?;
/// let bottles = session.get("/bottles.xml", vec![]).await?;
/// # let _ = (glassware, bottles);
/// # Ok(())
/// # }
/// ```
pub struct Session {
    base: Url,
    origin: Origin,
    link: SessionLink,
    options: Options,
}

impl Session {
    /// Creates a closed session to the origin of `base`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUri`] if `base` does not parse, [`Error::MissingHost`]
    /// if it names no host.
    pub fn new(transport: Arc<dyn Transport>, base: &str, options: Options) -> Result<Self> {
        let base = Url::parse(base).map_err(|source| Error::InvalidUri {
            uri: base.to_owned(),
            source,
        })?;
        let origin = Origin::from_url(&base).ok_or_else(|| Error::MissingHost {
            uri: base.to_string(),
        })?;
        let link = SessionLink::new(origin.clone(), transport, options.read_timeout);
        Ok(Self {
            base,
            origin,
            link,
            options,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.link.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// GETs `path`, resolved against the session base URI.
    pub async fn get(&mut self, path: &str, params: Params) -> Result<Response> {
        self.get_with_headers(path, params, Headers::new()).await
    }

    /// Like [`get`](Session::get) with extra request headers.
    ///
    /// # Errors
    ///
    /// [`Error::CrossOrigin`] if `path` resolves to another origin, plus
    /// anything [`Get::invoke`] returns.
    pub async fn get_with_headers(
        &mut self,
        path: &str,
        params: Params,
        headers: Headers,
    ) -> Result<Response> {
        let request = self.request(path, params, headers)?;
        request.invoke().await
    }

    /// The [`Get`] that [`get_with_headers`](Session::get_with_headers) issues.
    /// It stays inside the session so nothing can reopen the connection after
    /// the session is dropped.
    fn request(&self, path: &str, params: Params, headers: Headers) -> Result<Get> {
        let uri = self.base.join(path).map_err(|source| Error::InvalidUri {
            uri: path.to_owned(),
            source,
        })?;
        if Origin::from_url(&uri).as_ref() != Some(&self.origin) {
            return Err(Error::CrossOrigin {
                uri: uri.to_string(),
                origin: self.origin.clone(),
            });
        }
        Ok(Get::with_channel(
            Channel::Session(self.link.clone()),
            uri,
            params,
            headers,
            self.options.clone(),
        ))
    }

    /// Releases the connection now. The session stays usable and reconnects
    /// on the next request.
    pub fn close(&mut self) {
        if self.link.release() {
            debug!(origin = %self.origin, "session connection closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base", &self.base.as_str())
            .field("state", &self.state())
            .field("options", &self.options)
            .finish()
    }
}
