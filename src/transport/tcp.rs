//! Plain-TCP HTTP/1.1 transport using Tokio and [`httparse`].
//!
//! Requests are written in origin-form; replies are parsed incrementally from a
//! per-connection buffer. Bodies are delimited by `Transfer-Encoding: chunked`,
//! `Content-Length`, or connection close, in that order of preference. A body
//! that ends at connection close, an HTTP/1.0 reply without keep-alive, or a
//! `Connection: close` in any letter case leaves the connection unusable for
//! further requests.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{Connection, Origin, RawRequest, RawResponse, Transport, TransportError};
use crate::BoxFuture;
use crate::http::headers::{names, tokens};
use crate::http::{Headers, Method};

/// Maximum number of headers we accept per response.
const MAX_HEADERS: usize = 64;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 8 * 1024;

/// Default cap on a single response body (64 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Opens plain TCP connections. TLS origins are refused with
/// [`TransportError::TlsUnsupported`].
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    max_body_size: usize,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies whose body exceeds `limit` bytes fail with
    /// [`TransportError::BodyTooLarge`].
    #[must_use]
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }
}

impl Transport for TcpTransport {
    fn connect<'a>(
        &'a self,
        origin: &'a Origin,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, TransportError>> {
        Box::pin(async move {
            if origin.tls {
                return Err(TransportError::TlsUnsupported(origin.clone()));
            }
            let stream = TcpStream::connect((origin.host.as_str(), origin.port))
                .await
                .map_err(|e| TransportError::Connect {
                    origin: origin.clone(),
                    source: e,
                })?;
            stream.set_nodelay(true)?;
            debug!(%origin, "tcp connection opened");
            let connection = TcpConnection::new(stream, origin.clone(), self.max_body_size);
            Ok(Box::new(connection) as Box<dyn Connection>)
        })
    }
}

/// A single HTTP/1.1 connection over TCP.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    origin: Origin,
    read_timeout: Option<Duration>,
    max_body_size: usize,
    reusable: bool,
    buf: BytesMut,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, origin: Origin, max_body_size: usize) -> Self {
        Self {
            stream,
            origin,
            read_timeout: None,
            max_body_size,
            reusable: true,
            buf: BytesMut::with_capacity(INITIAL_BUF_SIZE),
        }
    }

    fn check_body_size(&self, len: usize) -> Result<(), TransportError> {
        if len > self.max_body_size {
            return Err(TransportError::BodyTooLarge {
                limit: self.max_body_size,
            });
        }
        Ok(())
    }

    async fn write_request(&mut self, request: &RawRequest) -> Result<(), TransportError> {
        let mut out = BytesMut::with_capacity(128 + request.headers.len() * 64 + request.body.len());

        out.put(format!("{} {} HTTP/1.1\r\n", request.method, request.target).as_bytes());
        if !request.headers.contains(names::HOST) {
            out.put(format!("{}: {}\r\n", names::HOST, self.origin.authority()).as_bytes());
        }
        for (name, value) in request.headers.iter() {
            out.put(format!("{name}: {value}\r\n").as_bytes());
        }
        if !request.body.is_empty() && !request.headers.contains(names::CONTENT_LENGTH) {
            out.put(format!("{}: {}\r\n", names::CONTENT_LENGTH, request.body.len()).as_bytes());
        }
        out.put(&b"\r\n"[..]);
        out.put(request.body.as_ref());

        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads more bytes into the buffer, honouring the read timeout.
    /// Returns the number of bytes read; `0` means the peer closed.
    async fn fill(&mut self) -> Result<usize, TransportError> {
        let read = self.stream.read_buf(&mut self.buf);
        let n = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| TransportError::ReadTimeout(limit))??,
            None => read.await?,
        };
        trace!(origin = %self.origin, bytes = n, "read");
        Ok(n)
    }

    async fn fill_required(&mut self) -> Result<(), TransportError> {
        match self.fill().await? {
            0 => Err(TransportError::Incomplete),
            _ => Ok(()),
        }
    }

    async fn read_head(&mut self) -> Result<Head, TransportError> {
        loop {
            if let Some((head, len)) = parse_head(&self.buf)? {
                self.buf.advance(len);
                // Interim 1xx replies precede the real one.
                if (100..200).contains(&head.status) {
                    continue;
                }
                return Ok(head);
            }
            self.fill_required().await?;
        }
    }

    async fn read_sized(&mut self, len: usize) -> Result<Bytes, TransportError> {
        self.check_body_size(len)?;
        while self.buf.len() < len {
            self.fill_required().await?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    async fn read_to_close(&mut self) -> Result<Bytes, TransportError> {
        self.reusable = false;
        loop {
            let read = self.fill().await?;
            self.check_body_size(self.buf.len())?;
            if read == 0 {
                return Ok(self.buf.split().freeze());
            }
        }
    }

    async fn read_chunked(&mut self) -> Result<Bytes, TransportError> {
        let mut body = BytesMut::new();
        loop {
            let (offset, size) = loop {
                match httparse::parse_chunk_size(&self.buf) {
                    Ok(httparse::Status::Complete(found)) => break found,
                    Ok(httparse::Status::Partial) => self.fill_required().await?,
                    Err(_) => return Err(TransportError::InvalidChunkSize),
                }
            };
            let size = usize::try_from(size).map_err(|_| TransportError::InvalidChunkSize)?;
            self.buf.advance(offset);

            if size == 0 {
                self.skip_trailers().await?;
                return Ok(body.freeze());
            }

            let total = body
                .len()
                .checked_add(size)
                .ok_or(TransportError::InvalidChunkSize)?;
            self.check_body_size(total)?;
            let framed = size.checked_add(2).ok_or(TransportError::InvalidChunkSize)?;
            while self.buf.len() < framed {
                self.fill_required().await?;
            }
            body.put(&self.buf[..size]);
            self.buf.advance(framed);
        }
    }

    async fn skip_trailers(&mut self) -> Result<(), TransportError> {
        loop {
            if self.buf.starts_with(b"\r\n") {
                self.buf.advance(2);
                return Ok(());
            }
            if let Some(pos) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                self.buf.advance(pos + 4);
                return Ok(());
            }
            self.fill_required().await?;
        }
    }
}

impl Connection for TcpConnection {
    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = Some(timeout);
    }

    fn is_reusable(&self) -> bool {
        self.reusable
    }

    fn send<'a>(
        &'a mut self,
        request: &'a RawRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            if !self.reusable {
                return Err(TransportError::Incomplete);
            }
            self.write_request(request).await?;
            let Head {
                status,
                version,
                headers,
            } = self.read_head().await?;

            let closing = headers.has_token_ignore_case(names::CONNECTION, tokens::CLOSE);
            let http10_without_keep_alive = version == 0
                && !headers.has_token_ignore_case(names::CONNECTION, tokens::KEEP_ALIVE);
            if closing || http10_without_keep_alive {
                self.reusable = false;
            }

            let bodiless = request.method == Method::Head || status == 204 || status == 304;
            let chunked = headers
                .get(names::TRANSFER_ENCODING)
                .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"));
            let content_length = headers
                .get(names::CONTENT_LENGTH)
                .and_then(|v| v.trim().parse::<usize>().ok());

            let body = if bodiless {
                Bytes::new()
            } else if chunked {
                self.read_chunked().await?
            } else if let Some(len) = content_length {
                self.read_sized(len).await?
            } else {
                self.read_to_close().await?
            };

            debug!(
                origin = %self.origin,
                method = %request.method,
                target = %request.target,
                status,
                body_len = body.len(),
                reusable = self.reusable,
                "response received"
            );
            Ok(RawResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Status line and headers of a reply.
struct Head {
    status: u16,
    /// Minor HTTP version: `0` for HTTP/1.0, `1` for HTTP/1.1.
    version: u8,
    headers: Headers,
}

/// Parses a status line and header block, returning it with its length in
/// bytes. Returns `None` while incomplete.
fn parse_head(buf: &[u8]) -> Result<Option<(Head, usize)>, TransportError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Response::new(&mut headers);

    let len = match raw.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };
    let status = raw.code.ok_or(TransportError::Incomplete)?;
    let version = raw.version.unwrap_or(1);

    let mut header_map = Headers::with_capacity(raw.headers.len());
    for header in raw.headers.iter() {
        if let Ok(value) = std::str::from_utf8(header.value) {
            header_map.insert(header.name, value);
        }
    }
    Ok(Some((
        Head {
            status,
            version,
            headers: header_map,
        },
        len,
    )))
}
