//! HTTP/1.1 protocol types used by the client.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`Headers`], [`Response`], the cache-aware
//! [`Get`] request, and HTTP-date helpers in [`date`].

use std::fmt;

pub mod date;
pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::{Fingerprint, Get, Params};
pub use response::Response;

/// An HTTP response status code the client gives meaning to.
///
/// Replies carry arbitrary numeric codes; [`StatusCode::from_u16`] maps the
/// ones this crate recognises and returns `None` for the rest.
///
/// # Examples
///
/// ```
/// use httpstash::http::StatusCode;
///
/// let status = StatusCode::from_u16(304).unwrap();
/// assert_eq!(status, StatusCode::NotModified);
/// assert_eq!(status.canonical_reason(), "Not Modified");
/// assert!(!status.is_cacheable());
/// assert!(StatusCode::Ok.is_cacheable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NonAuthoritativeInformation = 203,
    NoContent = 204,
    PartialContent = 206,

    // 3xx Redirection
    MultipleChoices = 300,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Gone = 410,
    PreconditionFailed = 412,

    // 5xx Server Error
    InternalServerError = 500,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maps a numeric code onto a known variant.
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            200 => Self::Ok,
            201 => Self::Created,
            202 => Self::Accepted,
            203 => Self::NonAuthoritativeInformation,
            204 => Self::NoContent,
            206 => Self::PartialContent,
            300 => Self::MultipleChoices,
            301 => Self::MovedPermanently,
            302 => Self::Found,
            303 => Self::SeeOther,
            304 => Self::NotModified,
            307 => Self::TemporaryRedirect,
            308 => Self::PermanentRedirect,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            410 => Self::Gone,
            412 => Self::PreconditionFailed,
            500 => Self::InternalServerError,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            504 => Self::GatewayTimeout,
            _ => return None,
        })
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NonAuthoritativeInformation => "Non-Authoritative Information",
            Self::NoContent => "No Content",
            Self::PartialContent => "Partial Content",
            Self::MultipleChoices => "Multiple Choices",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::SeeOther => "See Other",
            Self::NotModified => "Not Modified",
            Self::TemporaryRedirect => "Temporary Redirect",
            Self::PermanentRedirect => "Permanent Redirect",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::Gone => "Gone",
            Self::PreconditionFailed => "Precondition Failed",
            Self::InternalServerError => "Internal Server Error",
            Self::BadGateway => "Bad Gateway",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// Returns `true` for the statuses a cache may store when the response
    /// also carries explicit freshness information (RFC 2616 §13.4).
    ///
    /// Cacheable statuses: 200, 203, 206, 300, 301, 410.
    pub fn is_cacheable(self) -> bool {
        matches!(
            self,
            Self::Ok
                | Self::NonAuthoritativeInformation
                | Self::PartialContent
                | Self::MultipleChoices
                | Self::MovedPermanently
                | Self::Gone
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// The request methods the client issues: `GET` for everything it fetches and
/// caches, `HEAD` for replies that carry no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
