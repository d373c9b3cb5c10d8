//! HTTP responses and their cache metadata.
//!
//! A [`Response`] wraps a [`RawResponse`] and works out, once at construction,
//! everything the cache needs: the freshness lifetime, the response date and
//! the validators. The cache predicates are then pure functions of that state.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::date::parse_http_date;
use super::headers::{names, tokens};
use super::{Headers, StatusCode};
use crate::transport::RawResponse;

/// A response received from an origin (or served from a cache).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use chrono::Utc;
/// use httpstash::http::{Headers, Response};
/// use httpstash::transport::RawResponse;
///
/// let now = Utc::now();
/// let mut headers = Headers::new();
/// headers.insert("Cache-Control", "public, max-age=300");
/// headers.insert("ETag", "\"v1\"");
///
/// let response = Response::new(
///     RawResponse { status: 200, headers, body: Bytes::from_static(b"hi") },
///     now,
/// );
/// assert!(response.is_cacheable());
/// assert!(response.can_be_validated());
/// assert!(!response.is_expired(now));
/// assert!(response.is_expired(now + chrono::TimeDelta::seconds(301)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredResponse", into = "StoredResponse")]
pub struct Response {
    code: u16,
    headers: Headers,
    body: Bytes,
    received_at: DateTime<Utc>,
    meta: CacheMeta,
}

/// Cache facts derived from the headers at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheMeta {
    freshness_lifetime: TimeDelta,
    date: DateTime<Utc>,
    etag: Option<String>,
    last_modified: Option<String>,
    cacheable: bool,
}

/// The serialized form: only what came off the wire plus the receive time.
/// Metadata is recomputed on the way back in.
#[derive(Serialize, Deserialize)]
struct StoredResponse {
    code: u16,
    headers: Headers,
    body: Bytes,
    received_at: DateTime<Utc>,
}

impl From<StoredResponse> for Response {
    fn from(stored: StoredResponse) -> Self {
        Self::from_parts(stored.code, stored.headers, stored.body, stored.received_at)
    }
}

impl From<Response> for StoredResponse {
    fn from(response: Response) -> Self {
        Self {
            code: response.code,
            headers: response.headers,
            body: response.body,
            received_at: response.received_at,
        }
    }
}

impl Response {
    /// Wraps a raw reply received at `received_at`.
    pub fn new(raw: RawResponse, received_at: DateTime<Utc>) -> Self {
        Self::from_parts(raw.status, raw.headers, raw.body, received_at)
    }

    fn from_parts(code: u16, headers: Headers, body: Bytes, received_at: DateTime<Utc>) -> Self {
        let meta = CacheMeta::compute(code, &headers, received_at);
        Self {
            code,
            headers,
            body,
            received_at,
            meta,
        }
    }

    /// Numeric status code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Status code, if it is one this crate knows.
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.code)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status() == Some(StatusCode::NotModified)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of header `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// How long the response stays fresh after its [`date`](Self::date).
    ///
    /// `max-age` wins over `Expires - Date`; with neither the lifetime is zero.
    pub fn freshness_lifetime(&self) -> TimeDelta {
        self.meta.freshness_lifetime
    }

    /// The `Date` header, or the receive time when the origin sent none.
    pub fn date(&self) -> DateTime<Utc> {
        self.meta.date
    }

    pub fn etag(&self) -> Option<&str> {
        self.meta.etag.as_deref()
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.meta.last_modified.as_deref()
    }

    /// `true` when a cache may store this response: a cacheable status, an
    /// explicit freshness signal (`max-age` or `Expires`), and neither
    /// `no-store` nor `no-cache`.
    ///
    /// A validator alone does not make a response cacheable.
    pub fn is_cacheable(&self) -> bool {
        self.meta.cacheable
    }

    /// `true` once `now` is past `date + freshness_lifetime`. An expiry beyond
    /// the representable range never arrives.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.meta
            .date
            .checked_add_signed(self.meta.freshness_lifetime)
            .is_some_and(|expires_at| now > expires_at)
    }

    /// `true` when an `ETag` or `Last-Modified` lets the origin confirm the
    /// stored copy with a conditional request.
    pub fn can_be_validated(&self) -> bool {
        self.meta.etag.is_some() || self.meta.last_modified.is_some()
    }

    /// `true` when the `Connection` header carries the `Close` token, compared
    /// case-sensitively.
    pub fn closes_connection(&self) -> bool {
        self.headers.has_token(names::CONNECTION, tokens::CLOSE)
    }

    /// Folds a `304 Not Modified` into this stored response.
    ///
    /// Every header the 304 carries replaces the stored values of that name;
    /// status and body are kept. Without a `Date` on the 304 the stored `Date`
    /// is dropped, so the merged response dates from `now`. Cache metadata is
    /// recomputed from the merged headers.
    pub fn merge_not_modified(&self, not_modified: &Response, now: DateTime<Utc>) -> Response {
        let mut headers = self.headers.clone();
        if !not_modified.headers.contains(names::DATE) {
            headers.remove(names::DATE);
        }
        headers.overlay(&not_modified.headers);
        Self::from_parts(self.code, headers, self.body.clone(), now)
    }
}

impl CacheMeta {
    fn compute(code: u16, headers: &Headers, received_at: DateTime<Utc>) -> Self {
        let directives = CacheControl::parse(headers);
        let expires = headers.get(names::EXPIRES);

        let date = headers
            .get(names::DATE)
            .and_then(parse_http_date)
            .unwrap_or(received_at);

        let freshness_lifetime = match (directives.max_age, expires) {
            (Some(max_age), _) => TimeDelta::seconds(max_age),
            // An unparseable Expires means "already expired".
            (None, Some(expires)) => parse_http_date(expires)
                .map(|at| at.signed_duration_since(date).max(TimeDelta::zero()))
                .unwrap_or_else(TimeDelta::zero),
            (None, None) => TimeDelta::zero(),
        };

        let status_cacheable = StatusCode::from_u16(code).is_some_and(StatusCode::is_cacheable);
        let explicit_freshness = directives.max_age.is_some() || expires.is_some();
        let cacheable =
            status_cacheable && explicit_freshness && !directives.no_store && !directives.no_cache;

        Self {
            freshness_lifetime,
            date,
            etag: headers.get(names::ETAG).map(str::to_owned),
            last_modified: headers.get(names::LAST_MODIFIED).map(str::to_owned),
            cacheable,
        }
    }
}

/// Largest delta-seconds value honoured; bigger ones are clamped (RFC 9111 §1.2.2).
const DELTA_SECONDS_MAX: i64 = 1 << 31;

/// The `Cache-Control` directives that matter to a private client cache.
#[derive(Debug, Default, PartialEq, Eq)]
struct CacheControl {
    max_age: Option<i64>,
    no_store: bool,
    no_cache: bool,
}

impl CacheControl {
    /// Reads every `Cache-Control` header. A malformed `max-age` is ignored.
    fn parse(headers: &Headers) -> Self {
        let mut directives = Self::default();
        for directive in headers
            .get_all(names::CACHE_CONTROL)
            .flat_map(|value| value.split(','))
        {
            let directive = directive.trim();
            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim().trim_matches('"'))),
                None => (directive, None),
            };
            if name.eq_ignore_ascii_case("no-store") {
                directives.no_store = true;
            } else if name.eq_ignore_ascii_case("no-cache") {
                directives.no_cache = true;
            } else if name.eq_ignore_ascii_case("max-age") {
                if let Some(seconds) = value.and_then(|v| v.parse::<i64>().ok()) {
                    directives.max_age = Some(seconds.clamp(0, DELTA_SECONDS_MAX));
                }
            }
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::date::format_http_date;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn response(code: u16, headers: &[(&str, String)]) -> Response {
        Response::new(
            RawResponse {
                status: code,
                headers: headers.iter().cloned().collect(),
                body: Bytes::from_static(b"body"),
            },
            now(),
        )
    }

    fn http_date(offset_secs: i64) -> String {
        format_http_date(now() + TimeDelta::seconds(offset_secs))
    }

    #[test]
    fn max_age_makes_a_200_cacheable() {
        let r = response(200, &[("Cache-Control", "max-age=300".into())]);
        assert!(r.is_cacheable());
        assert_eq!(r.freshness_lifetime(), TimeDelta::seconds(300));
    }

    #[test]
    fn expires_makes_a_200_cacheable() {
        let r = response(
            200,
            &[("Date", http_date(0)), ("Expires", http_date(120))],
        );
        assert!(r.is_cacheable());
        assert_eq!(r.freshness_lifetime(), TimeDelta::seconds(120));
    }

    #[test]
    fn nothing_explicitly_defined_is_not_cacheable() {
        let r = response(200, &[]);
        assert!(!r.is_cacheable());
        assert_eq!(r.freshness_lifetime(), TimeDelta::zero());
        assert!(r.is_expired(now() + TimeDelta::seconds(1)));
    }

    #[test]
    fn etag_alone_is_not_cacheable() {
        let r = response(200, &[("ETag", "\"123\"".into())]);
        assert!(!r.is_cacheable());
        assert!(r.can_be_validated());
    }

    #[test]
    fn non_cacheable_status_code() {
        let r = response(404, &[("Cache-Control", "max-age=300".into())]);
        assert!(!r.is_cacheable());
        let r = response(410, &[("Cache-Control", "max-age=300".into())]);
        assert!(r.is_cacheable());
    }

    #[test]
    fn no_store_and_no_cache_forbid_caching() {
        let r = response(200, &[("Cache-Control", "max-age=300, no-store".into())]);
        assert!(!r.is_cacheable());
        let r = response(
            200,
            &[
                ("Cache-Control", "max-age=300".into()),
                ("Cache-Control", "No-Cache".into()),
            ],
        );
        assert!(!r.is_cacheable());
    }

    #[test]
    fn max_age_wins_over_expires() {
        let r = response(
            200,
            &[
                ("Date", http_date(0)),
                ("Expires", http_date(10)),
                ("Cache-Control", "max-age=300".into()),
            ],
        );
        assert_eq!(r.freshness_lifetime(), TimeDelta::seconds(300));
    }

    #[test]
    fn expires_in_the_past_or_garbage_is_zero_lifetime() {
        let past = response(200, &[("Date", http_date(0)), ("Expires", http_date(-86_400))]);
        assert_eq!(past.freshness_lifetime(), TimeDelta::zero());
        let garbage = response(200, &[("Expires", "0".into())]);
        assert_eq!(garbage.freshness_lifetime(), TimeDelta::zero());
        assert!(garbage.is_cacheable());
    }

    #[test]
    fn malformed_max_age_is_ignored() {
        let r = response(200, &[("Cache-Control", "max-age=soon".into())]);
        assert!(!r.is_cacheable());
        assert_eq!(r.freshness_lifetime(), TimeDelta::zero());
    }

    #[test]
    fn expiry_is_measured_from_the_date_header() {
        let r = response(
            200,
            &[("Date", http_date(-100)), ("Cache-Control", "max-age=300".into())],
        );
        assert_eq!(r.date(), now() - TimeDelta::seconds(100));
        assert!(!r.is_expired(now() + TimeDelta::seconds(200)));
        assert!(r.is_expired(now() + TimeDelta::seconds(201)));
    }

    #[test]
    fn missing_date_falls_back_to_receive_time() {
        let r = response(200, &[("Cache-Control", "max-age=1".into())]);
        assert_eq!(r.date(), now());
    }

    #[test]
    fn validators() {
        let r = response(200, &[("Last-Modified", http_date(-5))]);
        assert!(r.can_be_validated());
        assert_eq!(r.last_modified(), Some(http_date(-5).as_str()));
        assert_eq!(r.etag(), None);
        assert!(!response(200, &[]).can_be_validated());
    }

    #[test]
    fn merge_keeps_body_and_overlays_headers() {
        let stored = response(
            200,
            &[
                ("Date", http_date(-600)),
                ("Cache-Control", "max-age=1".into()),
                ("Last-Modified", http_date(-3600)),
                ("Header-That-Was-In-The-First-Response", "42".into()),
            ],
        );
        let not_modified = Response::new(
            RawResponse {
                status: 304,
                headers: [
                    ("Date", http_date(0)),
                    ("Cache-Control", "max-age=60".to_owned()),
                    ("Header-That-Changes-Everytime", "1".to_owned()),
                ]
                .into_iter()
                .collect(),
                body: Bytes::new(),
            },
            now(),
        );
        assert!(stored.is_expired(now()));

        let merged = stored.merge_not_modified(&not_modified, now());

        assert_eq!(merged.code(), 200);
        assert_eq!(merged.body(), stored.body());
        assert_eq!(merged.header("header-that-changes-everytime"), Some("1"));
        assert_eq!(merged.header("header-that-was-in-the-first-response"), Some("42"));
        assert_eq!(merged.freshness_lifetime(), TimeDelta::seconds(60));
        assert_eq!(merged.date(), now());
        assert!(!merged.is_expired(now() + TimeDelta::seconds(30)));
    }

    #[test]
    fn merge_without_date_restarts_the_clock_at_merge_time() {
        let stored = response(
            200,
            &[("Date", http_date(-600)), ("Cache-Control", "max-age=10".into())],
        );
        let bare_304 = Response::new(
            RawResponse {
                status: 304,
                headers: Headers::new(),
                body: Bytes::new(),
            },
            now(),
        );
        let later = now() + TimeDelta::seconds(5);
        let merged = stored.merge_not_modified(&bare_304, later);
        assert_eq!(merged.date(), later);
        assert!(!merged.is_expired(later + TimeDelta::seconds(10)));
    }

    #[test]
    fn dates_at_the_edge_of_the_calendar_do_not_overflow() {
        let far_date = response(
            200,
            &[
                ("Date", "Mon, 31 Dec +262142 23:59:49 GMT".into()),
                ("Cache-Control", "max-age=300".into()),
            ],
        );
        assert!(!far_date.is_expired(now()));
        assert!(far_date.is_cacheable());

        let far_expires = response(
            200,
            &[("Expires", "Mon, 31 Dec +262142 23:59:49 GMT".into())],
        );
        assert!(far_expires.freshness_lifetime() > TimeDelta::zero());
        assert!(!far_expires.is_expired(now()));
    }

    #[test]
    fn connection_close_token() {
        let keep = response(200, &[("Connection", "Keep-Alive".into())]);
        assert!(!keep.closes_connection());
        let close = response(200, &[("Connection", "Close".into())]);
        assert!(close.closes_connection());
        assert!(!response(200, &[]).closes_connection());
    }

    #[test]
    fn metadata_is_rebuilt_after_deserializing() {
        let original = response(
            200,
            &[("Cache-Control", "max-age=300".into()), ("ETag", "\"x\"".into())],
        );
        let json = serde_json::to_string(&original).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
        assert!(back.is_cacheable());
        assert_eq!(back.etag(), Some("\"x\""));
    }
}
