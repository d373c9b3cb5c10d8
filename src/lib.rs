//! # httpstash
//!
//! RFC 2616 response caching and keep-alive sessions for an async HTTP/1.1
//! client.
//!
//! Every outgoing [`Get`] consults an optional [`CacheStore`](cache::CacheStore):
//! fresh entries are served without touching the network, stale entries with a
//! validator are revalidated with a conditional request, everything else is
//! fetched and stored when the origin allows it. A [`Session`] sends a series
//! of requests over one persistent connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use httpstash::cache::MemoryStore;
//! use httpstash::options::Options;
//! use httpstash::session::Session;
//! use httpstash::transport::TcpTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = Options::default().with_cache_store(Arc::new(MemoryStore::new()));
//!     let mut session = Session::new(Arc::new(TcpTransport::new()), "http://localhost:3000", options)?;
//!     let first = session.get("/cacheable/with_max_age/300", vec![]).await?;
//!     let again = session.get("/cacheable/with_max_age/300", vec![]).await?; // no network
//!     assert_eq!(first.body(), again.body());
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

// ── Protocol and transport ────────────────────────────────────────────────────
pub mod clock;
pub mod http;
pub mod transport;

// ── Caching and sessions ──────────────────────────────────────────────────────
pub mod cache;
pub mod options;
pub mod session;

pub mod error;

#[cfg(test)]
mod test_support;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use error::{Error, Result};
pub use http::{Fingerprint, Get, Headers, Method, Response, StatusCode};
pub use options::Options;
pub use session::{Session, SessionState};

/// A boxed future, as returned by the object-safe traits of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
