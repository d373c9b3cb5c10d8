//! Crate-level error type.

use thiserror::Error;

use crate::cache::CacheError;
use crate::transport::{Origin, TransportError};

/// Errors produced by requests and sessions.
///
/// Transport and cache failures propagate unchanged; nothing is retried and
/// no cache failure is papered over with a network fetch.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("invalid URI {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URI {uri} has no host to connect to")]
    MissingHost { uri: String },

    #[error("{uri} is not served by the session origin {origin}")]
    CrossOrigin { uri: String, origin: Origin },
}

pub type Result<T> = std::result::Result<T, Error>;
