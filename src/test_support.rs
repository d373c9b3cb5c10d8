//! Shared fakes for unit tests: a scripted transport, a manual clock and a
//! store that counts its calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::BoxFuture;
use crate::cache::{CacheError, CacheStore, MemoryStore};
use crate::clock::Clock;
use crate::http::{Fingerprint, Get, Headers, Response};
use crate::options::Options;
use crate::transport::{Connection, Origin, RawRequest, RawResponse, Transport, TransportError};

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<RawResponse, TransportError>>,
    requests: Vec<RawRequest>,
    origins: Vec<Origin>,
    read_timeouts: Vec<Duration>,
    closed: usize,
}

/// Transport whose connections answer from a queue of canned replies.
///
/// Every connection shares the same queue and request log. An exhausted queue
/// answers with [`TransportError::Incomplete`].
#[derive(Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: RawResponse) {
        self.script.lock().unwrap().replies.push_back(Ok(reply));
    }

    pub fn fail_next(&self, error: TransportError) {
        self.script.lock().unwrap().replies.push_back(Err(error));
    }

    /// Number of connections opened so far.
    pub fn connects(&self) -> usize {
        self.script.lock().unwrap().origins.len()
    }

    /// Number of connections dropped so far.
    pub fn closed(&self) -> usize {
        self.script.lock().unwrap().closed
    }

    pub fn origins(&self) -> Vec<Origin> {
        self.script.lock().unwrap().origins.clone()
    }

    pub fn read_timeouts(&self) -> Vec<Duration> {
        self.script.lock().unwrap().read_timeouts.clone()
    }

    pub fn requests(&self) -> Vec<RawRequest> {
        self.script.lock().unwrap().requests.clone()
    }
}

impl Transport for ScriptedTransport {
    fn connect<'a>(
        &'a self,
        origin: &'a Origin,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, TransportError>> {
        self.script.lock().unwrap().origins.push(origin.clone());
        let connection = ScriptedConnection {
            script: Arc::clone(&self.script),
        };
        Box::pin(async move { Ok(Box::new(connection) as Box<dyn Connection>) })
    }
}

struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
}

impl Connection for ScriptedConnection {
    fn set_read_timeout(&mut self, timeout: Duration) {
        self.script.lock().unwrap().read_timeouts.push(timeout);
    }

    fn send<'a>(
        &'a mut self,
        request: &'a RawRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        let reply = script
            .replies
            .pop_front()
            .unwrap_or(Err(TransportError::Incomplete));
        Box::pin(async move { reply })
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        if let Ok(mut script) = self.script.lock() {
            script.closed += 1;
        }
    }
}

/// A clock that only moves when told to. Starts on a whole second.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A [`MemoryStore`] that counts lookups and writes, or fails every call.
pub struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    failing: bool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// The backing store, for seeding and inspection without touching the counters.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl CacheStore for CountingStore {
    fn get<'a>(
        &'a self,
        key: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Option<Response>, CacheError>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Box::pin(async { Err(CacheError::Backend("store offline".into())) });
        }
        self.inner.get(key)
    }

    fn set<'a>(
        &'a self,
        key: &'a Fingerprint,
        response: Response,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Box::pin(async { Err(CacheError::Backend("store offline".into())) });
        }
        self.inner.set(key, response)
    }
}

pub fn raw(status: u16, body: &str, headers: &[(&str, &str)]) -> RawResponse {
    RawResponse {
        status,
        headers: headers.iter().copied().collect(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

pub fn ok_raw(body: &str, headers: &[(&str, &str)]) -> RawResponse {
    raw(200, body, headers)
}

/// A 200 response received at `received_at`.
pub fn response_at(body: &str, headers: &[(&str, String)], received_at: DateTime<Utc>) -> Response {
    let headers: Headers = headers.iter().map(|(k, v)| (*k, v.clone())).collect();
    Response::new(
        RawResponse {
            status: 200,
            headers,
            body: Bytes::copy_from_slice(body.as_bytes()),
        },
        received_at,
    )
}

pub fn ok_response(body: &str, headers: &[(&str, &str)]) -> Response {
    Response::new(ok_raw(body, headers), Utc::now())
}

/// An uncached GET for `uri` over a transport with nothing scripted.
pub fn get_for(uri: &str) -> Get {
    Get::parse(
        Arc::new(ScriptedTransport::new()),
        uri,
        vec![],
        Headers::new(),
        Options::default(),
    )
    .unwrap()
}
