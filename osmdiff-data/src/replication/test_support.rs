//! Shared fixtures for replication tests.
//!
//! [`ScriptedTransport`] serves canned payloads and failures from memory;
//! [`RecordingClock`] returns immediately and remembers every wait.
//! Clones share state, so a test can keep a handle for assertions after
//! moving the original into a source.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    future::Future,
    io,
    rc::Rc,
    time::Duration,
};

use async_trait::async_trait;

use super::{BaseUrl, Clock, ReplicationTransport, TransportError};

#[derive(Debug, Default)]
struct Script {
    latest: u64,
    upcoming: VecDeque<u64>,
    status_failures: usize,
    diffs: BTreeMap<u64, Vec<u8>>,
    diff_failures: BTreeMap<u64, VecDeque<Failure>>,
    status_requests: usize,
    diff_requests: Vec<u64>,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Network,
    Status(u16),
}

/// In-memory [`ReplicationTransport`] with scripted responses.
///
/// Sequences without a registered payload answer with
/// [`TransportError::NotPublished`].
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    base_url: BaseUrl,
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    /// Transport reporting `latest` as the newest sequence.
    #[must_use]
    pub fn new(latest: u64) -> Self {
        Self {
            base_url: BaseUrl::new("https://example.org/adiff"),
            script: Rc::new(RefCell::new(Script {
                latest,
                ..Script::default()
            })),
        }
    }

    /// Serve `body` for `sequence`.
    #[must_use]
    pub fn with_diff(self, sequence: u64, body: Vec<u8>) -> Self {
        self.script.borrow_mut().diffs.insert(sequence, body);
        self
    }

    /// Fail the next `count` requests for `sequence` with a network error.
    #[must_use]
    pub fn with_failures(self, sequence: u64, count: usize) -> Self {
        self.push_failures(sequence, count, Failure::Network);
        self
    }

    /// Fail the next `count` requests for `sequence` with `status`.
    #[must_use]
    pub fn with_http_failures(self, sequence: u64, count: usize, status: u16) -> Self {
        self.push_failures(sequence, count, Failure::Status(status));
        self
    }

    /// Answer successive status requests with `sequences`, then keep
    /// reporting the last one.
    #[must_use]
    pub fn with_status_responses(self, sequences: impl IntoIterator<Item = u64>) -> Self {
        self.script.borrow_mut().upcoming.extend(sequences);
        self
    }

    /// Fail the next `count` status requests with a network error.
    #[must_use]
    pub fn with_status_failures(self, count: usize) -> Self {
        self.script.borrow_mut().status_failures = count;
        self
    }

    /// Change the reported latest sequence.
    pub fn set_latest(&self, latest: u64) {
        self.script.borrow_mut().latest = latest;
    }

    /// Sequences requested so far, in order.
    #[must_use]
    pub fn diff_requests(&self) -> Vec<u64> {
        self.script.borrow().diff_requests.clone()
    }

    /// Number of status requests so far.
    #[must_use]
    pub fn status_requests(&self) -> usize {
        self.script.borrow().status_requests
    }

    fn push_failures(&self, sequence: u64, count: usize, failure: Failure) {
        self.script
            .borrow_mut()
            .diff_failures
            .entry(sequence)
            .or_default()
            .extend(std::iter::repeat_n(failure, count));
    }
}

#[async_trait(?Send)]
impl ReplicationTransport for ScriptedTransport {
    async fn fetch_latest_sequence(&self) -> Result<u64, TransportError> {
        let mut script = self.script.borrow_mut();
        script.status_requests += 1;
        if script.status_failures > 0 {
            script.status_failures -= 1;
            return Err(scripted_error(self.base_url.join("status"), Failure::Network));
        }
        if let Some(next) = script.upcoming.pop_front() {
            script.latest = next;
        }
        Ok(script.latest)
    }

    async fn fetch_diff(&self, sequence: u64) -> Result<Vec<u8>, TransportError> {
        let mut script = self.script.borrow_mut();
        script.diff_requests.push(sequence);
        let url = format!("{}?id={sequence}", self.base_url.join("diff"));
        if let Some(failure) = script
            .diff_failures
            .get_mut(&sequence)
            .and_then(VecDeque::pop_front)
        {
            return Err(scripted_error(url, failure));
        }
        script
            .diffs
            .get(&sequence)
            .cloned()
            .ok_or(TransportError::NotPublished { url })
    }
}

fn scripted_error(url: String, failure: Failure) -> TransportError {
    match failure {
        Failure::Network => TransportError::Network {
            url,
            source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
        },
        Failure::Status(status) => TransportError::Http {
            url,
            status,
            message: format!("scripted status {status}"),
        },
    }
}

/// [`Clock`] that never sleeps and records requested waits.
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingClock {
    /// Every wait requested so far.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Run `future` to completion on a fresh current-thread runtime.
///
/// # Panics
/// Panics if the runtime cannot be built.
#[expect(
    clippy::expect_used,
    reason = "test helper; a runtime that cannot build should abort the test"
)]
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime should build")
        .block_on(future)
}
