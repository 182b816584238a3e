//! Sequence cursor and retry state machine.

use std::{fmt, time::Duration};

use futures_util::{Stream, stream};
use log::{debug, info, warn};

use super::{
    Clock, FramedPayload, ReplicationError, ReplicationTransport, TokioClock, TransportError,
    decode_body,
};

const DEFAULT_DELAY_SECS: u64 = 30;

/// Callback receiving each successfully fetched sequence number.
///
/// Fires once per payload, before downstream processing is known to
/// have succeeded, so consumers get at-least-once delivery.
pub type Checkpoint = Box<dyn FnMut(u64)>;

/// Behaviour of a [`ReplicationSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationOptions {
    /// First sequence to fetch. Negative values count back from the
    /// latest published sequence; `None` starts at the latest.
    pub initial_sequence: Option<i64>,
    /// Wait between retries and between polls once caught up.
    pub delay: Duration,
    /// Keep polling after catching up instead of ending the stream.
    pub infinite: bool,
    /// Append [`RECORD_SEPARATOR`](super::RECORD_SEPARATOR) to each
    /// framed payload.
    pub record_separator: bool,
    /// Consecutive failures tolerated before giving up; `None` retries
    /// forever.
    pub retry_limit: Option<u32>,
}

impl Default for ReplicationOptions {
    fn default() -> Self {
        Self {
            initial_sequence: None,
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            infinite: true,
            record_separator: true,
            retry_limit: None,
        }
    }
}

impl ReplicationOptions {
    /// Start at `sequence`, or that many sequences behind latest when
    /// negative.
    #[must_use]
    pub const fn with_initial_sequence(mut self, sequence: i64) -> Self {
        self.initial_sequence = Some(sequence);
        self
    }

    /// Set the retry and catch-up delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Choose whether to keep polling once caught up.
    #[must_use]
    pub const fn with_infinite(mut self, infinite: bool) -> Self {
        self.infinite = infinite;
        self
    }

    /// Give up after `limit` consecutive failures.
    #[must_use]
    pub const fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }
}

/// Observable phase of a [`ReplicationSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// The starting cursor has not been resolved yet.
    Resolving,
    /// The next call issues a request for `cursor`.
    Fetching {
        /// Sequence about to be requested.
        cursor: u64,
    },
    /// The next call waits before retrying or polling.
    Waiting {
        /// Pending cursor, if already resolved.
        cursor: Option<u64>,
    },
    /// Caught up in finite mode.
    Done,
    /// A non-transient error was returned.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Poll { cursor: Option<u64> },
    Fetch { cursor: u64, latest: u64 },
}

impl Step {
    const fn cursor(self) -> Option<u64> {
        match self {
            Self::Poll { cursor } => cursor,
            Self::Fetch { cursor, .. } => Some(cursor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready(Step),
    Waiting(Step),
    Done,
    Failed,
}

/// Lazily walks the replication feed one sequence at a time.
///
/// # Examples
/// ```
/// use osmdiff_data::replication::test_support::{
///     RecordingClock, ScriptedTransport, block_on_for_tests,
/// };
/// use osmdiff_data::replication::{ReplicationOptions, ReplicationSource};
///
/// let transport = ScriptedTransport::new(2).with_diff(2, b"<osm/>".to_vec());
/// let options = ReplicationOptions::default().with_infinite(false);
/// let mut source =
///     ReplicationSource::new(transport, options).with_clock(RecordingClock::default());
///
/// let payload = block_on_for_tests(source.next_payload())?.expect("one payload");
/// assert_eq!(payload.sequence, 2);
/// assert!(block_on_for_tests(source.next_payload())?.is_none());
/// # Ok::<(), osmdiff_data::replication::ReplicationError>(())
/// ```
pub struct ReplicationSource<T, C = TokioClock> {
    transport: T,
    clock: C,
    options: ReplicationOptions,
    checkpoint: Option<Checkpoint>,
    phase: Phase,
    failures: u32,
}

impl<T: fmt::Debug, C: fmt::Debug> fmt::Debug for ReplicationSource<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationSource")
            .field("transport", &self.transport)
            .field("clock", &self.clock)
            .field("options", &self.options)
            .field("phase", &self.phase)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl<T: ReplicationTransport> ReplicationSource<T> {
    /// Create a source using the Tokio timer.
    #[must_use]
    pub fn new(transport: T, options: ReplicationOptions) -> Self {
        let cursor = options
            .initial_sequence
            .and_then(|sequence| u64::try_from(sequence).ok());
        Self {
            transport,
            clock: TokioClock,
            options,
            checkpoint: None,
            phase: Phase::Ready(Step::Poll { cursor }),
            failures: 0,
        }
    }
}

impl<T: ReplicationTransport, C: Clock> ReplicationSource<T, C> {
    /// Replace the clock used for waits.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> ReplicationSource<T, D> {
        ReplicationSource {
            transport: self.transport,
            clock,
            options: self.options,
            checkpoint: self.checkpoint,
            phase: self.phase,
            failures: self.failures,
        }
    }

    /// Register the checkpoint callback.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: impl FnMut(u64) + 'static) -> Self {
        self.checkpoint = Some(Box::new(checkpoint));
        self
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> SourceState {
        match self.phase {
            Phase::Ready(Step::Poll { cursor: None }) => SourceState::Resolving,
            Phase::Ready(Step::Poll {
                cursor: Some(cursor),
            })
            | Phase::Ready(Step::Fetch { cursor, .. }) => SourceState::Fetching { cursor },
            Phase::Waiting(step) => SourceState::Waiting {
                cursor: step.cursor(),
            },
            Phase::Done => SourceState::Done,
            Phase::Failed => SourceState::Failed,
        }
    }

    /// Next sequence the source will request, once resolved.
    #[must_use]
    pub const fn cursor(&self) -> Option<u64> {
        match self.phase {
            Phase::Ready(step) | Phase::Waiting(step) => step.cursor(),
            Phase::Done | Phase::Failed => None,
        }
    }

    /// Drive the state machine until a payload is available.
    ///
    /// Returns `Ok(None)` once the source is done: caught up in finite
    /// mode, or after a fatal error has been reported.
    ///
    /// # Errors
    /// Returns [`ReplicationError`] for a relative start before sequence
    /// zero or when the retry limit is exceeded.
    pub async fn next_payload(&mut self) -> Result<Option<FramedPayload>, ReplicationError> {
        loop {
            match self.phase {
                Phase::Done | Phase::Failed => return Ok(None),
                Phase::Waiting(step) => {
                    self.clock.sleep(self.options.delay).await;
                    self.phase = Phase::Ready(step);
                }
                Phase::Ready(Step::Poll { cursor }) => self.poll(cursor).await?,
                Phase::Ready(Step::Fetch { cursor, latest }) => {
                    if let Some(payload) = self.fetch(cursor, latest).await? {
                        return Ok(Some(payload));
                    }
                }
            }
        }
    }

    /// Framed wire bytes for each payload.
    ///
    /// The stream ends when the source is done and yields at most one
    /// error. Dropping it cancels any pending request or wait.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>, ReplicationError>> {
        let record_separator = self.options.record_separator;
        stream::unfold(self, move |mut source| async move {
            match source.next_payload().await {
                Ok(Some(payload)) => Some((Ok(payload.into_wire(record_separator)), source)),
                Ok(None) => None,
                Err(error) => Some((Err(error), source)),
            }
        })
    }

    async fn poll(&mut self, pending: Option<u64>) -> Result<(), ReplicationError> {
        let latest = match self.transport.fetch_latest_sequence().await {
            Ok(latest) => latest,
            Err(error) => return self.retry(Step::Poll { cursor: pending }, error),
        };
        self.failures = 0;
        let cursor = match pending {
            Some(resolved) => resolved,
            None => self.resolve_start(latest)?,
        };
        if cursor <= latest {
            self.phase = Phase::Ready(Step::Fetch { cursor, latest });
        } else {
            debug!("caught up at sequence {latest}");
            self.caught_up(cursor);
        }
        Ok(())
    }

    async fn fetch(
        &mut self,
        cursor: u64,
        latest: u64,
    ) -> Result<Option<FramedPayload>, ReplicationError> {
        debug!("fetching sequence {cursor} (latest {latest})");
        let fetched = match self.transport.fetch_diff(cursor).await {
            Ok(raw) => decode_body(cursor, raw),
            Err(error) => Err(error),
        };
        let body = match fetched {
            Ok(body) => body,
            Err(error) if error.is_not_published() => {
                debug!("sequence {cursor} is not published yet");
                self.caught_up(cursor);
                return Ok(None);
            }
            Err(error) => {
                self.retry(Step::Fetch { cursor, latest }, error)?;
                return Ok(None);
            }
        };
        self.failures = 0;
        let next = cursor.saturating_add(1);
        self.phase = if next <= latest {
            Phase::Ready(Step::Fetch {
                cursor: next,
                latest,
            })
        } else {
            Phase::Ready(Step::Poll { cursor: Some(next) })
        };
        info!("emitting sequence {cursor}");
        if let Some(checkpoint) = self.checkpoint.as_mut() {
            checkpoint(cursor);
        }
        Ok(Some(FramedPayload {
            sequence: cursor,
            body,
        }))
    }

    fn resolve_start(&mut self, latest: u64) -> Result<u64, ReplicationError> {
        let Some(offset) = self.options.initial_sequence.filter(|offset| *offset < 0) else {
            return Ok(latest);
        };
        if let Some(cursor) = latest.checked_sub(offset.unsigned_abs()) {
            debug!("starting {} sequences behind latest at {cursor}", offset.unsigned_abs());
            return Ok(cursor);
        }
        self.phase = Phase::Failed;
        Err(ReplicationError::InvalidStart { offset, latest })
    }

    fn caught_up(&mut self, cursor: u64) {
        self.phase = if self.options.infinite {
            Phase::Waiting(Step::Poll {
                cursor: Some(cursor),
            })
        } else {
            Phase::Done
        };
    }

    fn retry(&mut self, step: Step, error: TransportError) -> Result<(), ReplicationError> {
        self.failures = self.failures.saturating_add(1);
        if self
            .options
            .retry_limit
            .is_some_and(|limit| self.failures > limit)
        {
            self.phase = Phase::Failed;
            return Err(ReplicationError::RetriesExhausted {
                attempts: self.failures,
                source: error,
            });
        }
        warn!(
            "attempt {} failed, retrying in {:?}: {error}",
            self.failures, self.options.delay
        );
        self.phase = Phase::Waiting(step);
        Ok(())
    }
}
