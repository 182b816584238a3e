//! Adapters joining byte streams to a [`DiffParser`].
//!
//! Both adapters yield events in input order and end after the first
//! error they report.

use std::{collections::VecDeque, pin::Pin};

use futures_util::{Stream, StreamExt, stream};
use thiserror::Error;

use crate::{
    adiff::{AdiffParseError, DiffEvent, DiffParser},
    replication::{Clock, ReplicationError, ReplicationSource, ReplicationTransport},
};

/// Failure of a replicate-and-parse pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The source gave up.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
    /// The payload bytes were malformed.
    #[error(transparent)]
    Parse(#[from] AdiffParseError),
}

struct Drive<S, E> {
    input: Pin<Box<S>>,
    parser: DiffParser,
    queued: VecDeque<DiffEvent>,
    failure: Option<E>,
    finished: bool,
}

impl<S, B, E> Drive<S, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: From<AdiffParseError>,
{
    async fn next_item(&mut self) -> Option<Result<DiffEvent, E>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(Ok(event));
            }
            if let Some(error) = self.failure.take() {
                return Some(Err(error));
            }
            if self.finished {
                return None;
            }
            match self.input.next().await {
                Some(Ok(chunk)) => {
                    let mut events = Vec::new();
                    let outcome = self.parser.feed(chunk.as_ref(), &mut events);
                    self.queued.extend(events);
                    if let Err(error) = outcome {
                        self.fail(error.into());
                    }
                }
                Some(Err(error)) => self.fail(error),
                None => {
                    self.finished = true;
                    if let Err(error) = self.parser.finish() {
                        self.failure = Some(error.into());
                    }
                }
            }
        }
    }

    fn fail(&mut self, error: E) {
        self.failure = Some(error);
        self.finished = true;
    }
}

fn drive<S, B, E>(input: S, parser: DiffParser) -> impl Stream<Item = Result<DiffEvent, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: From<AdiffParseError>,
{
    let state = Drive {
        input: Box::pin(input),
        parser,
        queued: VecDeque::new(),
        failure: None,
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        let item = state.next_item().await?;
        Some((item, state))
    })
}

/// Parse every chunk of `input` with `parser`.
///
/// [`DiffParser::finish`] runs once `input` ends, so truncated markup
/// surfaces as a final error.
///
/// # Examples
/// ```
/// use futures_util::{StreamExt, stream};
/// use osmdiff_data::replication::test_support::block_on_for_tests;
/// use osmdiff_data::{DiffEvent, DiffParser, parse_stream};
///
/// let chunks = stream::iter([
///     "<!-- {status: start, sequenceNumber: 1} --><o",
///     "sm/><!-- {status: end, sequenceNumber: 1} -->",
/// ]);
/// let events: Vec<_> = block_on_for_tests(parse_stream(chunks, DiffParser::new()).collect());
///
/// assert_eq!(events.len(), 2);
/// assert!(matches!(events.last(), Some(Ok(DiffEvent::SequenceEnd(1)))));
/// ```
pub fn parse_stream<S, B>(
    input: S,
    parser: DiffParser,
) -> impl Stream<Item = Result<DiffEvent, AdiffParseError>>
where
    S: Stream<Item = B>,
    B: AsRef<[u8]>,
{
    drive(input.map(Ok::<B, AdiffParseError>), parser)
}

/// Feed every payload `source` produces through `parser`.
///
/// The stream never ends in infinite mode unless an error occurs.
pub fn replicate<T, C>(
    source: ReplicationSource<T, C>,
    parser: DiffParser,
) -> impl Stream<Item = Result<DiffEvent, PipelineError>>
where
    T: ReplicationTransport,
    C: Clock,
{
    drive(
        source
            .into_stream()
            .map(|chunk| chunk.map_err(PipelineError::from)),
        parser,
    )
}
