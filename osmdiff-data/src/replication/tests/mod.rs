use super::test_support::{RecordingClock, ScriptedTransport, block_on_for_tests};
use super::transport::parse_latest_sequence;
use super::{
    BaseUrl, Clock, DEFAULT_BASE_URL, FramedPayload, HttpTransportConfig, RECORD_SEPARATOR,
    ReplicationError, ReplicationOptions, ReplicationSource, SourceState, TransportError,
    decode_body,
};
use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use futures_util::{FutureExt, StreamExt};
use rstest::{fixture, rstest};
use std::{
    cell::{Cell, RefCell},
    io::Write,
    rc::Rc,
    time::Duration,
};

const DELAY: Duration = Duration::from_secs(30);

#[fixture]
fn clock() -> RecordingClock {
    RecordingClock::default()
}

#[fixture]
fn finite() -> ReplicationOptions {
    ReplicationOptions::default().with_infinite(false)
}

fn body(sequence: u64) -> Vec<u8> {
    format!("<osm sequence=\"{sequence}\"/>").into_bytes()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// [`Clock`] whose waits never finish, counting waits begun and dropped.
#[derive(Debug, Clone, Default)]
struct StalledClock {
    started: Rc<Cell<usize>>,
    cancelled: Rc<Cell<usize>>,
}

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[async_trait(?Send)]
impl Clock for StalledClock {
    async fn sleep(&self, _duration: Duration) {
        self.started.set(self.started.get() + 1);
        let _pending_wait = DropCounter(Rc::clone(&self.cancelled));
        std::future::pending::<()>().await;
    }
}

fn drain(
    source: &mut ReplicationSource<ScriptedTransport, RecordingClock>,
) -> Result<Vec<u64>, ReplicationError> {
    let mut sequences = Vec::new();
    while let Some(payload) = block_on_for_tests(source.next_payload())? {
        sequences.push(payload.sequence);
    }
    Ok(sequences)
}

#[rstest]
fn retries_failed_fetches_without_advancing(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(7)
        .with_diff(7, body(7))
        .with_failures(7, 2);
    let checkpoints = Rc::new(RefCell::new(Vec::new()));
    let recorded = Rc::clone(&checkpoints);
    let mut source = ReplicationSource::new(transport.clone(), finite.with_initial_sequence(7))
        .with_clock(clock.clone())
        .with_checkpoint(move |sequence| recorded.borrow_mut().push(sequence));

    let payload = block_on_for_tests(source.next_payload())
        .expect("source should recover")
        .expect("payload expected");

    assert_eq!(payload, FramedPayload { sequence: 7, body: body(7) });
    assert_eq!(transport.diff_requests(), vec![7, 7, 7]);
    assert_eq!(clock.sleeps(), vec![DELAY, DELAY]);
    assert_eq!(*checkpoints.borrow(), vec![7]);
}

#[rstest]
fn drains_backlog_without_waiting(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(3)
        .with_diff(1, body(1))
        .with_diff(2, body(2))
        .with_diff(3, body(3));
    let mut source = ReplicationSource::new(transport.clone(), finite.with_initial_sequence(1))
        .with_clock(clock.clone());

    let sequences = drain(&mut source).expect("drain succeeds");

    assert_eq!(sequences, vec![1, 2, 3]);
    assert!(clock.sleeps().is_empty());
    assert_eq!(transport.status_requests(), 2);
    assert_eq!(source.state(), SourceState::Done);
}

#[rstest]
fn starts_at_latest_by_default(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(42).with_diff(42, body(42));
    let mut source = ReplicationSource::new(transport, finite).with_clock(clock);
    assert_eq!(source.state(), SourceState::Resolving);

    assert_eq!(drain(&mut source).expect("drain succeeds"), vec![42]);
}

#[rstest]
fn negative_start_counts_back_from_latest(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(10)
        .with_diff(9, body(9))
        .with_diff(10, body(10));
    let mut source =
        ReplicationSource::new(transport, finite.with_initial_sequence(-1)).with_clock(clock);

    assert_eq!(drain(&mut source).expect("drain succeeds"), vec![9, 10]);
}

#[rstest]
fn start_before_sequence_zero_is_fatal(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(10);
    let mut source =
        ReplicationSource::new(transport, finite.with_initial_sequence(-11)).with_clock(clock);

    let outcome = block_on_for_tests(source.next_payload());

    assert!(matches!(
        outcome,
        Err(ReplicationError::InvalidStart {
            offset: -11,
            latest: 10
        })
    ));
    assert_eq!(source.state(), SourceState::Failed);
    assert!(matches!(block_on_for_tests(source.next_payload()), Ok(None)));
}

#[rstest]
fn unpublished_sequences_count_as_caught_up(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(5);
    let mut source = ReplicationSource::new(transport.clone(), finite.with_initial_sequence(5))
        .with_clock(clock.clone());

    assert!(drain(&mut source).expect("no error").is_empty());
    assert_eq!(transport.diff_requests(), vec![5]);
    assert!(clock.sleeps().is_empty());
}

#[rstest]
fn infinite_mode_waits_for_new_sequences(clock: RecordingClock) {
    let transport = ScriptedTransport::new(1)
        .with_status_responses([1, 1, 2])
        .with_diff(1, body(1))
        .with_diff(2, body(2));
    let options = ReplicationOptions::default()
        .with_initial_sequence(1)
        .with_delay(Duration::from_secs(5));
    let mut source = ReplicationSource::new(transport, options).with_clock(clock.clone());

    let first = block_on_for_tests(source.next_payload()).expect("first payload");
    assert_eq!(source.cursor(), Some(2));
    let second = block_on_for_tests(source.next_payload()).expect("second payload");

    assert_eq!(first.map(|payload| payload.sequence), Some(1));
    assert_eq!(second.map(|payload| payload.sequence), Some(2));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
}

#[rstest]
fn status_failures_are_retried(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(4)
        .with_status_failures(2)
        .with_diff(4, body(4));
    let mut source = ReplicationSource::new(transport.clone(), finite).with_clock(clock.clone());

    assert_eq!(drain(&mut source).expect("drain succeeds"), vec![4]);
    assert_eq!(clock.sleeps().len(), 2);
    assert_eq!(transport.status_requests(), 4);
}

#[rstest]
fn retry_limit_surfaces_the_last_error(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(1)
        .with_diff(1, body(1))
        .with_http_failures(1, 5, 503);
    let options = finite.with_initial_sequence(1).with_retry_limit(2);
    let mut source = ReplicationSource::new(transport.clone(), options).with_clock(clock.clone());

    let outcome = block_on_for_tests(source.next_payload());

    match outcome {
        Err(ReplicationError::RetriesExhausted {
            attempts,
            source: TransportError::Http { status, .. },
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(status, 503);
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(transport.diff_requests(), vec![1, 1, 1]);
    assert_eq!(clock.sleeps().len(), 2);
    assert_eq!(source.state(), SourceState::Failed);
}

#[rstest]
fn gzip_payloads_are_inflated(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(2).with_diff(2, gzip(&body(2)));
    let mut source = ReplicationSource::new(transport, finite).with_clock(clock);

    let payload = block_on_for_tests(source.next_payload())
        .expect("payload decodes")
        .expect("payload expected");

    assert_eq!(payload.body, body(2));
}

#[rstest]
fn corrupt_gzip_is_treated_as_transient(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(2).with_diff(2, vec![0x1f, 0x8b, 0x00, 0x01]);
    let mut source =
        ReplicationSource::new(transport.clone(), finite.with_retry_limit(1)).with_clock(clock);

    let outcome = block_on_for_tests(source.next_payload());

    assert!(matches!(
        outcome,
        Err(ReplicationError::RetriesExhausted {
            attempts: 2,
            source: TransportError::Decompress { sequence: 2, .. },
        })
    ));
    assert_eq!(transport.diff_requests(), vec![2, 2]);
}

#[rstest]
fn stream_yields_framed_wire_bytes(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(2)
        .with_diff(1, body(1))
        .with_diff(2, body(2));
    let source = ReplicationSource::new(transport, finite.with_initial_sequence(1)).with_clock(clock);

    let chunks: Vec<_> = block_on_for_tests(source.into_stream().collect());

    assert_eq!(chunks.len(), 2);
    let first = chunks
        .first()
        .and_then(|chunk| chunk.as_ref().ok())
        .expect("first chunk is a payload");
    let text = String::from_utf8_lossy(first);
    assert!(text.starts_with("<!-- {status: start, sequenceNumber: 1} -->\n"));
    assert!(text.contains("<!-- {status: end, sequenceNumber: 1} -->\n"));
    assert_eq!(first.last(), Some(&RECORD_SEPARATOR));
}

#[rstest]
fn stream_omits_separators_when_disabled(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(3).with_diff(3, body(3));
    let options = ReplicationOptions {
        record_separator: false,
        ..finite
    };
    let source = ReplicationSource::new(transport, options).with_clock(clock);

    let chunks: Vec<_> = block_on_for_tests(source.into_stream().collect());

    let only = chunks
        .first()
        .and_then(|chunk| chunk.as_ref().ok())
        .expect("single payload");
    assert!(only.ends_with(b"<!-- {status: end, sequenceNumber: 3} -->\n"));
}

#[rstest]
fn dropping_the_stream_cancels_the_catch_up_wait() {
    let transport = ScriptedTransport::new(1).with_diff(1, body(1));
    let clock = StalledClock::default();
    let options = ReplicationOptions::default().with_initial_sequence(1);
    let source = ReplicationSource::new(transport.clone(), options).with_clock(clock.clone());
    let mut stream = Box::pin(source.into_stream());

    let first = stream.next().now_or_never();
    assert!(matches!(first, Some(Some(Ok(_)))));
    assert!(stream.next().now_or_never().is_none());
    assert!(stream.next().now_or_never().is_none());
    assert_eq!(clock.started.get(), 1);
    assert_eq!(clock.cancelled.get(), 0);
    let status_requests = transport.status_requests();
    let diff_requests = transport.diff_requests();

    drop(stream);

    assert_eq!(clock.cancelled.get(), 1);
    assert_eq!(transport.status_requests(), status_requests);
    assert_eq!(transport.diff_requests(), diff_requests);
}

#[rstest]
fn stream_ends_after_a_fatal_error(clock: RecordingClock, finite: ReplicationOptions) {
    let transport = ScriptedTransport::new(0);
    let source = ReplicationSource::new(transport, finite.with_initial_sequence(-1)).with_clock(clock);

    let chunks: Vec<_> = block_on_for_tests(source.into_stream().collect());

    assert_eq!(chunks.len(), 1);
    assert!(matches!(
        chunks.first(),
        Some(Err(ReplicationError::InvalidStart { .. }))
    ));
}

#[rstest]
#[case(b"2801986\n", Some(2_801_986))]
#[case(b"  17 ", Some(17))]
#[case(b"", None)]
#[case(b"-4", None)]
#[case(b"soon", None)]
fn parses_status_bodies(#[case] raw: &[u8], #[case] expected: Option<u64>) {
    let parsed = parse_latest_sequence(raw, "https://example.org/adiff/status");
    match expected {
        Some(value) => assert_eq!(parsed.ok(), Some(value)),
        None => assert!(matches!(parsed, Err(TransportError::Body { .. }))),
    }
}

#[rstest]
fn plain_bodies_pass_through_decoding() {
    assert_eq!(decode_body(1, b"<osm/>".to_vec()).ok(), Some(b"<osm/>".to_vec()));
}

#[rstest]
fn wire_frames_omit_the_separator_on_request() {
    let payload = FramedPayload {
        sequence: 9,
        body: b"<osm/>".to_vec(),
    };
    let wire = payload.into_wire(false);
    assert_ne!(wire.last(), Some(&RECORD_SEPARATOR));
}

#[rstest]
#[case("https://example.org/adiff/", "https://example.org/adiff")]
#[case("  https://example.org//", "https://example.org")]
#[case("", DEFAULT_BASE_URL)]
fn sanitises_base_urls(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(BaseUrl::new(raw).as_ref(), expected);
}

#[rstest]
fn default_endpoints_follow_the_overpass_layout() {
    let config = HttpTransportConfig::default();

    assert_eq!(
        config.status_url(),
        "https://overpass-api.de/api/augmented_diff_status"
    );
    assert_eq!(
        config.diff_url(5_234_100),
        "https://overpass-api.de/api/augmented_diff?id=5234100"
    );
}

#[rstest]
fn endpoint_paths_can_be_overridden() {
    let config =
        HttpTransportConfig::new("https://mirror.example.org/adiff/").with_endpoints("/status", "diff");

    assert_eq!(config.status_url(), "https://mirror.example.org/adiff/status");
    assert_eq!(config.diff_url(7), "https://mirror.example.org/adiff/diff?id=7");
}
