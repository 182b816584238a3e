use super::state::PayloadCache;
use super::{AdiffParseError, DiffEvent, DiffParser, complete_prefix_len};
use geo::{Coord, LineString};
use osmdiff_core::{
    ActionKind, ElementBody, ElementKind, FeatureCollection, FeatureLabel, Geometry, NodeRef,
    RawElement, SequenceMarker, Slot,
};
use rstest::{fixture, rstest};

const CREATE_CAFE: &str = r#"<osm version="0.6">
<action type="create">
  <node id="1" version="1" changeset="10" uid="7" user="mapper" timestamp="2012-09-12T06:56:30Z" lat="51.5" lon="-0.1">
    <tag k="amenity" v="cafe"/>
    <tag k="name" v="Tea &amp; Cake"/>
  </node>
</action>
<action type="create">
  <node id="2" version="1" lat="51.6" lon="-0.2"/>
</action>
</osm>"#;

const CREATE_SERVICE_ROAD: &str = r#"<osm>
<action type="create"><node id="1" version="1" lat="0" lon="0"/></action>
<action type="create"><node id="2" version="1" lat="0" lon="1"/></action>
<action type="create">
  <way id="3" version="1"><nd ref="1"/><nd ref="2"/><tag k="highway" v="service"/></way>
</action>
</osm>"#;

const DELETED_WAY_NODE: &str = r#"<osm>
<action type="delete">
  <old><node id="5" version="1" lat="2" lon="3"/></old>
  <new><node id="5" version="2" visible="false"/></new>
</action>
<action type="modify">
  <old>
    <way id="9" version="1">
      <nd ref="5" lat="2" lon="3"/><nd ref="6" lat="4" lon="5"/>
      <tag k="highway" v="path"/>
    </way>
  </old>
  <new>
    <way id="9" version="2">
      <nd ref="5"/><nd ref="6" lat="4" lon="6"/>
      <tag k="highway" v="path"/>
    </way>
  </new>
</action>
</osm>"#;

const MINOR_WAY_VERSION: &str = r#"<!-- {status: start, sequenceNumber: 200} -->
<osm>
<action type="modify">
  <old><node id="5" version="1" changeset="1" timestamp="2010-01-01T00:00:00Z" lat="0" lon="0"/></old>
  <new><node id="5" version="2" changeset="77" uid="3" user="fixer" timestamp="2012-09-12T10:14:30Z" lat="0" lon="1"/></new>
</action>
<action type="modify">
  <old>
    <way id="9" version="3" changeset="40" user="original">
      <nd ref="5"/><nd ref="6" lat="1" lon="1"/><tag k="highway" v="track"/>
    </way>
  </old>
  <new>
    <way id="9" version="3" changeset="40" user="original">
      <nd ref="5"/><nd ref="6" lat="1" lon="1"/><tag k="highway" v="track"/>
    </way>
  </new>
</action>
</osm>
<!-- {status: end, sequenceNumber: 200} -->
"#;

#[fixture]
fn parser() -> DiffParser {
    DiffParser::new()
}

fn parse(mut parser: DiffParser, input: &str) -> Vec<DiffEvent> {
    let events = parser.write(input.as_bytes()).expect("input parses");
    parser.finish().expect("input is complete");
    events
}

fn parse_in_chunks(input: &str, size: usize) -> Vec<DiffEvent> {
    let mut parser = DiffParser::new();
    let mut events = Vec::new();
    for chunk in input.as_bytes().chunks(size) {
        parser.feed(chunk, &mut events).expect("chunk parses");
    }
    parser.finish().expect("input is complete");
    events
}

fn collections(events: Vec<DiffEvent>) -> Vec<FeatureCollection> {
    events
        .into_iter()
        .filter_map(|event| match event {
            DiffEvent::Features(collection) => Some(collection),
            _ => None,
        })
        .collect()
}

fn only(collections: Vec<FeatureCollection>) -> FeatureCollection {
    assert_eq!(collections.len(), 1, "expected one collection");
    collections.into_iter().next().expect("one collection")
}

fn geometry(collection: &FeatureCollection, label: FeatureLabel) -> &Geometry {
    &collection
        .feature(label)
        .expect("feature for label")
        .geometry
}

fn line(points: &[(f64, f64)]) -> Geometry {
    Geometry::LineString(LineString::new(
        points.iter().map(|&(x, y)| Coord { x, y }).collect(),
    ))
}

#[rstest]
#[case(b"", 0)]
#[case(b"<osm>", 5)]
#[case(b"<osm><node id=\"1", 5)]
#[case(b"<tag v=\"a>b\"/>", 14)]
#[case(b"<tag v='a>b'", 0)]
#[case(b"<osm>\n  ", 5)]
#[case(b"<osm>\n  <", 8)]
#[case(b"<!-- a > b --><osm>", 19)]
#[case(b"<!-- a > b -", 0)]
#[case(b"<![CDATA[<x>]]>", 15)]
#[case(b"<?xml version=\"1.0\"?><osm>", 26)]
#[case(b"\x1e<!-- x -->", 11)]
fn frames_complete_markup(#[case] buffer: &[u8], #[case] expected: usize) {
    assert_eq!(complete_prefix_len(buffer), expected);
}

#[rstest]
fn creates_emit_a_single_new_feature(parser: DiffParser) {
    let collection = only(collections(parse(parser, CREATE_CAFE)));

    assert_eq!(collection.action, ActionKind::Create);
    assert_eq!(collection.sequence, None);
    assert_eq!(collection.features.len(), 1);
    let feature = collection.feature(FeatureLabel::New).expect("new feature");
    assert_eq!(
        feature.geometry,
        Geometry::Point(Coord { x: -0.1, y: 51.5 }.into())
    );
    assert_eq!(feature.properties.user.as_deref(), Some("mapper"));
    assert_eq!(
        feature.properties.tags.get("name").map(String::as_str),
        Some("Tea & Cake")
    );
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(7)]
#[case(64)]
fn chunking_does_not_change_the_output(#[case] size: usize) {
    let whole = parse(DiffParser::new(), MINOR_WAY_VERSION);
    assert_eq!(parse_in_chunks(MINOR_WAY_VERSION, size), whole);
}

#[rstest]
fn markers_bracket_the_payload_events(parser: DiffParser) {
    let input = format!(
        "{}\n{CREATE_CAFE}\n{}\n\u{1e}",
        SequenceMarker::start(100).to_comment(),
        SequenceMarker::end(100).to_comment()
    );

    let events = parse(parser, &input);

    assert_eq!(events.len(), 3);
    assert_eq!(events.first(), Some(&DiffEvent::SequenceStart(100)));
    assert!(matches!(
        events.get(1),
        Some(DiffEvent::Features(FeatureCollection {
            sequence: Some(100),
            ..
        }))
    ));
    assert_eq!(events.last(), Some(&DiffEvent::SequenceEnd(100)));
}

#[rstest]
fn end_markers_clear_the_active_sequence(mut parser: DiffParser) {
    parser
        .write(SequenceMarker::start(5).to_comment().as_bytes())
        .expect("marker parses");
    assert_eq!(parser.sequence(), Some(5));

    let events = parser
        .write(SequenceMarker::end(6).to_comment().as_bytes())
        .expect("marker parses");

    assert_eq!(events, vec![DiffEvent::SequenceEnd(6)]);
    assert_eq!(parser.sequence(), None);
}

#[rstest]
fn ordinary_comments_are_ignored(parser: DiffParser) {
    let events = parse(parser, "<!-- generated by overpass --><osm><!-- {status: start} --></osm>");
    assert!(events.is_empty());
}

#[rstest]
fn way_references_resolve_against_payload_nodes(parser: DiffParser) {
    let collection = only(collections(parse(parser, CREATE_SERVICE_ROAD)));

    assert_eq!(collection.element_kind(), Some(ElementKind::Way));
    assert_eq!(
        geometry(&collection, FeatureLabel::New),
        &line(&[(0.0, 0.0), (1.0, 0.0)])
    );
    let feature = collection.feature(FeatureLabel::New).expect("new feature");
    assert_eq!(feature.properties.nds, Some(vec![1, 2]));
}

#[rstest]
fn node_caches_are_scoped_to_one_payload(parser: DiffParser) {
    let input = r#"<osm>
<action type="create"><node id="1" lat="0" lon="0"/></action>
<action type="create"><node id="2" lat="0" lon="1"/></action>
</osm>
<osm>
<action type="create">
  <way id="3"><nd ref="1"/><nd ref="2"/><tag k="highway" v="service"/></way>
</action>
</osm>"#;

    let collection = only(collections(parse(parser, input)));

    assert_eq!(geometry(&collection, FeatureLabel::New), &Geometry::Empty);
}

#[rstest]
fn new_side_references_to_deleted_nodes_use_the_old_position(parser: DiffParser) {
    let collection = only(collections(parse(parser, DELETED_WAY_NODE)));

    assert_eq!(collection.action, ActionKind::Modify);
    assert_eq!(
        geometry(&collection, FeatureLabel::Old),
        &line(&[(3.0, 2.0), (5.0, 4.0)])
    );
    assert_eq!(
        geometry(&collection, FeatureLabel::New),
        &line(&[(3.0, 2.0), (6.0, 4.0)])
    );
}

#[rstest]
fn minor_way_versions_take_the_latest_node_edit(parser: DiffParser) {
    let collection = only(collections(parse(parser, MINOR_WAY_VERSION)));

    assert_eq!(collection.action, ActionKind::MinorVersion);
    assert_eq!(collection.sequence, Some(200));
    let new = collection.feature(FeatureLabel::New).expect("new feature");
    assert_eq!(new.properties.changeset, Some(77));
    assert_eq!(new.properties.user.as_deref(), Some("fixer"));
    let old = collection.feature(FeatureLabel::Old).expect("old feature");
    assert_eq!(old.properties.changeset, Some(40));
}

#[rstest]
fn unattributable_minor_versions_are_dropped(parser: DiffParser) {
    let input = r#"<osm><action type="modify">
<old><way id="9" version="3"><nd ref="5" lat="0" lon="0"/><nd ref="6" lat="1" lon="1"/><tag k="highway" v="track"/></way></old>
<new><way id="9" version="3"><nd ref="5" lat="0" lon="0"/><nd ref="6" lat="1" lon="1"/><tag k="highway" v="track"/></way></new>
</action></osm>"#;

    assert!(collections(parse(parser, input)).is_empty());
}

#[rstest]
fn relations_are_never_emitted(parser: DiffParser) {
    let input = r#"<osm><action type="create">
<relation id="4" version="1"><member type="way" ref="3" role="outer"/><tag k="type" v="multipolygon"/></relation>
</action></osm>"#;

    assert!(parse(parser, input).is_empty());
}

#[rstest]
fn geometry_failures_skip_only_that_action(parser: DiffParser) {
    let input = r#"<osm>
<action type="create"><node id="8"><tag k="shop" v="bakery"/></node></action>
<action type="create"><node id="9" lat="1" lon="1"><tag k="shop" v="florist"/></node></action>
</osm>"#;

    let collection = only(collections(parse(parser, input)));

    let feature = collection.feature(FeatureLabel::New).expect("new feature");
    assert_eq!(feature.properties.id, 9);
}

#[rstest]
fn mismatched_end_tags_halt_the_parser(mut parser: DiffParser) {
    let outcome = parser.write(b"<osm><action type=\"modify\"></osm>");

    assert!(matches!(
        outcome,
        Err(AdiffParseError::MismatchedEnd { ref expected, ref found })
            if expected == "action" && found == "osm"
    ));
    assert!(parser.is_halted());
    assert!(matches!(
        parser.write(b"<osm/>"),
        Err(AdiffParseError::Halted)
    ));
    assert!(matches!(parser.finish(), Err(AdiffParseError::Halted)));
}

#[rstest]
fn stray_end_tags_are_rejected(mut parser: DiffParser) {
    assert!(matches!(
        parser.write(b"<osm/></osm>"),
        Err(AdiffParseError::UnexpectedEnd { ref found }) if found == "osm"
    ));
}

#[rstest]
fn elements_without_ids_are_rejected(mut parser: DiffParser) {
    assert!(matches!(
        parser.write(b"<osm><action type=\"create\"><node lat=\"1\" lon=\"1\"/>"),
        Err(AdiffParseError::MissingAttribute {
            attribute: "id",
            ..
        })
    ));
}

#[rstest]
#[case(b"<osm><node id=\"1")]
#[case(b"<osm><action type=\"create\">")]
fn truncated_input_fails_on_finish(mut parser: DiffParser, #[case] input: &[u8]) {
    parser.write(input).expect("prefix parses");

    assert!(matches!(
        parser.finish(),
        Err(AdiffParseError::UnexpectedEof { .. })
    ));
    assert!(parser.is_halted());
}

#[rstest]
fn unterminated_tags_stop_at_the_buffering_limit() {
    let mut parser = DiffParser::new().with_max_pending(64);
    parser
        .write(b"<osm><action type=\"create\"><node id=\"1\" user=\"")
        .expect("opening markup parses");

    let outcome = parser.write(&[b'x'; 80]);

    assert!(matches!(
        outcome,
        Err(AdiffParseError::PendingOverflow { limit: 64 })
    ));
    assert!(parser.is_halted());
    assert!(matches!(parser.write(b"\"/>"), Err(AdiffParseError::Halted)));
}

#[rstest]
fn long_tokens_within_the_limit_still_parse() {
    let mut parser = DiffParser::new().with_max_pending(64);
    let value = "y".repeat(40);

    parser
        .write(format!("<osm><action type=\"create\"><node id=\"1\" user=\"{value}").as_bytes())
        .expect("partial tag is buffered");
    parser
        .write(b"\" lat=\"1\" lon=\"2\"/></action></osm>")
        .expect("tag completes");

    assert!(parser.finish().is_ok());
}

#[rstest]
fn trailing_separators_are_ignored_on_finish(mut parser: DiffParser) {
    parser.write(b"<osm/>\n\x1e\n").expect("payload parses");
    assert!(parser.finish().is_ok());
}

#[rstest]
fn reparsing_the_same_payload_is_deterministic() {
    let first = parse(DiffParser::new(), DELETED_WAY_NODE);
    let second = parse(DiffParser::new(), DELETED_WAY_NODE);
    assert_eq!(first, second);
}

#[rstest]
fn deleted_cache_entries_fall_back_to_the_old_side() {
    let mut cache = PayloadCache::default();
    cache.register(
        Slot::Old,
        RawElement::new(5, ElementBody::Node {
            lat: Some(2.0),
            lon: Some(3.0),
        }),
    );
    let mut deleted = RawElement::empty(ElementKind::Node, 5);
    deleted.visible = false;
    cache.register(Slot::New, deleted);
    let mut way = RawElement::new(9, ElementBody::Way {
        nodes: vec![NodeRef::stub(5, None, None)],
    });

    cache.resolve_way_nodes(Slot::New, &mut way);

    assert!(cache.contains(ElementKind::Node, Slot::New, 5));
    assert_eq!(
        way.way_nodes().first().and_then(NodeRef::coord),
        Some(Coord { x: 3.0, y: 2.0 })
    );
}
