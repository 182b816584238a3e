//! Streaming augmented diff parser.

use log::{debug, warn};
use osmdiff_core::{
    ActionOutcome, ActionRecord, DiffContext, ElementKind, FeatureCollection, MarkerStatus,
    SequenceMarker, Slot,
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use super::{
    AdiffParseError,
    attrs::Attributes,
    complete_prefix_len,
    state::{ActionState, PayloadCache},
};

/// Something the parser observed in the byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffEvent {
    /// A start marker opened this sequence.
    SequenceStart(u64),
    /// An end marker closed this sequence. Safe to checkpoint.
    SequenceEnd(u64),
    /// One qualifying edit.
    Features(FeatureCollection),
}

/// Bytes of incomplete markup held before the parser gives up.
pub const MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

/// Incremental parser turning framed augmented diff bytes into
/// [`DiffEvent`]s.
///
/// Input may be split anywhere, including inside tags and attribute
/// values; incomplete markup is buffered until the next chunk. Several
/// `<osm>` documents may follow each other in one stream.
///
/// # Examples
/// ```
/// use osmdiff_data::{DiffEvent, DiffParser};
///
/// let mut parser = DiffParser::new();
/// let mut events = parser.write(b"<!-- {status: start, sequenceNumber: 3} --><osm><act")?;
/// events.extend(parser.write(b"ion type=\"create\"><node id=\"1\" lat=\"1\" lon=\"2\">")?);
/// events.extend(parser.write(b"<tag k=\"shop\" v=\"bakery\"/></node></action></osm>")?);
/// parser.finish()?;
///
/// assert_eq!(events.len(), 2);
/// assert_eq!(events.first(), Some(&DiffEvent::SequenceStart(3)));
/// assert!(matches!(events.last(), Some(DiffEvent::Features(_))));
/// # Ok::<(), osmdiff_data::AdiffParseError>(())
/// ```
#[derive(Debug)]
pub struct DiffParser {
    pending: Vec<u8>,
    max_pending: usize,
    consumed: usize,
    stack: Vec<String>,
    cache: PayloadCache,
    action: Option<ActionState>,
    context: DiffContext,
    halted: bool,
}

impl Default for DiffParser {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            max_pending: MAX_PENDING_BYTES,
            consumed: 0,
            stack: Vec::new(),
            cache: PayloadCache::default(),
            action: None,
            context: DiffContext::default(),
            halted: false,
        }
    }
}

impl DiffParser {
    /// Create a parser with no active sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many bytes of incomplete markup may be buffered.
    #[must_use]
    pub const fn with_max_pending(mut self, bytes: usize) -> Self {
        self.max_pending = bytes;
        self
    }

    /// Sequence opened by the most recent start marker, if still active.
    #[must_use]
    pub const fn sequence(&self) -> Option<u64> {
        self.context.sequence
    }

    /// Whether a fatal error has stopped the parser.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Consume `chunk` and return the events it completed.
    ///
    /// # Errors
    /// Returns [`AdiffParseError`] for malformed markup, or
    /// [`AdiffParseError::PendingOverflow`] when an unterminated token
    /// outgrows the buffering limit; the parser is halted afterwards.
    pub fn write(&mut self, chunk: &[u8]) -> Result<Vec<DiffEvent>, AdiffParseError> {
        let mut events = Vec::new();
        self.feed(chunk, &mut events)?;
        Ok(events)
    }

    /// Consume `chunk`, appending completed events to `events`.
    ///
    /// Events produced before an error are still appended.
    ///
    /// # Errors
    /// See [`DiffParser::write`].
    pub fn feed(
        &mut self,
        chunk: &[u8],
        events: &mut Vec<DiffEvent>,
    ) -> Result<(), AdiffParseError> {
        if self.halted {
            return Err(AdiffParseError::Halted);
        }
        self.pending.extend_from_slice(chunk);
        let complete = complete_prefix_len(&self.pending);
        let outcome = if complete == 0 {
            Ok(())
        } else {
            let markup: Vec<u8> = self.pending.drain(..complete).collect();
            let parsed = self.parse_markup(&markup, events);
            self.consumed = self.consumed.saturating_add(complete);
            parsed
        };
        if outcome.is_ok() && self.pending.len() > self.max_pending {
            warn!(
                "dropping {} buffered bytes at offset {}",
                self.pending.len(),
                self.consumed
            );
            self.pending.clear();
            return self.halt_on_error(Err(AdiffParseError::PendingOverflow {
                limit: self.max_pending,
            }));
        }
        self.halt_on_error(outcome)
    }

    /// Signal the end of input.
    ///
    /// Trailing whitespace and separator bytes are ignored.
    ///
    /// # Errors
    /// Returns [`AdiffParseError::UnexpectedEof`] when the input stopped
    /// inside markup or with elements still open.
    pub fn finish(&mut self) -> Result<(), AdiffParseError> {
        if self.halted {
            return Err(AdiffParseError::Halted);
        }
        let outcome = if self.pending.contains(&b'<') {
            Err(AdiffParseError::UnexpectedEof {
                context: "inside markup".to_owned(),
            })
        } else if let Some(open) = self.stack.last() {
            Err(AdiffParseError::UnexpectedEof {
                context: format!("inside <{open}>"),
            })
        } else {
            Ok(())
        };
        self.pending.clear();
        self.halt_on_error(outcome)
    }

    const fn halt_on_error(
        &mut self,
        outcome: Result<(), AdiffParseError>,
    ) -> Result<(), AdiffParseError> {
        if outcome.is_err() {
            self.halted = true;
        }
        outcome
    }

    fn parse_markup(
        &mut self,
        markup: &[u8],
        events: &mut Vec<DiffEvent>,
    ) -> Result<(), AdiffParseError> {
        let mut reader = Reader::from_reader(markup);
        reader.check_end_names(false).check_comments(false);
        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(source) => {
                    return Err(AdiffParseError::Xml {
                        position: self.consumed.saturating_add(reader.buffer_position()),
                        source,
                    });
                }
            };
            match event {
                Event::Start(start) => {
                    let name = decode_name(start.name().as_ref())?;
                    self.open(&name, &start)?;
                    self.stack.push(name);
                }
                Event::Empty(start) => {
                    let name = decode_name(start.name().as_ref())?;
                    self.open(&name, &start)?;
                    self.close(&name, events);
                }
                Event::End(end) => {
                    let name = decode_name(end.name().as_ref())?;
                    match self.stack.pop() {
                        Some(expected) if expected == name => self.close(&name, events),
                        Some(expected) => {
                            return Err(AdiffParseError::MismatchedEnd {
                                expected,
                                found: name,
                            });
                        }
                        None => return Err(AdiffParseError::UnexpectedEnd { found: name }),
                    }
                }
                Event::Comment(comment) => self.comment(&comment, events),
                Event::Eof => return Ok(()),
                _ => {}
            }
        }
    }

    fn open(&mut self, name: &str, start: &BytesStart<'_>) -> Result<(), AdiffParseError> {
        match name {
            "osm" => {
                self.cache = PayloadCache::default();
                self.action = None;
            }
            "action" => {
                let attributes = Attributes::collect(name, start)?;
                self.action = Some(ActionState::open(attributes.get("type")));
            }
            "old" | "new" => {
                if let (Some(action), Some(slot)) = (self.action.as_mut(), Slot::from_name(name)) {
                    action.select(slot);
                }
            }
            "tag" | "nd" | "member" => {
                let Some(element) = self.action.as_mut().and_then(ActionState::current_mut) else {
                    return Ok(());
                };
                let attributes = Attributes::collect(name, start)?;
                match name {
                    "tag" => {
                        if let Some((key, value)) = attributes.tag() {
                            element.tags.insert(key, value);
                        }
                    }
                    "nd" => match (element.way_nodes_mut(), attributes.node_ref()) {
                        (Some(nodes), Some(stub)) => nodes.push(stub),
                        (Some(_), None) => debug!("ignoring <nd> without a usable ref"),
                        (None, _) => {}
                    },
                    _ => {
                        if let Some(members) = element.members_mut() {
                            members.push(attributes.member());
                        }
                    }
                }
            }
            _ => {
                let Some(kind) = ElementKind::from_name(name) else {
                    return Ok(());
                };
                let Some(action) = self.action.as_mut().filter(|action| action.slot().is_some())
                else {
                    return Ok(());
                };
                action.begin(Attributes::collect(name, start)?.element(kind)?);
            }
        }
        Ok(())
    }

    fn close(&mut self, name: &str, events: &mut Vec<DiffEvent>) {
        match name {
            "old" | "new" => {
                if let Some(action) = &self.action {
                    register_current(&mut self.cache, action);
                }
            }
            "way" => {
                if let Some(action) = self.action.as_mut()
                    && let Some(slot) = action.slot()
                    && let Some(way) = action.current_mut()
                {
                    self.cache.resolve_way_nodes(slot, way);
                }
            }
            "action" => {
                let Some(action) = self.action.take() else {
                    return;
                };
                register_current(&mut self.cache, &action);
                if let Some(record) = action.into_record() {
                    self.emit(record, events);
                }
            }
            _ => {}
        }
    }

    fn emit(&self, record: ActionRecord, events: &mut Vec<DiffEvent>) {
        let kind = record.new.kind().as_str();
        let id = record.new.id;
        match record.resolve(&self.context) {
            Ok(ActionOutcome::Emit(collection)) => events.push(DiffEvent::Features(collection)),
            Ok(ActionOutcome::Suppressed(reason)) => {
                debug!("suppressed {kind} {id}: {reason:?}");
            }
            Err(err) => warn!("skipping action for {kind} {id}: {err}"),
        }
    }

    fn comment(&mut self, body: &[u8], events: &mut Vec<DiffEvent>) {
        let Some(marker) = std::str::from_utf8(body)
            .ok()
            .and_then(SequenceMarker::parse)
        else {
            debug!("ignoring comment that is not a sequence marker");
            return;
        };
        match marker.status {
            MarkerStatus::Start => {
                self.context = DiffContext::for_sequence(marker.sequence);
                events.push(DiffEvent::SequenceStart(marker.sequence));
            }
            MarkerStatus::End => {
                if self.context.sequence != Some(marker.sequence) {
                    warn!(
                        "end marker for sequence {} while {:?} is active",
                        marker.sequence, self.context.sequence
                    );
                }
                events.push(DiffEvent::SequenceEnd(marker.sequence));
                self.context = DiffContext::default();
            }
        }
    }
}

fn register_current(cache: &mut PayloadCache, action: &ActionState) {
    if let (Some(slot), Some(element)) = (action.slot(), action.current()) {
        cache.register(slot, element.clone());
    }
}

fn decode_name(raw: &[u8]) -> Result<String, AdiffParseError> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|source| AdiffParseError::Encoding { source })
}
