//! In-process document engine.
//!
//! `MemoryEngine` keeps a flat list of styled paragraphs and implements the
//! [`DocumentEngine`] contract for a single process: submitted batches are
//! queued and applied in order by [`MemoryEngine::flush`], and engine events
//! are published once the document state is no longer borrowed, so handlers
//! are free to query the engine again.
//!
//! Documents are registered up front or read from a plain-text file where
//! every line is a paragraph and an optional `[StyleName] ` prefix sets its
//! style.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use futures::FutureExt;

use crate::session::{
    Cursor, DocumentEngine, EngineError, EngineEvent, EngineFuture, EngineHandler, EngineSignal,
    Member, MemberId, Operation, ParagraphInfo, ParagraphRef, SelectionKind, StepPosition,
    StructuredContent, StyleDefinition, StyleFamily, StyleId, StyleSummary,
};
use crate::signals::{SignalBus, SubscriptionId};

const DISPLAY_NAME: &str = "style:display-name";

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryParagraph {
    pub id: ParagraphRef,
    pub text: String,
    pub style: StyleId,
}

impl MemoryParagraph {
    /// Steps covered by the paragraph: one per character plus the boundary.
    fn step_len(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStyle {
    pub definition: StyleDefinition,
    /// Automatic styles inherit from a common parent and are hidden from
    /// style lists.
    pub parent: Option<StyleId>,
    pub automatic: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryDocument {
    pub paragraphs: Vec<MemoryParagraph>,
    pub styles: BTreeMap<StyleId, MemoryStyle>,
    pub default_style: StyleDefinition,
    pub fonts: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    /// Structured content inserted so far, with its insertion position
    pub inserted: Vec<(StepPosition, StructuredContent)>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paragraph(mut self, text: &str, style: &str) -> Self {
        let id = ParagraphRef(self.paragraphs.len() as u64 + 1);
        self.paragraphs.push(MemoryParagraph {
            id,
            text: text.to_string(),
            style: StyleId::from(style),
        });
        self
    }

    pub fn common_style(mut self, id: &str, display_name: &str) -> Self {
        let mut definition = StyleDefinition::default();
        definition
            .attributes
            .insert(DISPLAY_NAME.to_string(), display_name.to_string());
        self.styles.insert(
            StyleId::from(id),
            MemoryStyle {
                definition,
                parent: None,
                automatic: false,
            },
        );
        self
    }

    pub fn automatic_style(mut self, id: &str, parent: &str) -> Self {
        self.styles.insert(
            StyleId::from(id),
            MemoryStyle {
                definition: StyleDefinition::default(),
                parent: Some(StyleId::from(parent)),
                automatic: true,
            },
        );
        self
    }

    pub fn style_attribute(mut self, id: &str, key: &str, value: &str) -> Self {
        if let Some(style) = self.styles.get_mut(&StyleId::from(id)) {
            style
                .definition
                .attributes
                .insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn style_property(mut self, id: &str, group: &str, key: &str, value: &str) -> Self {
        let definition = if id.is_empty() {
            Some(&mut self.default_style)
        } else {
            self.styles
                .get_mut(&StyleId::from(id))
                .map(|style| &mut style.definition)
        };
        if let Some(definition) = definition {
            definition
                .properties
                .entry(group.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn font(mut self, name: &str, family: &str) -> Self {
        self.fonts.insert(name.to_string(), family.to_string());
        self
    }

    /// Parse one paragraph per line; `[Style] text` attaches a style that is
    /// declared as a common style on first use.
    pub fn from_text(text: &str) -> Self {
        let mut doc = Self::new();
        for line in text.lines() {
            let parsed = line
                .strip_prefix('[')
                .and_then(|rest| rest.split_once(']'))
                .map(|(style, body)| (style.trim(), body.strip_prefix(' ').unwrap_or(body)));
            doc = match parsed {
                Some((style, body)) if !style.is_empty() => {
                    if !doc.styles.contains_key(&StyleId::from(style)) {
                        doc = doc.common_style(style, style);
                    }
                    doc.paragraph(body, style)
                }
                _ => doc.paragraph(line, ""),
            };
        }
        doc
    }

    fn find_paragraph(&self, id: ParagraphRef) -> Option<(StepPosition, &MemoryParagraph)> {
        self.paragraph_spans()
            .find(|(_, _, paragraph)| paragraph.id == id)
            .map(|(start, _, paragraph)| (start, paragraph))
    }

    /// `(start, end, paragraph)` with `end` being the paragraph's last step.
    fn paragraph_spans(&self) -> impl Iterator<Item = (StepPosition, u64, &MemoryParagraph)> {
        let mut next_start = 0u64;
        self.paragraphs.iter().map(move |paragraph| {
            let start = next_start;
            let end = start + paragraph.step_len();
            next_start = end + 1;
            (StepPosition(start), end, paragraph)
        })
    }

    fn info(start: StepPosition, paragraph: &MemoryParagraph) -> ParagraphInfo {
        ParagraphInfo {
            paragraph: paragraph.id,
            style_name: paragraph.style.clone(),
            start,
        }
    }

    fn paragraphs_in_range(&self, range: std::ops::RangeInclusive<u64>) -> Vec<ParagraphInfo> {
        self.paragraph_spans()
            .filter(|(start, end, _)| start.0 <= *range.end() && *range.start() <= *end)
            .map(|(start, _, paragraph)| Self::info(start, paragraph))
            .collect()
    }

    fn parent_chain(&self, style: &StyleId) -> Vec<StyleId> {
        let mut chain = Vec::new();
        let mut next = Some(style.clone());
        while let Some(id) = next {
            if id.is_default() || chain.contains(&id) {
                break;
            }
            let Some(entry) = self.styles.get(&id) else {
                break;
            };
            next = entry.parent.clone();
            chain.push(id);
        }
        chain
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Open,
    Closed,
}

#[derive(Debug)]
struct EngineState {
    phase: Phase,
    document: MemoryDocument,
    members: BTreeMap<MemberId, Member>,
    cursors: BTreeMap<MemberId, Cursor>,
}

pub struct MemoryEngine {
    state: RefCell<EngineState>,
    documents: RefCell<HashMap<String, MemoryDocument>>,
    pending: RefCell<VecDeque<Vec<Operation>>>,
    submitted: RefCell<Vec<Vec<Operation>>>,
    close_failure: RefCell<Option<String>>,
    load_count: Cell<usize>,
    apply_on_enqueue: Cell<bool>,
    bus: SignalBus<EngineEvent>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(EngineState {
                phase: Phase::Idle,
                document: MemoryDocument::default(),
                members: BTreeMap::new(),
                cursors: BTreeMap::new(),
            }),
            documents: RefCell::new(HashMap::new()),
            pending: RefCell::new(VecDeque::new()),
            submitted: RefCell::new(Vec::new()),
            close_failure: RefCell::new(None),
            load_count: Cell::new(0),
            apply_on_enqueue: Cell::new(false),
            bus: SignalBus::new(EngineSignal::ALL),
        }
    }

    pub fn register_document(&self, url: &str, document: MemoryDocument) {
        self.documents
            .borrow_mut()
            .insert(url.to_string(), document);
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().phase == Phase::Open
    }

    /// Number of successful loads so far.
    pub fn load_count(&self) -> usize {
        self.load_count.get()
    }

    /// Make the next `close` fail after flushing.
    pub fn fail_next_close(&self, reason: &str) {
        *self.close_failure.borrow_mut() = Some(reason.to_string());
    }

    /// Apply each batch as soon as it is enqueued instead of on `flush`.
    pub fn apply_on_enqueue(&self, immediate: bool) {
        self.apply_on_enqueue.set(immediate);
    }

    /// Every batch submitted through `enqueue`, applied or not.
    pub fn submitted(&self) -> Vec<Vec<Operation>> {
        self.submitted.borrow().clone()
    }

    pub fn take_submitted(&self) -> Vec<Vec<Operation>> {
        std::mem::take(&mut *self.submitted.borrow_mut())
    }

    pub fn pending_batches(&self) -> usize {
        self.pending.borrow().len()
    }

    /// A copy of the loaded document.
    pub fn document(&self) -> MemoryDocument {
        self.state.borrow().document.clone()
    }

    pub fn subscriber_count(&self, signal: EngineSignal) -> usize {
        self.bus.subscriber_count(signal)
    }

    /// Apply every queued batch in submission order.
    pub fn flush(&self) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(batch) = next else {
                break;
            };
            let events = self.apply_batch(batch);
            for event in events {
                if let Err(err) = self.bus.emit(&event) {
                    log::error!("memory engine could not publish {event:?}: {err}");
                }
            }
        }
    }

    fn apply_batch(&self, batch: Vec<Operation>) -> Vec<EngineEvent> {
        let mut state = self.state.borrow_mut();
        let mut events = Vec::new();
        let undoable = batch.iter().any(Operation::is_document_edit);
        for op in batch {
            log::debug!("memory engine applying {}", op.name());
            apply_operation(&mut state, op, &mut events);
        }
        if undoable {
            events.push(EngineEvent::UndoStackChanged);
        }
        events
    }

    fn load_document(&self, url: &str) -> Result<MemoryDocument, EngineError> {
        if let Some(document) = self.documents.borrow().get(url) {
            return Ok(document.clone());
        }
        let path = Path::new(url);
        if path.is_file() {
            let text = std::fs::read_to_string(path)?;
            return Ok(MemoryDocument::from_text(&text));
        }
        Err(EngineError::DocumentNotFound(url.to_string()))
    }
}

fn apply_operation(state: &mut EngineState, op: Operation, events: &mut Vec<EngineEvent>) {
    match op {
        Operation::AddMember {
            member_id,
            properties,
        } => {
            let existed = state
                .members
                .insert(member_id.clone(), Member::new(member_id.clone(), properties))
                .is_some();
            events.push(if existed {
                EngineEvent::MemberUpdated(member_id)
            } else {
                EngineEvent::MemberAdded(member_id)
            });
        }
        Operation::RemoveMember { member_id } => {
            if state.cursors.remove(&member_id).is_some() {
                events.push(EngineEvent::CursorRemoved(member_id.clone()));
            }
            if state.members.remove(&member_id).is_some() {
                events.push(EngineEvent::MemberRemoved(member_id));
            }
        }
        Operation::AddCursor { member_id } => {
            state.cursors.insert(
                member_id.clone(),
                Cursor {
                    member_id: member_id.clone(),
                    position: StepPosition(0),
                    anchor: StepPosition(0),
                    selection_kind: SelectionKind::Collapsed,
                },
            );
            events.push(EngineEvent::CursorAdded(member_id));
        }
        Operation::RemoveCursor { member_id } => {
            if state.cursors.remove(&member_id).is_some() {
                events.push(EngineEvent::CursorRemoved(member_id));
            }
        }
        Operation::MoveCursor {
            member_id,
            position,
            anchor,
            selection_kind,
        } => match state.cursors.get_mut(&member_id) {
            Some(cursor) => {
                cursor.position = position;
                cursor.anchor = anchor;
                cursor.selection_kind = selection_kind;
                events.push(EngineEvent::CursorMoved(member_id));
            }
            None => log::warn!("ignoring MoveCursor for {member_id}: no cursor"),
        },
        Operation::SetParagraphStyle {
            member_id,
            paragraph,
            style_id,
            ..
        } => {
            if let Some(target) = state
                .document
                .paragraphs
                .iter_mut()
                .find(|p| p.id == paragraph)
            {
                target.style = style_id;
                events.push(EngineEvent::ParagraphChanged {
                    paragraph,
                    member_id,
                });
            }
        }
        Operation::AddStyle {
            style_id,
            properties,
            ..
        } => {
            state.document.styles.insert(
                style_id.clone(),
                MemoryStyle {
                    definition: properties,
                    parent: None,
                    automatic: false,
                },
            );
            events.push(EngineEvent::StyleCreated(style_id));
        }
        Operation::RemoveStyle {
            member_id,
            style_id,
            ..
        } => {
            if state.document.styles.remove(&style_id).is_none() {
                log::warn!("ignoring RemoveStyle for unknown style {style_id}");
                return;
            }
            for paragraph in state
                .document
                .paragraphs
                .iter_mut()
                .filter(|p| p.style == style_id)
            {
                paragraph.style = StyleId::default_style();
                events.push(EngineEvent::ParagraphChanged {
                    paragraph: paragraph.id,
                    member_id: member_id.clone(),
                });
            }
            events.push(EngineEvent::StyleDeleted(style_id));
        }
        Operation::UpdateParagraphStyle {
            style_id,
            set_properties,
            removed_properties,
            ..
        } => {
            let definition = if style_id.is_default() {
                Some(&mut state.document.default_style)
            } else {
                state
                    .document
                    .styles
                    .get_mut(&style_id)
                    .map(|style| &mut style.definition)
            };
            let Some(definition) = definition else {
                log::warn!("ignoring UpdateParagraphStyle for unknown style {style_id}");
                return;
            };
            definition.attributes.extend(set_properties.attributes);
            for (group, values) in set_properties.properties {
                definition.properties.entry(group).or_default().extend(values);
            }
            for removed in &removed_properties {
                definition.attributes.remove(removed);
                for values in definition.properties.values_mut() {
                    values.remove(removed);
                }
            }
            events.push(EngineEvent::ParagraphStyleModified(style_id));
        }
        Operation::InsertStructuredContent {
            member_id,
            position,
            content,
        } => {
            let touched = state
                .document
                .paragraphs_in_range(position.0..=position.0)
                .first()
                .map(|info| info.paragraph);
            state.document.inserted.push((position, content));
            if let Some(paragraph) = touched {
                events.push(EngineEvent::ParagraphChanged {
                    paragraph,
                    member_id,
                });
            }
        }
        Operation::UpdateMetadata {
            set_properties,
            removed_properties,
            ..
        } => {
            state.document.metadata.extend(set_properties.clone());
            for removed in &removed_properties {
                state.document.metadata.remove(removed);
            }
            events.push(EngineEvent::MetadataChanged {
                set_properties,
                removed_properties,
            });
        }
    }
}

impl DocumentEngine for MemoryEngine {
    fn load(&self, url: &str) -> EngineFuture<()> {
        let result = self.load_document(url).map(|document| {
            let mut state = self.state.borrow_mut();
            state.phase = Phase::Open;
            state.document = document;
            state.members.clear();
            state.cursors.clear();
            self.pending.borrow_mut().clear();
            self.load_count.set(self.load_count.get() + 1);
            log::debug!("memory engine loaded {url}");
        });
        futures::future::ready(result).boxed_local()
    }

    fn close(&self) -> EngineFuture<()> {
        let result = if self.state.borrow().phase != Phase::Open {
            Err(EngineError::NotLoaded)
        } else {
            self.flush();
            match self.close_failure.borrow_mut().take() {
                Some(reason) => Err(EngineError::Rejected(reason)),
                None => {
                    self.state.borrow_mut().phase = Phase::Closed;
                    Ok(())
                }
            }
        };
        futures::future::ready(result).boxed_local()
    }

    fn enqueue(&self, batch: Vec<Operation>) -> Result<(), EngineError> {
        match self.state.borrow().phase {
            Phase::Idle => return Err(EngineError::NotLoaded),
            Phase::Closed => return Err(EngineError::Closed),
            Phase::Open => {}
        }
        self.submitted.borrow_mut().push(batch.clone());
        self.pending.borrow_mut().push_back(batch);
        if self.apply_on_enqueue.get() {
            self.flush();
        }
        Ok(())
    }

    fn subscribe(
        &self,
        signal: EngineSignal,
        handler: EngineHandler,
    ) -> Result<SubscriptionId, EngineError> {
        Ok(self.bus.subscribe(signal, handler)?)
    }

    fn unsubscribe(&self, signal: EngineSignal, id: SubscriptionId) {
        self.bus.unsubscribe(signal, id);
    }

    fn member(&self, member_id: &MemberId) -> Option<Member> {
        self.state.borrow().members.get(member_id).cloned()
    }

    fn cursor(&self, member_id: &MemberId) -> Option<Cursor> {
        self.state.borrow().cursors.get(member_id).cloned()
    }

    fn paragraph(&self, paragraph: ParagraphRef) -> Option<ParagraphInfo> {
        let state = self.state.borrow();
        state
            .document
            .find_paragraph(paragraph)
            .map(|(start, p)| MemoryDocument::info(start, p))
    }

    fn paragraph_at(&self, position: StepPosition) -> Option<ParagraphInfo> {
        self.state
            .borrow()
            .document
            .paragraphs_in_range(position.0..=position.0)
            .into_iter()
            .next()
    }

    fn paragraphs_in_selection(&self, member_id: &MemberId) -> Vec<ParagraphInfo> {
        let state = self.state.borrow();
        match state.cursors.get(member_id) {
            Some(cursor) => {
                let range = cursor.selected_range();
                state.document.paragraphs_in_range(range.start..=range.end)
            }
            None => Vec::new(),
        }
    }

    fn selection_intersects(&self, member_id: &MemberId, paragraph: ParagraphRef) -> bool {
        self.paragraphs_in_selection(member_id)
            .iter()
            .any(|info| info.paragraph == paragraph)
    }

    fn common_style_name(&self, style: &StyleId) -> Option<StyleId> {
        let state = self.state.borrow();
        let document = &state.document;
        document
            .parent_chain(style)
            .into_iter()
            .find(|id| document.styles.get(id).is_some_and(|s| !s.automatic))
    }

    fn has_paragraph_style(&self, style: &StyleId) -> bool {
        self.state.borrow().document.styles.contains_key(style)
    }

    fn paragraph_styles(&self) -> Vec<StyleSummary> {
        self.state
            .borrow()
            .document
            .styles
            .iter()
            .filter(|(_, style)| !style.automatic)
            .map(|(id, style)| StyleSummary {
                id: id.clone(),
                display_name: style
                    .definition
                    .attributes
                    .get(DISPLAY_NAME)
                    .cloned()
                    .unwrap_or_else(|| id.to_string()),
            })
            .collect()
    }

    fn style_definition(&self, style: &StyleId, family: StyleFamily) -> Option<StyleDefinition> {
        if family != StyleFamily::Paragraph {
            return None;
        }
        let state = self.state.borrow();
        if style.is_default() {
            return Some(state.document.default_style.clone());
        }
        state
            .document
            .styles
            .get(style)
            .map(|s| s.definition.clone())
    }

    fn inherited_style_attributes(
        &self,
        style: &StyleId,
        include_default: bool,
    ) -> Option<StyleDefinition> {
        let state = self.state.borrow();
        let document = &state.document;
        let chain = document.parent_chain(style);
        if chain.is_empty() && !style.is_default() {
            return None;
        }

        let mut merged = if include_default {
            document.default_style.clone()
        } else {
            StyleDefinition::default()
        };
        for id in chain.iter().rev() {
            if let Some(entry) = document.styles.get(id) {
                merged
                    .attributes
                    .extend(entry.definition.attributes.clone());
                for (group, values) in &entry.definition.properties {
                    merged
                        .properties
                        .entry(group.clone())
                        .or_default()
                        .extend(values.clone());
                }
            }
        }
        Some(merged)
    }

    fn is_style_used(&self, style: &StyleId) -> bool {
        let state = self.state.borrow();
        let document = &state.document;
        document
            .paragraphs
            .iter()
            .any(|p| document.parent_chain(&p.style).contains(style))
    }

    fn font_map(&self) -> BTreeMap<String, String> {
        self.state.borrow().document.fonts.clone()
    }

    fn metadata(&self, property: &str) -> Option<String> {
        self.state.borrow().document.metadata.get(property).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn sample() -> MemoryDocument {
        MemoryDocument::new()
            .common_style("Heading1", "Heading 1")
            .common_style("Body", "Body Text")
            .automatic_style("P1", "Body")
            .paragraph("Title", "Heading1")
            .paragraph("First", "P1")
            .paragraph("Second", "")
    }

    fn open(document: MemoryDocument) -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.register_document("memory://doc", document);
        block_on(engine.load("memory://doc")).unwrap();
        engine
    }

    #[test]
    fn test_from_text_parses_style_prefixes() {
        let doc = MemoryDocument::from_text("[Heading1] Title\nplain line\n[] empty brackets");

        assert_eq!(doc.paragraphs.len(), 3);
        assert_eq!(doc.paragraphs[0].style, StyleId::from("Heading1"));
        assert_eq!(doc.paragraphs[0].text, "Title");
        assert_eq!(doc.paragraphs[1].style, StyleId::default_style());
        assert_eq!(doc.paragraphs[2].text, "[] empty brackets");
        assert!(doc.styles.contains_key(&StyleId::from("Heading1")));
    }

    #[test]
    fn test_load_reads_plain_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::tests::create_test_file(&dir, "notes.txt", "[Title] Hello\nworld\n");
        let engine = MemoryEngine::new();

        block_on(engine.load(path.to_str().unwrap())).unwrap();

        assert!(engine.is_open());
        assert_eq!(engine.load_count(), 1);
        let first = engine.paragraph(ParagraphRef(1)).unwrap();
        assert_eq!(first.style_name, StyleId::from("Title"));
        assert_eq!(engine.paragraph(ParagraphRef(2)).unwrap().start, StepPosition(6));
    }

    #[test]
    fn test_load_unknown_url_fails() {
        let engine = MemoryEngine::new();
        let err = block_on(engine.load("memory://missing")).unwrap_err();
        assert!(matches!(err, EngineError::DocumentNotFound(url) if url == "memory://missing"));
        assert!(!engine.is_open());
    }

    #[test]
    fn test_enqueue_requires_open_document() {
        let engine = MemoryEngine::new();
        let err = engine
            .enqueue(vec![Operation::AddCursor {
                member_id: MemberId::new("m"),
            }])
            .unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded));
    }

    #[test]
    fn test_batches_apply_on_flush_in_order() {
        let engine = open(sample());
        let member = MemberId::new("m");
        engine
            .enqueue(vec![Operation::AddCursor {
                member_id: member.clone(),
            }])
            .unwrap();
        engine
            .enqueue(vec![Operation::MoveCursor {
                member_id: member.clone(),
                position: StepPosition(8),
                anchor: StepPosition(8),
                selection_kind: SelectionKind::Collapsed,
            }])
            .unwrap();
        assert_eq!(engine.pending_batches(), 2);
        assert_eq!(engine.cursor(&member), None);

        engine.flush();

        assert_eq!(engine.pending_batches(), 0);
        assert_eq!(engine.cursor(&member).unwrap().position, StepPosition(8));
    }

    #[test]
    fn test_apply_on_enqueue_skips_the_queue() {
        let engine = open(sample());
        let member = MemberId::new("m");
        engine.apply_on_enqueue(true);

        engine
            .enqueue(vec![Operation::AddCursor {
                member_id: member.clone(),
            }])
            .unwrap();

        assert_eq!(engine.pending_batches(), 0);
        assert!(engine.cursor(&member).is_some());
    }

    #[test]
    fn test_paragraph_geometry() {
        let engine = open(sample());

        // "Title" covers steps 0..=5, "First" 6..=11, "Second" 12..=18
        assert_eq!(engine.paragraph_at(StepPosition(5)).unwrap().paragraph, ParagraphRef(1));
        assert_eq!(engine.paragraph_at(StepPosition(6)).unwrap().paragraph, ParagraphRef(2));
        assert_eq!(engine.paragraph_at(StepPosition(18)).unwrap().paragraph, ParagraphRef(3));
        assert_eq!(engine.paragraph_at(StepPosition(19)), None);
        assert_eq!(engine.paragraph(ParagraphRef(3)).unwrap().start, StepPosition(12));
    }

    #[test]
    fn test_style_resolution() {
        let engine = open(sample());

        assert_eq!(
            engine.common_style_name(&StyleId::from("P1")),
            Some(StyleId::from("Body"))
        );
        assert_eq!(engine.common_style_name(&StyleId::default_style()), None);
        assert!(engine.is_style_used(&StyleId::from("Body")));
        assert!(!engine.has_paragraph_style(&StyleId::from("Missing")));

        let names: Vec<String> = engine
            .paragraph_styles()
            .into_iter()
            .map(|s| s.display_name)
            .collect();
        assert_eq!(names, vec!["Body Text", "Heading 1"]);
    }

    #[test]
    fn test_remove_style_reverts_paragraphs_and_notifies() {
        let engine = open(sample());
        let events = Rc::new(RefCell::new(Vec::new()));
        for signal in [EngineSignal::ParagraphChanged, EngineSignal::StyleDeleted] {
            let sink = Rc::clone(&events);
            engine
                .subscribe(signal, Box::new(move |e: &EngineEvent| sink.borrow_mut().push(e.clone())))
                .unwrap();
        }

        engine
            .enqueue(vec![Operation::RemoveStyle {
                member_id: MemberId::new("m"),
                style_id: StyleId::from("Heading1"),
                family: StyleFamily::Paragraph,
            }])
            .unwrap();
        engine.flush();

        assert_eq!(engine.document().paragraphs[0].style, StyleId::default_style());
        assert_eq!(
            *events.borrow(),
            vec![
                EngineEvent::ParagraphChanged {
                    paragraph: ParagraphRef(1),
                    member_id: MemberId::new("m"),
                },
                EngineEvent::StyleDeleted(StyleId::from("Heading1")),
            ]
        );
    }

    #[test]
    fn test_close_flushes_and_can_fail() {
        let engine = open(sample());
        engine
            .enqueue(vec![Operation::AddMember {
                member_id: MemberId::new("m"),
                properties: Default::default(),
            }])
            .unwrap();
        engine.fail_next_close("network down");

        let err = block_on(engine.close()).unwrap_err();
        assert!(matches!(err, EngineError::Rejected(reason) if reason == "network down"));
        assert!(engine.member(&MemberId::new("m")).is_some());

        block_on(engine.close()).unwrap();
        assert!(!engine.is_open());
        assert!(matches!(
            engine.enqueue(Vec::new()),
            Err(EngineError::Closed)
        ));
    }

    #[test]
    fn test_inherited_attributes_merge_parent_chain() {
        let doc = sample()
            .style_property("", "paragraph-properties", "margin", "0cm")
            .style_property("Body", "paragraph-properties", "margin", "1cm")
            .style_property("Body", "text-properties", "font-size", "12pt");
        let engine = open(doc);

        let merged = engine
            .inherited_style_attributes(&StyleId::from("P1"), true)
            .unwrap();
        assert_eq!(merged.properties["paragraph-properties"]["margin"], "1cm");
        assert_eq!(merged.properties["text-properties"]["font-size"], "12pt");
        assert_eq!(
            engine.inherited_style_attributes(&StyleId::from("Nope"), true),
            None
        );
    }
}
