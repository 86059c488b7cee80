use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use crate::fonts;
use crate::identifiers::{self, IdentifierError};
use crate::session::components::{InputController, SessionComponents};
use crate::session::engine::{DocumentEngine, EngineError, EngineEvent, EngineSignal};
use crate::session::operations::{Operation, StructuredContent, TableParams};
use crate::session::style_tracker::StyleTracker;
use crate::session::types::{
    Cursor, FontDeclaration, Member, MemberId, MemberProperties, ParagraphChange,
    ParagraphChangeKind, ParagraphInfo, ParagraphRef, SelectionKind, SessionEvent, SessionSignal,
    StepPosition, StyleDefinition, StyleFamily, StyleId, StyleSummary,
};
use crate::signals::{SignalBus, SignalError, SubscriptionId};
use crate::teardown::{TeardownCoordinator, TeardownError, TeardownStep};

/// Attributes that identify a style and are never copied by `clone_style`.
const IDENTITY_ATTRIBUTES: [&str; 3] = ["style:name", "style:family", "style:display-name"];

const DISPLAY_NAME: &str = "style:display-name";

/// Engine signals the session relays or reacts to.
const RELAYED_SIGNALS: [EngineSignal; 11] = [
    EngineSignal::MemberAdded,
    EngineSignal::MemberUpdated,
    EngineSignal::MemberRemoved,
    EngineSignal::CursorAdded,
    EngineSignal::CursorMoved,
    EngineSignal::CursorRemoved,
    EngineSignal::ParagraphChanged,
    EngineSignal::StyleCreated,
    EngineSignal::StyleDeleted,
    EngineSignal::ParagraphStyleModified,
    EngineSignal::UndoStackChanged,
];

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid {kind} parameters: {reason}")]
    InvalidParameters { kind: &'static str, reason: String },
    #[error("unknown style: {0:?}")]
    UnknownStyle(StyleId),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Session state shared with engine event handlers.
///
/// Handlers hold a `Weak` reference so a torn down session never receives
/// events, even if unsubscribing from the engine was skipped.
struct SessionCore {
    engine: Rc<dyn DocumentEngine>,
    local_member: MemberId,
    /// Synthesized local member id, appended to cloned style ids
    member_salt: String,
    bus: Rc<SignalBus<SessionEvent>>,
    tracker: StyleTracker,
    /// Style ids handed out by `clone_style` that the engine has not
    /// confirmed yet
    reserved_styles: RefCell<BTreeSet<StyleId>>,
}

impl SessionCore {
    fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.bus.emit(&event) {
            log::error!("session could not relay {event:?}: {err}");
        }
    }

    fn is_local(&self, member_id: &MemberId) -> bool {
        *member_id == self.local_member
    }

    fn observe_paragraph(&self, info: ParagraphInfo) {
        let resolved = self
            .engine
            .common_style_name(&info.style_name)
            .unwrap_or_default();
        if let Err(err) = self.tracker.observe(info.paragraph, resolved) {
            log::error!("style tracker could not emit: {err}");
        }
    }

    fn track_local_cursor(&self) {
        let Some(cursor) = self.engine.cursor(&self.local_member) else {
            return;
        };
        match self.engine.paragraph_at(cursor.position) {
            Some(info) => self.observe_paragraph(info),
            None => log::warn!(
                "local cursor at {:?} is outside every paragraph",
                cursor.position
            ),
        }
    }

    fn recheck_tracked_paragraph(&self) {
        if let Some(info) = self
            .tracker
            .current_paragraph()
            .and_then(|paragraph| self.engine.paragraph(paragraph))
        {
            self.observe_paragraph(info);
        }
    }

    fn release_reservation(&self, style: &StyleId) {
        self.reserved_styles.borrow_mut().remove(style);
    }

    fn on_engine_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::MemberAdded(member) => {
                self.emit(SessionEvent::MemberAdded(member.clone()))
            }
            EngineEvent::MemberUpdated(member) => {
                self.emit(SessionEvent::MemberUpdated(member.clone()))
            }
            EngineEvent::MemberRemoved(member) => {
                if self.is_local(member) {
                    self.tracker.reset();
                }
                self.emit(SessionEvent::MemberRemoved(member.clone()));
            }
            EngineEvent::CursorAdded(member) => {
                self.emit(SessionEvent::CursorAdded(member.clone()));
                if self.is_local(member) {
                    self.track_local_cursor();
                }
            }
            EngineEvent::CursorMoved(member) => {
                self.emit(SessionEvent::CursorMoved(member.clone()));
                if self.is_local(member) {
                    self.track_local_cursor();
                }
            }
            EngineEvent::CursorRemoved(member) => {
                if self.is_local(member) {
                    self.tracker.reset();
                }
                self.emit(SessionEvent::CursorRemoved(member.clone()));
            }
            EngineEvent::ParagraphChanged { paragraph, .. } => {
                let paragraph = *paragraph;
                let relevant = self
                    .engine
                    .selection_intersects(&self.local_member, paragraph)
                    || self.tracker.current_paragraph() == Some(paragraph);
                if relevant {
                    self.emit(SessionEvent::ParagraphChanged(ParagraphChange {
                        paragraph,
                        kind: ParagraphChangeKind::Content,
                    }));
                    self.recheck_tracked_paragraph();
                }
            }
            EngineEvent::StyleCreated(style) => {
                self.release_reservation(style);
                self.emit(SessionEvent::StyleCreated(style.clone()));
            }
            EngineEvent::StyleDeleted(style) => {
                self.release_reservation(style);
                self.emit(SessionEvent::StyleDeleted(style.clone()));
            }
            EngineEvent::ParagraphStyleModified(style) => {
                self.emit(SessionEvent::StyleModified(style.clone()))
            }
            EngineEvent::UndoStackChanged => self.emit(SessionEvent::UndoStackChanged),
            EngineEvent::MetadataChanged { .. } => {}
        }
    }
}

/// One participant's live editing session.
///
/// Translates editing intents into operation batches for the engine and
/// relays engine events to subscribers of its own [`SignalBus`].
pub struct SessionFacade {
    core: Rc<SessionCore>,
    components: SessionComponents,
    engine_subscriptions: Vec<(EngineSignal, SubscriptionId)>,
    available_fonts: Vec<String>,
}

impl SessionFacade {
    /// Create a session for `local_member` on an engine with a loaded
    /// document. `fonts_css` is an optional stylesheet of web fonts.
    pub fn new(
        engine: Rc<dyn DocumentEngine>,
        local_member: MemberId,
        components: SessionComponents,
        fonts_css: Option<&str>,
    ) -> Result<Self, SessionError> {
        let bus = Rc::new(SignalBus::new(SessionSignal::ALL));
        let core = Rc::new(SessionCore {
            member_salt: identifiers::synthesize(local_member.as_str()),
            engine: Rc::clone(&engine),
            local_member,
            tracker: StyleTracker::new(Rc::clone(&bus)),
            bus,
            reserved_styles: RefCell::new(BTreeSet::new()),
        });

        let mut engine_subscriptions = Vec::with_capacity(RELAYED_SIGNALS.len());
        for signal in RELAYED_SIGNALS {
            let weak: Weak<SessionCore> = Rc::downgrade(&core);
            let subscribed = engine.subscribe(
                signal,
                Box::new(move |event: &EngineEvent| {
                    if let Some(core) = weak.upgrade() {
                        core.on_engine_event(event);
                    }
                }),
            );
            match subscribed {
                Ok(id) => engine_subscriptions.push((signal, id)),
                Err(err) => {
                    for (signal, id) in engine_subscriptions {
                        engine.unsubscribe(signal, id);
                    }
                    return Err(err.into());
                }
            }
        }

        log::debug!("session created for member {}", core.local_member);
        Ok(Self {
            core,
            components,
            engine_subscriptions,
            available_fonts: fonts_css.map(fonts::available_fonts).unwrap_or_default(),
        })
    }

    pub fn subscribe<F>(
        &self,
        signal: SessionSignal,
        handler: F,
    ) -> Result<SubscriptionId, SessionError>
    where
        F: Fn(&SessionEvent) + 'static,
    {
        Ok(self.core.bus.subscribe(signal, handler)?)
    }

    pub fn unsubscribe(&self, signal: SessionSignal, id: SubscriptionId) {
        self.core.bus.unsubscribe(signal, id);
    }

    pub fn local_member_id(&self) -> &MemberId {
        &self.core.local_member
    }

    pub fn member(&self, member_id: &MemberId) -> Option<Member> {
        self.core.engine.member(member_id)
    }

    /// The local member's cursor, read through from the engine.
    pub fn cursor(&self) -> Option<Cursor> {
        self.core.engine.cursor(&self.core.local_member)
    }

    pub fn cursor_position(&self) -> Option<StepPosition> {
        self.cursor().map(|cursor| cursor.position)
    }

    pub fn current_paragraph(&self) -> Option<ParagraphRef> {
        self.core.tracker.current_paragraph()
    }

    /// Common style of the paragraph under the local cursor; `""` is the
    /// default style, `None` means no paragraph is tracked.
    pub fn current_paragraph_style(&self) -> Option<StyleId> {
        self.core.tracker.current().map(|state| state.resolved_style)
    }

    pub fn available_paragraph_styles(&self) -> Vec<StyleSummary> {
        self.core.engine.paragraph_styles()
    }

    /// Effective attributes of a style including everything it inherits.
    pub fn paragraph_style_attributes(&self, style: &StyleId) -> Option<StyleDefinition> {
        self.core.engine.inherited_style_attributes(style, true)
    }

    pub fn is_style_used(&self, style: &StyleId) -> bool {
        self.core.engine.is_style_used(style)
    }

    pub fn declared_fonts(&self) -> Vec<FontDeclaration> {
        fonts::declared_fonts(&self.core.engine.font_map())
    }

    pub fn available_fonts(&self) -> &[String] {
        &self.available_fonts
    }

    pub fn input(&self) -> &dyn InputController {
        self.components.input.as_ref()
    }

    pub fn input_mut(&mut self) -> &mut dyn InputController {
        self.components.input.as_mut()
    }

    fn submit(&self, batch: Vec<Operation>) -> Result<(), SessionError> {
        log::debug!(
            "submitting batch of {} operation(s): {:?}",
            batch.len(),
            batch.iter().map(Operation::name).collect::<Vec<_>>()
        );
        self.core.engine.enqueue(batch)?;
        Ok(())
    }

    /// Announce new details for the local member; the engine reports the
    /// change as a member update.
    pub fn update_local_member(&self, properties: MemberProperties) -> Result<(), SessionError> {
        self.submit(vec![Operation::AddMember {
            member_id: self.core.local_member.clone(),
            properties,
        }])
    }

    /// Move the local cursor, selecting from `anchor` to `position`.
    pub fn move_cursor(
        &self,
        position: StepPosition,
        anchor: StepPosition,
    ) -> Result<(), SessionError> {
        let selection_kind = if position == anchor {
            SelectionKind::Collapsed
        } else {
            SelectionKind::Range
        };
        self.submit(vec![Operation::MoveCursor {
            member_id: self.core.local_member.clone(),
            position,
            anchor,
            selection_kind,
        }])
    }

    /// Apply `style` to every selected paragraph that does not already carry
    /// it, as one batch. Returns the number of operations submitted; zero
    /// means nothing was sent.
    pub fn set_paragraph_style(&self, style: &StyleId) -> Result<usize, SessionError> {
        let batch: Vec<Operation> = self
            .core
            .engine
            .paragraphs_in_selection(&self.core.local_member)
            .into_iter()
            .filter(|info| info.style_name != *style)
            .map(|info| Operation::SetParagraphStyle {
                member_id: self.core.local_member.clone(),
                paragraph: info.paragraph,
                position: info.start,
                style_id: style.clone(),
            })
            .collect();

        if batch.is_empty() {
            log::debug!("selection already uses style {style:?}");
            return Ok(0);
        }
        let count = batch.len();
        self.submit(batch)?;
        Ok(count)
    }

    pub fn update_paragraph_style(
        &self,
        style: &StyleId,
        set_properties: StyleDefinition,
        removed_properties: Vec<String>,
    ) -> Result<(), SessionError> {
        self.submit(vec![Operation::UpdateParagraphStyle {
            member_id: self.core.local_member.clone(),
            style_id: style.clone(),
            set_properties,
            removed_properties,
        }])
    }

    /// Submit a copy of `source` under a fresh id derived from
    /// `display_name`. The id is reserved until the engine reports it.
    pub fn clone_style(
        &self,
        source: &StyleId,
        display_name: &str,
    ) -> Result<StyleId, SessionError> {
        let engine = &self.core.engine;
        let source_definition = engine
            .style_definition(source, StyleFamily::Paragraph)
            .ok_or_else(|| SessionError::UnknownStyle(source.clone()))?;

        let new_id = {
            let reserved = self.core.reserved_styles.borrow();
            let taken = |id: &str| {
                let id = StyleId::from(id);
                reserved.contains(&id) || engine.has_paragraph_style(&id)
            };
            StyleId::new(identifiers::unique_within(
                &taken,
                &identifiers::synthesize(display_name),
                &self.core.member_salt,
            )?)
        };

        let mut attributes: BTreeMap<String, String> = source_definition
            .attributes
            .into_iter()
            .filter(|(key, _)| !IDENTITY_ATTRIBUTES.iter().any(|identity| key == identity))
            .collect();
        attributes.insert(DISPLAY_NAME.to_string(), display_name.to_string());

        // Reserved before submission: an engine may confirm within `enqueue`.
        self.core.reserved_styles.borrow_mut().insert(new_id.clone());
        let submitted = self.submit(vec![Operation::AddStyle {
            member_id: self.core.local_member.clone(),
            style_id: new_id.clone(),
            family: StyleFamily::Paragraph,
            properties: StyleDefinition {
                attributes,
                properties: source_definition.properties,
            },
        }]);
        if let Err(err) = submitted {
            self.core.release_reservation(&new_id);
            return Err(err);
        }
        Ok(new_id)
    }

    /// Submit removal of `style`. Whether it may be removed is up to the
    /// engine.
    pub fn delete_style(&self, style: &StyleId) -> Result<(), SessionError> {
        self.submit(vec![Operation::RemoveStyle {
            member_id: self.core.local_member.clone(),
            style_id: style.clone(),
            family: StyleFamily::Paragraph,
        }])
    }

    /// Insert a table or image at the local cursor.
    pub fn insert_structured_content(&self, content: StructuredContent) -> Result<(), SessionError> {
        content
            .validate()
            .map_err(|reason| SessionError::InvalidParameters {
                kind: content.kind(),
                reason,
            })?;
        let position = self
            .cursor_position()
            .ok_or_else(|| SessionError::InvalidParameters {
                kind: content.kind(),
                reason: "there is no local cursor to insert at".to_string(),
            })?;

        self.submit(vec![Operation::InsertStructuredContent {
            member_id: self.core.local_member.clone(),
            position,
            content,
        }])
    }

    pub fn insert_table(
        &self,
        rows: usize,
        columns: usize,
        table_style: Option<StyleId>,
        column_style: Option<StyleId>,
        cell_styles: Option<Vec<Vec<StyleId>>>,
    ) -> Result<(), SessionError> {
        self.insert_structured_content(StructuredContent::Table(TableParams {
            rows,
            columns,
            table_style,
            column_style,
            cell_styles,
        }))
    }

    pub fn undo(&self) -> bool {
        self.components
            .input
            .undo_manager()
            .is_some_and(|manager| manager.undo())
    }

    pub fn redo(&self) -> bool {
        self.components
            .input
            .undo_manager()
            .is_some_and(|manager| manager.redo())
    }

    /// Tear down the session's components in order, then drop every signal
    /// subscription. The first failing step stops the sequence.
    pub async fn destroy(self) -> Result<(), TeardownError> {
        let SessionFacade {
            core,
            components,
            engine_subscriptions,
            ..
        } = self;
        let SessionComponents {
            view,
            caret_manager,
            selection_view_manager,
            input,
            link_tooltip_view,
            field_view,
        } = components;

        log::debug!("destroying session of member {}", core.local_member);
        TeardownCoordinator::new()
            .step(TeardownStep::component("session view", view))
            .step(TeardownStep::component("caret manager", caret_manager))
            .step(TeardownStep::component(
                "selection view manager",
                selection_view_manager,
            ))
            .step(TeardownStep::new("input controller", move || input.teardown()))
            .step(TeardownStep::component("link tooltip view", link_tooltip_view))
            .step(TeardownStep::component("field view", field_view))
            .step(TeardownStep::sync("session signals", move || {
                for (signal, id) in engine_subscriptions {
                    core.engine.unsubscribe(signal, id);
                }
                core.bus.clear();
                core.tracker.reset();
                core.reserved_styles.borrow_mut().clear();
                Ok(())
            }))
            .destroy_all()
            .await
    }
}
