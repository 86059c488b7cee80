//! Contract of the external document engine.
//!
//! The engine owns the document, its members and their cursors. Sessions
//! never mutate engine state directly: edits go through
//! [`DocumentEngine::enqueue`] and state is read back through query methods.

use std::collections::BTreeMap;

use futures::future::LocalBoxFuture;

use crate::session::operations::Operation;
use crate::session::types::{
    Cursor, Member, MemberId, ParagraphInfo, ParagraphRef, StepPosition, StyleDefinition,
    StyleFamily, StyleId, StyleSummary,
};
use crate::signals::{BusEvent, SignalError, SubscriptionId};

pub type EngineFuture<T> = LocalBoxFuture<'static, Result<T, EngineError>>;

pub type EngineHandler = Box<dyn Fn(&EngineEvent)>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("no document is loaded")]
    NotLoaded,
    #[error("the document session is closed")]
    Closed,
    #[error("operation rejected: {0}")]
    Rejected(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Kinds of events the engine publishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EngineSignal {
    MemberAdded,
    MemberUpdated,
    MemberRemoved,
    CursorAdded,
    CursorMoved,
    CursorRemoved,
    ParagraphChanged,
    StyleCreated,
    StyleDeleted,
    ParagraphStyleModified,
    UndoStackChanged,
    MetadataChanged,
}

impl EngineSignal {
    pub const ALL: [EngineSignal; 12] = [
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
        EngineSignal::MetadataChanged,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    MemberAdded(MemberId),
    MemberUpdated(MemberId),
    MemberRemoved(MemberId),
    CursorAdded(MemberId),
    CursorMoved(MemberId),
    CursorRemoved(MemberId),
    ParagraphChanged {
        paragraph: ParagraphRef,
        member_id: MemberId,
    },
    StyleCreated(StyleId),
    StyleDeleted(StyleId),
    ParagraphStyleModified(StyleId),
    UndoStackChanged,
    MetadataChanged {
        set_properties: BTreeMap<String, String>,
        removed_properties: Vec<String>,
    },
}

impl BusEvent for EngineEvent {
    type Kind = EngineSignal;

    fn kind(&self) -> EngineSignal {
        match self {
            EngineEvent::MemberAdded(_) => EngineSignal::MemberAdded,
            EngineEvent::MemberUpdated(_) => EngineSignal::MemberUpdated,
            EngineEvent::MemberRemoved(_) => EngineSignal::MemberRemoved,
            EngineEvent::CursorAdded(_) => EngineSignal::CursorAdded,
            EngineEvent::CursorMoved(_) => EngineSignal::CursorMoved,
            EngineEvent::CursorRemoved(_) => EngineSignal::CursorRemoved,
            EngineEvent::ParagraphChanged { .. } => EngineSignal::ParagraphChanged,
            EngineEvent::StyleCreated(_) => EngineSignal::StyleCreated,
            EngineEvent::StyleDeleted(_) => EngineSignal::StyleDeleted,
            EngineEvent::ParagraphStyleModified(_) => EngineSignal::ParagraphStyleModified,
            EngineEvent::UndoStackChanged => EngineSignal::UndoStackChanged,
            EngineEvent::MetadataChanged { .. } => EngineSignal::MetadataChanged,
        }
    }
}

pub trait DocumentEngine {
    /// Start loading `url`; resolves once the document is ready for editing.
    fn load(&self, url: &str) -> EngineFuture<()>;

    /// Flush outstanding work and close the document; resolves on confirmation.
    fn close(&self) -> EngineFuture<()>;

    /// Submit one atomic batch. Batches are applied in submission order.
    fn enqueue(&self, batch: Vec<Operation>) -> Result<(), EngineError>;

    fn subscribe(
        &self,
        signal: EngineSignal,
        handler: EngineHandler,
    ) -> Result<SubscriptionId, EngineError>;

    fn unsubscribe(&self, signal: EngineSignal, id: SubscriptionId);

    fn member(&self, member_id: &MemberId) -> Option<Member>;

    fn cursor(&self, member_id: &MemberId) -> Option<Cursor>;

    fn paragraph(&self, paragraph: ParagraphRef) -> Option<ParagraphInfo>;

    /// The paragraph containing `position`.
    fn paragraph_at(&self, position: StepPosition) -> Option<ParagraphInfo>;

    /// Paragraphs intersecting the member's current selection, in document order.
    fn paragraphs_in_selection(&self, member_id: &MemberId) -> Vec<ParagraphInfo>;

    fn selection_intersects(&self, member_id: &MemberId, paragraph: ParagraphRef) -> bool;

    /// First common (non-automatic) style in the parent chain of `style`,
    /// or `None` when it resolves to the default style.
    fn common_style_name(&self, style: &StyleId) -> Option<StyleId>;

    fn has_paragraph_style(&self, style: &StyleId) -> bool;

    fn paragraph_styles(&self) -> Vec<StyleSummary>;

    /// Attributes and properties set directly on the style. `""` addresses
    /// the default style of the family.
    fn style_definition(&self, style: &StyleId, family: StyleFamily) -> Option<StyleDefinition>;

    /// Attributes resolved through the parent chain.
    fn inherited_style_attributes(
        &self,
        style: &StyleId,
        include_default: bool,
    ) -> Option<StyleDefinition>;

    fn is_style_used(&self, style: &StyleId) -> bool;

    /// Declared font names mapped to their font family.
    fn font_map(&self) -> BTreeMap<String, String>;

    fn metadata(&self, property: &str) -> Option<String>;
}
