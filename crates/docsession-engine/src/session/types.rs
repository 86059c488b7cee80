use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::signals::BusEvent;

/// Participant identifier, unique within a document session.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier for a local participant.
    pub fn generate() -> Self {
        Self(format!("member-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Style identifier. The empty identifier names the default style.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StyleId(pub String);

impl StyleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The default style sentinel (`""`).
    pub fn default_style() -> Self {
        Self(String::new())
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StyleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque engine reference to a paragraph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParagraphRef(pub u64);

/// Opaque engine step position (cursor steps, not bytes).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepPosition(pub u64);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleFamily {
    #[default]
    Paragraph,
    Text,
    Table,
    TableColumn,
    TableCell,
    Graphic,
}

/// Properties announced for a member when it joins a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberProperties {
    pub display_name: String,
    pub color: String,
    pub image_ref: String,
}

impl Default for MemberProperties {
    fn default() -> Self {
        Self {
            display_name: "Unknown Author".to_string(),
            color: "black".to_string(),
            image_ref: "avatar-joe.png".to_string(),
        }
    }
}

impl MemberProperties {
    /// Replace empty fields with their defaults.
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.display_name.is_empty() {
            self.display_name = defaults.display_name;
        }
        if self.color.is_empty() {
            self.color = defaults.color;
        }
        if self.image_ref.is_empty() {
            self.image_ref = defaults.image_ref;
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub display_name: String,
    pub color: String,
    pub image_ref: String,
}

impl Member {
    pub fn new(member_id: MemberId, properties: MemberProperties) -> Self {
        Self {
            member_id,
            display_name: properties.display_name,
            color: properties.color,
            image_ref: properties.image_ref,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionKind {
    #[default]
    Collapsed,
    Range,
    Region,
}

/// A member's cursor as reported by the engine. Never cached by the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub member_id: MemberId,
    pub position: StepPosition,
    /// Other end of the selection; equal to `position` when collapsed
    pub anchor: StepPosition,
    pub selection_kind: SelectionKind,
}

impl Cursor {
    /// Selected step range, lowest position first.
    pub fn selected_range(&self) -> std::ops::Range<u64> {
        let (start, end) = if self.anchor <= self.position {
            (self.anchor.0, self.position.0)
        } else {
            (self.position.0, self.anchor.0)
        };
        start..end
    }
}

/// A paragraph as the engine sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParagraphInfo {
    pub paragraph: ParagraphRef,
    /// Style name literally attached to the paragraph, `""` when none
    pub style_name: StyleId,
    pub start: StepPosition,
}

/// Style contents: attributes set on the style itself plus grouped
/// property sets (`paragraph-properties`, `text-properties`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDefinition {
    pub attributes: BTreeMap<String, String>,
    pub properties: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleSummary {
    pub id: StyleId,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontDeclaration {
    pub name: String,
    pub family: String,
}

/// The paragraph holding the local cursor and its resolved common style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentParagraphState {
    pub paragraph: ParagraphRef,
    pub resolved_style: StyleId,
}

/// Kinds of events a session announces to its consumers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionSignal {
    MemberAdded,
    MemberUpdated,
    MemberRemoved,
    CursorAdded,
    CursorMoved,
    CursorRemoved,
    ParagraphChanged,
    StyleCreated,
    StyleDeleted,
    StyleModified,
    UndoStackChanged,
}

impl SessionSignal {
    pub const ALL: [SessionSignal; 11] = [
        SessionSignal::MemberAdded,
        SessionSignal::MemberUpdated,
        SessionSignal::MemberRemoved,
        SessionSignal::CursorAdded,
        SessionSignal::CursorMoved,
        SessionSignal::CursorRemoved,
        SessionSignal::ParagraphChanged,
        SessionSignal::StyleCreated,
        SessionSignal::StyleDeleted,
        SessionSignal::StyleModified,
        SessionSignal::UndoStackChanged,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParagraphChangeKind {
    /// The resolved common style of the tracked paragraph changed
    Style(StyleId),
    /// Paragraph content touching the local selection changed
    Content,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParagraphChange {
    pub paragraph: ParagraphRef,
    pub kind: ParagraphChangeKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    MemberAdded(MemberId),
    MemberUpdated(MemberId),
    MemberRemoved(MemberId),
    CursorAdded(MemberId),
    CursorMoved(MemberId),
    CursorRemoved(MemberId),
    ParagraphChanged(ParagraphChange),
    StyleCreated(StyleId),
    StyleDeleted(StyleId),
    StyleModified(StyleId),
    UndoStackChanged,
}

impl BusEvent for SessionEvent {
    type Kind = SessionSignal;

    fn kind(&self) -> SessionSignal {
        match self {
            SessionEvent::MemberAdded(_) => SessionSignal::MemberAdded,
            SessionEvent::MemberUpdated(_) => SessionSignal::MemberUpdated,
            SessionEvent::MemberRemoved(_) => SessionSignal::MemberRemoved,
            SessionEvent::CursorAdded(_) => SessionSignal::CursorAdded,
            SessionEvent::CursorMoved(_) => SessionSignal::CursorMoved,
            SessionEvent::CursorRemoved(_) => SessionSignal::CursorRemoved,
            SessionEvent::ParagraphChanged(_) => SessionSignal::ParagraphChanged,
            SessionEvent::StyleCreated(_) => SessionSignal::StyleCreated,
            SessionEvent::StyleDeleted(_) => SessionSignal::StyleDeleted,
            SessionEvent::StyleModified(_) => SessionSignal::StyleModified,
            SessionEvent::UndoStackChanged => SessionSignal::UndoStackChanged,
        }
    }
}
