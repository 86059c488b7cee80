use std::collections::BTreeMap;

use crate::signals::BusEvent;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EditorEventKind {
    UnknownError,
    DocumentModifiedChanged,
    MetadataChanged,
}

impl EditorEventKind {
    pub const ALL: [EditorEventKind; 3] = [
        EditorEventKind::UnknownError,
        EditorEventKind::DocumentModifiedChanged,
        EditorEventKind::MetadataChanged,
    ];
}

/// Events published by an editor controller.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// A failure that happened outside of any caller's control, e.g. during
    /// engine close
    UnknownError(String),
    DocumentModifiedChanged(bool),
    MetadataChanged {
        set_properties: BTreeMap<String, String>,
        removed_properties: Vec<String>,
    },
}

impl BusEvent for EditorEvent {
    type Kind = EditorEventKind;

    fn kind(&self) -> EditorEventKind {
        match self {
            EditorEvent::UnknownError(_) => EditorEventKind::UnknownError,
            EditorEvent::DocumentModifiedChanged(_) => EditorEventKind::DocumentModifiedChanged,
            EditorEvent::MetadataChanged { .. } => EditorEventKind::MetadataChanged,
        }
    }
}
