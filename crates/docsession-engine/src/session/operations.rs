use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::session::types::{
    MemberId, MemberProperties, ParagraphRef, SelectionKind, StepPosition, StyleDefinition,
    StyleFamily, StyleId,
};

/// One edit intent submitted to the document engine. Every operation names
/// the member that issued it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    AddMember {
        member_id: MemberId,
        properties: MemberProperties,
    },
    RemoveMember {
        member_id: MemberId,
    },
    AddCursor {
        member_id: MemberId,
    },
    RemoveCursor {
        member_id: MemberId,
    },
    MoveCursor {
        member_id: MemberId,
        position: StepPosition,
        anchor: StepPosition,
        selection_kind: SelectionKind,
    },
    SetParagraphStyle {
        member_id: MemberId,
        paragraph: ParagraphRef,
        position: StepPosition,
        style_id: StyleId,
    },
    AddStyle {
        member_id: MemberId,
        style_id: StyleId,
        family: StyleFamily,
        properties: StyleDefinition,
    },
    RemoveStyle {
        member_id: MemberId,
        style_id: StyleId,
        family: StyleFamily,
    },
    UpdateParagraphStyle {
        member_id: MemberId,
        style_id: StyleId,
        set_properties: StyleDefinition,
        removed_properties: Vec<String>,
    },
    InsertStructuredContent {
        member_id: MemberId,
        position: StepPosition,
        content: StructuredContent,
    },
    UpdateMetadata {
        member_id: MemberId,
        set_properties: BTreeMap<String, String>,
        removed_properties: Vec<String>,
    },
}

impl Operation {
    pub fn member_id(&self) -> &MemberId {
        match self {
            Operation::AddMember { member_id, .. }
            | Operation::RemoveMember { member_id }
            | Operation::AddCursor { member_id }
            | Operation::RemoveCursor { member_id }
            | Operation::MoveCursor { member_id, .. }
            | Operation::SetParagraphStyle { member_id, .. }
            | Operation::AddStyle { member_id, .. }
            | Operation::RemoveStyle { member_id, .. }
            | Operation::UpdateParagraphStyle { member_id, .. }
            | Operation::InsertStructuredContent { member_id, .. }
            | Operation::UpdateMetadata { member_id, .. } => member_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddMember { .. } => "AddMember",
            Operation::RemoveMember { .. } => "RemoveMember",
            Operation::AddCursor { .. } => "AddCursor",
            Operation::RemoveCursor { .. } => "RemoveCursor",
            Operation::MoveCursor { .. } => "MoveCursor",
            Operation::SetParagraphStyle { .. } => "SetParagraphStyle",
            Operation::AddStyle { .. } => "AddStyle",
            Operation::RemoveStyle { .. } => "RemoveStyle",
            Operation::UpdateParagraphStyle { .. } => "UpdateParagraphStyle",
            Operation::InsertStructuredContent { .. } => "InsertStructuredContent",
            Operation::UpdateMetadata { .. } => "UpdateMetadata",
        }
    }

    /// Whether the operation changes document content and so lands on the
    /// undo stack. Member and cursor bookkeeping does not.
    pub fn is_document_edit(&self) -> bool {
        !matches!(
            self,
            Operation::AddMember { .. }
                | Operation::RemoveMember { .. }
                | Operation::AddCursor { .. }
                | Operation::RemoveCursor { .. }
                | Operation::MoveCursor { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableParams {
    pub rows: usize,
    pub columns: usize,
    pub table_style: Option<StyleId>,
    pub column_style: Option<StyleId>,
    /// Row-major cell styles; must match `rows` x `columns` when present
    pub cell_styles: Option<Vec<Vec<StyleId>>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    pub href: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StructuredContent {
    Table(TableParams),
    Image(ImageParams),
}

impl StructuredContent {
    pub fn kind(&self) -> &'static str {
        match self {
            StructuredContent::Table(_) => "table",
            StructuredContent::Image(_) => "image",
        }
    }

    /// Check the structural constraints of this content kind.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StructuredContent::Table(table) => {
                if table.rows == 0 || table.columns == 0 {
                    return Err(format!(
                        "table needs at least one row and one column, got {}x{}",
                        table.rows, table.columns
                    ));
                }
                if let Some(cells) = &table.cell_styles {
                    let shape_ok = cells.len() == table.rows
                        && cells.iter().all(|row| row.len() == table.columns);
                    if !shape_ok {
                        return Err(format!(
                            "cell style matrix does not match a {}x{} table",
                            table.rows, table.columns
                        ));
                    }
                }
                Ok(())
            }
            StructuredContent::Image(image) => {
                if image.href.trim().is_empty() {
                    return Err("image href is empty".to_string());
                }
                let size_ok = |v: f64| v.is_finite() && v > 0.0;
                if !size_ok(image.width) || !size_ok(image.height) {
                    return Err(format!(
                        "image size must be positive, got {}x{}",
                        image.width, image.height
                    ));
                }
                Ok(())
            }
        }
    }
}
