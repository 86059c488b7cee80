//! UI-side collaborators owned by a session.
//!
//! The session does not render anything itself. Views, caret and selection
//! managers and the input controller are supplied by a frontend; the session
//! only drives their lifecycle and tears them down in order.

use std::rc::Rc;

use crate::options::FeatureSet;
use crate::session::engine::{DocumentEngine, EngineError};
use crate::session::types::MemberId;
use crate::signals::{SignalError, SubscriptionId};
use crate::teardown::Teardown;

/// Undo history and the "document modified" flag.
pub trait UndoManager {
    fn is_document_modified(&self) -> bool;

    fn set_document_modified(&self, modified: bool);

    fn subscribe_modified_changed(
        &self,
        handler: Box<dyn Fn(bool)>,
    ) -> Result<SubscriptionId, SignalError>;

    fn unsubscribe_modified_changed(&self, id: SubscriptionId);

    /// Returns whether a step was undone.
    fn undo(&self) -> bool;

    /// Returns whether a step was redone.
    fn redo(&self) -> bool;

    fn has_undo_states(&self) -> bool;

    fn has_redo_states(&self) -> bool;
}

/// Translates local input into engine operations.
pub trait InputController: Teardown {
    fn insert_local_cursor(&mut self) -> Result<(), EngineError>;

    fn remove_local_cursor(&mut self) -> Result<(), EngineError>;

    fn start_editing(&mut self);

    fn end_editing(&mut self);

    fn is_editing(&self) -> bool;

    fn set_undo_manager(&mut self, undo_manager: Rc<dyn UndoManager>) -> Result<(), EngineError>;

    fn undo_manager(&self) -> Option<Rc<dyn UndoManager>>;
}

/// Everything a frontend needs to build the components of one session.
#[derive(Clone)]
pub struct SessionContext {
    pub engine: Rc<dyn DocumentEngine>,
    pub local_member: MemberId,
    pub features: FeatureSet,
}

/// Components torn down by the session, listed in teardown order.
pub struct SessionComponents {
    pub view: Box<dyn Teardown>,
    pub caret_manager: Box<dyn Teardown>,
    pub selection_view_manager: Box<dyn Teardown>,
    pub input: Box<dyn InputController>,
    pub link_tooltip_view: Box<dyn Teardown>,
    pub field_view: Box<dyn Teardown>,
}

/// Builds per-session components. One frontend serves every session of an
/// editor controller.
pub trait Frontend {
    fn create_session_components(&self, context: &SessionContext) -> SessionComponents;

    fn create_undo_manager(&self, context: &SessionContext) -> Rc<dyn UndoManager>;
}
