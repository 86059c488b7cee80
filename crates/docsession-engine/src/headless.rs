//! Frontend without a user interface.
//!
//! Used by the CLI and by tests: components only log their teardown, the
//! input controller manages the local cursor through the engine, and the
//! undo manager keeps a modified flag without history.

use std::cell::Cell;
use std::rc::Rc;

use futures::FutureExt;

use crate::controller::{EditorChrome, Toolbar};
use crate::session::{
    DocumentEngine, EngineError, EngineEvent, EngineSignal, Frontend, InputController, MemberId,
    Operation, SessionComponents, SessionContext, UndoManager,
};
use crate::signals::{BusEvent, SignalBus, SignalError, SubscriptionId};
use crate::teardown::{Teardown, TeardownFuture};

pub struct HeadlessComponent {
    name: String,
}

impl HeadlessComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn boxed(name: impl Into<String>) -> Box<dyn Teardown> {
        Box::new(Self::new(name))
    }
}

impl Teardown for HeadlessComponent {
    fn teardown(self: Box<Self>) -> TeardownFuture {
        log::debug!("{} torn down", self.name);
        futures::future::ready(Ok(())).boxed_local()
    }
}

#[derive(Debug, Default)]
pub struct HeadlessToolbar {
    attached: bool,
}

impl HeadlessToolbar {
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Toolbar for HeadlessToolbar {
    fn session_attached(&mut self, attached: bool) {
        log::debug!("toolbar session attached: {attached}");
        self.attached = attached;
    }
}

impl Teardown for HeadlessToolbar {
    fn teardown(self: Box<Self>) -> TeardownFuture {
        log::debug!("toolbar torn down");
        futures::future::ready(Ok(())).boxed_local()
    }
}

/// Chrome made of headless components.
pub fn headless_chrome() -> EditorChrome {
    EditorChrome {
        zoom_helper: HeadlessComponent::boxed("zoom helper"),
        toolbar: Box::new(HeadlessToolbar::default()),
        canvas: HeadlessComponent::boxed("canvas"),
        container: HeadlessComponent::boxed("container"),
    }
}

#[derive(Clone, Copy, Debug)]
struct ModifiedChanged(bool);

impl BusEvent for ModifiedChanged {
    type Kind = ();

    fn kind(&self) {}
}

/// Tracks the modified flag only; there is nothing to undo.
pub struct TrivialUndoManager {
    modified: Cell<bool>,
    bus: SignalBus<ModifiedChanged>,
}

impl Default for TrivialUndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TrivialUndoManager {
    pub fn new() -> Self {
        Self {
            modified: Cell::new(false),
            bus: SignalBus::new([()]),
        }
    }
}

impl UndoManager for TrivialUndoManager {
    fn is_document_modified(&self) -> bool {
        self.modified.get()
    }

    fn set_document_modified(&self, modified: bool) {
        if self.modified.replace(modified) == modified {
            return;
        }
        if let Err(err) = self.bus.emit(&ModifiedChanged(modified)) {
            log::error!("could not announce modified flag change: {err}");
        }
    }

    fn subscribe_modified_changed(
        &self,
        handler: Box<dyn Fn(bool)>,
    ) -> Result<SubscriptionId, SignalError> {
        self.bus
            .subscribe((), move |event: &ModifiedChanged| handler(event.0))
    }

    fn unsubscribe_modified_changed(&self, id: SubscriptionId) {
        self.bus.unsubscribe((), id);
    }

    fn undo(&self) -> bool {
        false
    }

    fn redo(&self) -> bool {
        false
    }

    fn has_undo_states(&self) -> bool {
        false
    }

    fn has_redo_states(&self) -> bool {
        false
    }
}

/// Input controller that only knows about the local cursor.
pub struct HeadlessInput {
    engine: Rc<dyn DocumentEngine>,
    member_id: MemberId,
    editing: bool,
    undo_manager: Option<Rc<dyn UndoManager>>,
    undo_subscription: Option<SubscriptionId>,
}

impl HeadlessInput {
    pub fn new(engine: Rc<dyn DocumentEngine>, member_id: MemberId) -> Self {
        Self {
            engine,
            member_id,
            editing: false,
            undo_manager: None,
            undo_subscription: None,
        }
    }

    fn drop_undo_subscription(&mut self) {
        if let Some(id) = self.undo_subscription.take() {
            self.engine.unsubscribe(EngineSignal::UndoStackChanged, id);
        }
    }
}

impl InputController for HeadlessInput {
    fn insert_local_cursor(&mut self) -> Result<(), EngineError> {
        self.engine.enqueue(vec![Operation::AddCursor {
            member_id: self.member_id.clone(),
        }])
    }

    fn remove_local_cursor(&mut self) -> Result<(), EngineError> {
        self.engine.enqueue(vec![Operation::RemoveCursor {
            member_id: self.member_id.clone(),
        }])
    }

    fn start_editing(&mut self) {
        self.editing = true;
    }

    fn end_editing(&mut self) {
        self.editing = false;
    }

    fn is_editing(&self) -> bool {
        self.editing
    }

    /// Any undo stack change marks the document as modified.
    fn set_undo_manager(&mut self, undo_manager: Rc<dyn UndoManager>) -> Result<(), EngineError> {
        self.drop_undo_subscription();
        let weak = Rc::downgrade(&undo_manager);
        let id = self.engine.subscribe(
            EngineSignal::UndoStackChanged,
            Box::new(move |_: &EngineEvent| {
                if let Some(manager) = weak.upgrade() {
                    manager.set_document_modified(true);
                }
            }),
        )?;
        self.undo_subscription = Some(id);
        self.undo_manager = Some(undo_manager);
        Ok(())
    }

    fn undo_manager(&self) -> Option<Rc<dyn UndoManager>> {
        self.undo_manager.clone()
    }
}

impl Teardown for HeadlessInput {
    fn teardown(mut self: Box<Self>) -> TeardownFuture {
        self.drop_undo_subscription();
        self.editing = false;
        log::debug!("input controller of {} torn down", self.member_id);
        futures::future::ready(Ok(())).boxed_local()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessFrontend;

impl Frontend for HeadlessFrontend {
    fn create_session_components(&self, context: &SessionContext) -> SessionComponents {
        SessionComponents {
            view: HeadlessComponent::boxed("session view"),
            caret_manager: HeadlessComponent::boxed("caret manager"),
            selection_view_manager: HeadlessComponent::boxed("selection view manager"),
            input: Box::new(HeadlessInput::new(
                Rc::clone(&context.engine),
                context.local_member.clone(),
            )),
            link_tooltip_view: HeadlessComponent::boxed("link tooltip view"),
            field_view: HeadlessComponent::boxed("field view"),
        }
    }

    fn create_undo_manager(&self, _context: &SessionContext) -> Rc<dyn UndoManager> {
        Rc::new(TrivialUndoManager::new())
    }
}
