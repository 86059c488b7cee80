//! Editor lifecycle.
//!
//! An [`EditorController`] owns at most one [`SessionFacade`] at a time and
//! moves through the states of [`LifecycleState`]. Every public operation
//! checks its transition against [`LifecycleState::next`] before touching
//! the engine, so out-of-order calls fail with
//! [`ControllerError::IllegalTransition`] and leave everything as it was.
//!
//! The async operations complete at the points where callers would
//! otherwise be called back: `open_document_from_url` once the document is
//! editable, `close_document` once the session is gone and `destroy` once
//! the top-level chrome is torn down.

pub mod events;
pub mod lifecycle;

use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::options::EditorOptions;
use crate::session::{
    DocumentEngine, EngineError, EngineEvent, EngineSignal, Frontend, MemberId,
    MemberProperties, Operation, SessionContext, SessionError, SessionFacade, UndoManager,
};
use crate::signals::{SignalBus, SignalError, SubscriptionId};
use crate::teardown::{Teardown, TeardownCoordinator, TeardownError, TeardownStep};

pub use events::{EditorEvent, EditorEventKind};
pub use lifecycle::{LifecycleAction, LifecycleState};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("cannot {action:?} while {from}")]
    IllegalTransition {
        from: LifecycleState,
        action: LifecycleAction,
    },
    #[error("no document session is open")]
    NoSession,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Teardown(#[from] TeardownError),
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// The editor toolbar follows whether a session is attached.
pub trait Toolbar: Teardown {
    fn session_attached(&mut self, attached: bool);
}

/// Top-level resources that outlive individual sessions, torn down in
/// field order by [`EditorController::destroy`].
pub struct EditorChrome {
    pub zoom_helper: Box<dyn Teardown>,
    pub toolbar: Box<dyn Toolbar>,
    pub canvas: Box<dyn Teardown>,
    pub container: Box<dyn Teardown>,
}

fn relay(events: &Weak<SignalBus<EditorEvent>>, event: EditorEvent) {
    let Some(events) = events.upgrade() else {
        return;
    };
    if let Err(err) = events.emit(&event) {
        log::error!("editor could not relay {event:?}: {err}");
    }
}

pub struct EditorController {
    engine: Rc<dyn DocumentEngine>,
    frontend: Box<dyn Frontend>,
    chrome: Option<EditorChrome>,
    options: EditorOptions,
    member_id: MemberId,
    user: MemberProperties,
    fonts_css: Option<String>,
    state: LifecycleState,
    session: Option<SessionFacade>,
    undo_manager: Option<Rc<dyn UndoManager>>,
    modified_subscription: Option<SubscriptionId>,
    metadata_subscription: Option<SubscriptionId>,
    events: Rc<SignalBus<EditorEvent>>,
}

impl EditorController {
    pub fn new(
        engine: Rc<dyn DocumentEngine>,
        frontend: Box<dyn Frontend>,
        chrome: EditorChrome,
        options: EditorOptions,
        member_id: MemberId,
        user: MemberProperties,
    ) -> Self {
        Self {
            engine,
            frontend,
            chrome: Some(chrome),
            options,
            member_id,
            user: user.with_defaults(),
            fonts_css: None,
            state: LifecycleState::default(),
            session: None,
            undo_manager: None,
            modified_subscription: None,
            metadata_subscription: None,
            events: Rc::new(SignalBus::new(EditorEventKind::ALL)),
        }
    }

    /// Stylesheet whose font families sessions offer as available fonts.
    pub fn with_fonts_css(mut self, css: Option<String>) -> Self {
        self.fonts_css = css;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    fn transition(&mut self, action: LifecycleAction) -> Result<(), ControllerError> {
        let next = self.state.next(action)?;
        log::debug!("editor {} -> {next} on {action:?}", self.state);
        self.state = next;
        Ok(())
    }

    pub fn subscribe<F>(
        &self,
        kind: EditorEventKind,
        handler: F,
    ) -> Result<SubscriptionId, ControllerError>
    where
        F: Fn(&EditorEvent) + 'static,
    {
        Ok(self.events.subscribe(kind, handler)?)
    }

    pub fn unsubscribe(&self, kind: EditorEventKind, id: SubscriptionId) {
        self.events.unsubscribe(kind, id);
    }

    fn report(&self, err: &dyn std::fmt::Display) {
        relay(
            &Rc::downgrade(&self.events),
            EditorEvent::UnknownError(err.to_string()),
        );
    }

    /// The open session. Only available while editing.
    pub fn session(&self) -> Result<&SessionFacade, ControllerError> {
        match (self.state, &self.session) {
            (LifecycleState::Editing, Some(session)) => Ok(session),
            _ => Err(ControllerError::NoSession),
        }
    }

    pub fn session_mut(&mut self) -> Result<&mut SessionFacade, ControllerError> {
        match (self.state, &mut self.session) {
            (LifecycleState::Editing, Some(session)) => Ok(session),
            _ => Err(ControllerError::NoSession),
        }
    }

    /// Load `url` and start editing it as the local member.
    pub async fn open_document_from_url(&mut self, url: &str) -> Result<(), ControllerError> {
        self.transition(LifecycleAction::Open)?;
        log::info!("opening {url}");

        if let Err(err) = self.engine.load(url).await {
            log::warn!("could not load {url}: {err}");
            self.transition(LifecycleAction::LoadFailed)?;
            return Err(err.into());
        }

        if let Err(err) = self.start_session() {
            log::warn!("could not start a session on {url}: {err}");
            self.detach_relays();
            self.session = None;
            if let Err(close_err) = self.engine.close().await {
                log::warn!("engine did not close after failed start: {close_err}");
            }
            self.transition(LifecycleAction::LoadFailed)?;
            return Err(err);
        }

        self.transition(LifecycleAction::Ready)
    }

    fn start_session(&mut self) -> Result<(), ControllerError> {
        let context = SessionContext {
            engine: Rc::clone(&self.engine),
            local_member: self.member_id.clone(),
            features: self.options.features(),
        };
        let components = self.frontend.create_session_components(&context);
        let mut session = SessionFacade::new(
            Rc::clone(&self.engine),
            self.member_id.clone(),
            components,
            self.fonts_css.as_deref(),
        )?;

        if context.features.undo_redo {
            let manager = self.frontend.create_undo_manager(&context);
            session.input_mut().set_undo_manager(Rc::clone(&manager))?;
            let events = Rc::downgrade(&self.events);
            self.modified_subscription =
                Some(manager.subscribe_modified_changed(Box::new(move |modified| {
                    relay(&events, EditorEvent::DocumentModifiedChanged(modified))
                }))?);
            self.undo_manager = Some(manager);
        }

        let events = Rc::downgrade(&self.events);
        self.metadata_subscription = Some(self.engine.subscribe(
            EngineSignal::MetadataChanged,
            Box::new(move |event: &EngineEvent| {
                if let EngineEvent::MetadataChanged {
                    set_properties,
                    removed_properties,
                } = event
                {
                    relay(
                        &events,
                        EditorEvent::MetadataChanged {
                            set_properties: set_properties.clone(),
                            removed_properties: removed_properties.clone(),
                        },
                    );
                }
            }),
        )?);

        self.engine.enqueue(vec![Operation::AddMember {
            member_id: self.member_id.clone(),
            properties: self.user.clone(),
        }])?;

        if let Some(chrome) = self.chrome.as_mut() {
            chrome.toolbar.session_attached(true);
        }
        session.input_mut().insert_local_cursor()?;
        session.input_mut().start_editing();
        self.session = Some(session);
        Ok(())
    }

    fn detach_relays(&mut self) {
        if let Some(id) = self.metadata_subscription.take() {
            self.engine.unsubscribe(EngineSignal::MetadataChanged, id);
        }
        if let Some(manager) = self.undo_manager.take()
            && let Some(id) = self.modified_subscription.take()
        {
            manager.unsubscribe_modified_changed(id);
        }
    }

    /// Leave the document: detach the local cursor, remove the local member,
    /// wait for the engine to close and tear the session down.
    ///
    /// On failure the controller stays in `Closing` and cannot be reused.
    pub async fn close_document(&mut self) -> Result<(), ControllerError> {
        self.transition(LifecycleAction::Close)?;
        let mut session = self.session.take().ok_or(ControllerError::NoSession)?;

        session.input_mut().end_editing();
        if let Some(chrome) = self.chrome.as_mut() {
            chrome.toolbar.session_attached(false);
        }
        let left = session.input_mut().remove_local_cursor().and_then(|()| {
            self.engine.enqueue(vec![Operation::RemoveMember {
                member_id: self.member_id.clone(),
            }])
        });
        if let Err(err) = left {
            return Err(self.abort_close(err));
        }

        if let Err(err) = self.engine.close().await {
            return Err(self.abort_close(err));
        }

        self.detach_relays();
        if let Err(err) = session.destroy().await {
            return Err(self.abort_close(err));
        }

        self.transition(LifecycleAction::Closed)
    }

    /// Leaves the controller in `Closing` with its relays detached and
    /// reports `err` to `UnknownError` subscribers.
    fn abort_close(&mut self, err: impl Into<ControllerError>) -> ControllerError {
        let err = err.into();
        log::warn!("closing the document failed: {err}");
        self.detach_relays();
        self.report(&err);
        err
    }

    /// Tear down the editor chrome. Legal only without an open document; the
    /// controller ends up `Destroyed` even when a teardown step fails.
    pub async fn destroy(&mut self) -> Result<(), ControllerError> {
        self.transition(LifecycleAction::Destroy)?;

        let result = match self.chrome.take() {
            Some(EditorChrome {
                zoom_helper,
                toolbar,
                canvas,
                container,
            }) => {
                TeardownCoordinator::new()
                    .step(TeardownStep::component("zoom helper", zoom_helper))
                    .step(TeardownStep::new("toolbar", move || toolbar.teardown()))
                    .step(TeardownStep::component("canvas", canvas))
                    .step(TeardownStep::component("container", container))
                    .destroy_all()
                    .await
            }
            None => Ok(()),
        };
        self.events.clear();
        Ok(result?)
    }

    pub fn user_data(&self) -> &MemberProperties {
        &self.user
    }

    /// Replace the local member's details. Missing fields fall back to
    /// defaults; an open session announces the change to other members.
    pub fn set_user_data(&mut self, user: MemberProperties) -> Result<(), ControllerError> {
        self.user = user.with_defaults();
        if let Ok(session) = self.session() {
            session.update_local_member(self.user.clone())?;
        }
        Ok(())
    }

    pub fn set_metadata(
        &self,
        set_properties: BTreeMap<String, String>,
        removed_properties: Vec<String>,
    ) -> Result<(), ControllerError> {
        self.session()?;
        self.engine.enqueue(vec![Operation::UpdateMetadata {
            member_id: self.member_id.clone(),
            set_properties,
            removed_properties,
        }])?;
        Ok(())
    }

    pub fn metadata(&self, property: &str) -> Result<Option<String>, ControllerError> {
        self.session()?;
        Ok(self.engine.metadata(property))
    }

    /// Always `false` when undo/redo is disabled.
    pub fn is_document_modified(&self) -> bool {
        self.undo_manager
            .as_ref()
            .is_some_and(|manager| manager.is_document_modified())
    }

    pub fn set_document_modified(&self, modified: bool) {
        if let Some(manager) = &self.undo_manager {
            manager.set_document_modified(modified);
        }
    }
}
