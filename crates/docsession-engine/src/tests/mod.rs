use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use futures::FutureExt;
use tempfile::TempDir;

use crate::controller::{EditorChrome, Toolbar};
use crate::headless::{HeadlessInput, TrivialUndoManager};
use crate::memory::{MemoryDocument, MemoryEngine};
use crate::options::EditorOptions;
use crate::session::{
    DocumentEngine, EngineError, Frontend, InputController, MemberId, MemberProperties,
    Operation, SessionComponents, SessionContext, SessionEvent, SessionFacade, SessionSignal,
    UndoManager,
};
use crate::teardown::{Teardown, TeardownError, TeardownFuture};

pub const LOCAL_MEMBER: &str = "member0";

pub const SAMPLE_URL: &str = "memory://sample";

pub const FONTS_CSS: &str = "@font-face { font-family: 'Open Sans'; src: url(OpenSans.ttf); }";

pub type Log = Rc<RefCell<Vec<String>>>;

/// Four paragraphs covering steps 0..=5, 6..=14, 15..=24 and 25..=32.
pub fn sample_document() -> MemoryDocument {
    MemoryDocument::new()
        .common_style("Heading1", "Heading 1")
        .style_attribute("Heading1", "style:name", "Heading1")
        .style_attribute("Heading1", "style:next-style-name", "Body")
        .style_property("Heading1", "text-properties", "font-size", "18pt")
        .common_style("Body", "Body Text")
        .style_property("Body", "paragraph-properties", "margin", "2mm")
        .automatic_style("P1", "Body")
        .paragraph("Intro", "Heading1")
        .paragraph("Overview", "Heading1")
        .paragraph("Body text", "P1")
        .paragraph("Closing", "")
        .font("Arial", "Arial")
        .font("Arial1", "Arial")
        .font("Liberation Serif", "'Liberation Serif'")
}

pub fn open_sample_engine() -> Rc<MemoryEngine> {
    let engine = Rc::new(MemoryEngine::new());
    engine.register_document(SAMPLE_URL, sample_document());
    futures::executor::block_on(engine.load(SAMPLE_URL)).unwrap();
    engine
}

/// Write `content` into a file inside `dir`.
pub fn create_test_file(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let file_path = dir.path().join(filename);
    fs::write(&file_path, content).unwrap();
    file_path
}

/// Teardown participant that records its label and optionally fails.
pub struct RecordingComponent {
    label: String,
    log: Log,
    fail: bool,
}

impl Teardown for RecordingComponent {
    fn teardown(self: Box<Self>) -> TeardownFuture {
        self.log.borrow_mut().push(self.label.clone());
        let result = if self.fail {
            Err(TeardownError::component(self.label.clone(), "refused to stop"))
        } else {
            Ok(())
        };
        futures::future::ready(result).boxed_local()
    }
}

pub struct RecordingToolbar {
    inner: RecordingComponent,
}

impl Toolbar for RecordingToolbar {
    fn session_attached(&mut self, attached: bool) {
        let entry = if attached {
            "toolbar: session attached"
        } else {
            "toolbar: session detached"
        };
        self.inner.log.borrow_mut().push(entry.to_string());
    }
}

impl Teardown for RecordingToolbar {
    fn teardown(self: Box<Self>) -> TeardownFuture {
        Box::new(self.inner).teardown()
    }
}

/// Editor chrome recording into `log`; the component named `failing`
/// fails its teardown.
pub fn recording_chrome(log: &Log, failing: Option<&str>) -> EditorChrome {
    let component = |label: &str| RecordingComponent {
        label: label.to_string(),
        log: Rc::clone(log),
        fail: failing == Some(label),
    };
    EditorChrome {
        zoom_helper: Box::new(component("zoom helper")),
        toolbar: Box::new(RecordingToolbar {
            inner: component("toolbar"),
        }),
        canvas: Box::new(component("canvas")),
        container: Box::new(component("container")),
    }
}

/// Headless input controller whose teardown is recorded.
pub struct RecordingInput {
    inner: HeadlessInput,
    log: Log,
    fail: bool,
}

impl InputController for RecordingInput {
    fn insert_local_cursor(&mut self) -> Result<(), EngineError> {
        self.inner.insert_local_cursor()
    }

    fn remove_local_cursor(&mut self) -> Result<(), EngineError> {
        self.inner.remove_local_cursor()
    }

    fn start_editing(&mut self) {
        self.inner.start_editing()
    }

    fn end_editing(&mut self) {
        self.inner.end_editing()
    }

    fn is_editing(&self) -> bool {
        self.inner.is_editing()
    }

    fn set_undo_manager(&mut self, undo_manager: Rc<dyn UndoManager>) -> Result<(), EngineError> {
        self.inner.set_undo_manager(undo_manager)
    }

    fn undo_manager(&self) -> Option<Rc<dyn UndoManager>> {
        self.inner.undo_manager()
    }
}

impl Teardown for RecordingInput {
    fn teardown(self: Box<Self>) -> TeardownFuture {
        let RecordingInput { inner, log, fail } = *self;
        log.borrow_mut().push("input controller".to_string());
        if fail {
            return futures::future::ready(Err(TeardownError::component(
                "input controller",
                "refused to stop",
            )))
            .boxed_local();
        }
        Box::new(inner).teardown()
    }
}

/// Frontend whose components record their teardown in a shared log.
#[derive(Default)]
pub struct RecordingFrontend {
    pub log: Log,
    failing: Option<&'static str>,
}

impl RecordingFrontend {
    pub fn failing(label: &'static str) -> Self {
        Self {
            failing: Some(label),
            ..Self::default()
        }
    }

    fn component(&self, label: &str) -> Box<dyn Teardown> {
        Box::new(RecordingComponent {
            label: label.to_string(),
            log: Rc::clone(&self.log),
            fail: self.failing == Some(label),
        })
    }
}

impl Frontend for RecordingFrontend {
    fn create_session_components(&self, context: &SessionContext) -> SessionComponents {
        SessionComponents {
            view: self.component("session view"),
            caret_manager: self.component("caret manager"),
            selection_view_manager: self.component("selection view manager"),
            input: Box::new(RecordingInput {
                inner: HeadlessInput::new(
                    Rc::clone(&context.engine),
                    context.local_member.clone(),
                ),
                log: Rc::clone(&self.log),
                fail: self.failing == Some("input controller"),
            }),
            link_tooltip_view: self.component("link tooltip view"),
            field_view: self.component("field view"),
        }
    }

    fn create_undo_manager(&self, _context: &SessionContext) -> Rc<dyn UndoManager> {
        Rc::new(TrivialUndoManager::new())
    }
}

/// A session on `engine` for [`LOCAL_MEMBER`], joined as "Tester" with its
/// cursor at the start of the document. Submitted batches are cleared.
pub fn start_session(
    engine: &Rc<MemoryEngine>,
    frontend: &RecordingFrontend,
) -> (SessionFacade, Log) {
    let engine_dyn: Rc<dyn DocumentEngine> = engine.clone();
    let context = SessionContext {
        engine: Rc::clone(&engine_dyn),
        local_member: MemberId::new(LOCAL_MEMBER),
        features: EditorOptions::all_features().features(),
    };
    let components = frontend.create_session_components(&context);
    let mut session = SessionFacade::new(
        engine_dyn,
        context.local_member.clone(),
        components,
        Some(FONTS_CSS),
    )
    .unwrap();

    engine
        .enqueue(vec![Operation::AddMember {
            member_id: context.local_member.clone(),
            properties: MemberProperties {
                display_name: "Tester".to_string(),
                ..MemberProperties::default()
            },
        }])
        .unwrap();
    session.input_mut().insert_local_cursor().unwrap();
    engine.flush();
    engine.take_submitted();

    (session, Rc::clone(&frontend.log))
}

/// Record every event the session emits.
pub fn event_log(session: &SessionFacade) -> Rc<RefCell<Vec<SessionEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for signal in SessionSignal::ALL {
        let sink = Rc::clone(&log);
        session
            .subscribe(signal, move |event: &SessionEvent| {
                sink.borrow_mut().push(event.clone())
            })
            .unwrap();
    }
    log
}
