/*!
 * # Document Session
 *
 * A session is one participant's view of a collaboratively edited document.
 *
 * ## Architecture Overview
 *
 * ### 1. The Engine Owns the Document
 * - All document state lives behind the **`DocumentEngine`** trait
 * - Sessions read state through engine queries and never mutate it directly
 * - Edits are submitted as **batches of `Operation`s** that the engine applies atomically
 *
 * ### 2. Events Flow Outward
 * - The engine publishes `EngineEvent`s; the session relays them as `SessionEvent`s
 * - Listeners subscribe per `SessionSignal` on the session's own bus
 * - Nothing holds a borrow of session state while listeners run
 *
 * ### 3. Style Tracking
 * - **`StyleTracker`** follows the paragraph under the local cursor
 * - Style changes are announced only when the resolved common style differs
 *
 * ## Module Structure
 *
 * - **`types`**: identifiers, members, cursors, styles and session events
 * - **`operations`**: the `Operation` vocabulary and structured content
 * - **`engine`**: the `DocumentEngine` contract and its events
 * - **`style_tracker`**: current paragraph style tracking
 * - **`components`**: frontend-supplied views, input controller and undo manager
 * - **`facade`**: `SessionFacade`, the public surface of a live session
 */

pub mod components;
pub mod engine;
pub mod facade;
pub mod operations;
pub mod style_tracker;
pub mod types;

pub use components::{
    Frontend, InputController, SessionComponents, SessionContext, UndoManager,
};
pub use engine::{
    DocumentEngine, EngineError, EngineEvent, EngineFuture, EngineHandler, EngineSignal,
};
pub use facade::{SessionError, SessionFacade};
pub use operations::{ImageParams, Operation, StructuredContent, TableParams};
pub use style_tracker::StyleTracker;
pub use types::{
    CurrentParagraphState, Cursor, FontDeclaration, Member, MemberId, MemberProperties,
    ParagraphChange, ParagraphChangeKind, ParagraphInfo, ParagraphRef, SelectionKind,
    SessionEvent, SessionSignal, StepPosition, StyleDefinition, StyleFamily, StyleId,
    StyleSummary,
};
