pub mod controller;
pub mod fonts;
pub mod headless;
pub mod identifiers;
pub mod memory;
pub mod options;
pub mod session;
pub mod signals;
pub mod teardown;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use controller::{
    ControllerError, EditorChrome, EditorController, EditorEvent, EditorEventKind,
    LifecycleAction, LifecycleState, Toolbar,
};
pub use headless::{
    HeadlessComponent, HeadlessFrontend, HeadlessInput, HeadlessToolbar, TrivialUndoManager,
    headless_chrome,
};
pub use identifiers::{IdentifierError, StyleNamespace};
pub use memory::{MemoryDocument, MemoryEngine};
pub use options::{EditorOptions, FeatureSet, Modus};
pub use session::*;
pub use signals::{BusEvent, SignalBus, SignalError, SubscriptionId};
pub use teardown::{Teardown, TeardownCoordinator, TeardownError, TeardownFuture, TeardownStep};
