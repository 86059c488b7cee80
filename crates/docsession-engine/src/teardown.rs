//! Ordered, failure-aware teardown.
//!
//! Components that own child resources release them through a
//! [`TeardownCoordinator`]: a list of labelled steps that are started one at
//! a time, each only after the previous one has resolved successfully. The
//! first failing step stops the sequence and its error is returned as is.
//! A view has to be gone before the model it observes, so steps are never
//! run concurrently or out of order.

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::session::EngineError;

pub type TeardownFuture = LocalBoxFuture<'static, Result<(), TeardownError>>;

#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("failed to tear down {component}: {reason}")]
    Component { component: String, reason: String },
    #[error("engine failed during teardown: {0}")]
    Engine(#[from] EngineError),
}

impl TeardownError {
    pub fn component(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

/// Something that releases its resources asynchronously and exactly once.
pub trait Teardown {
    fn teardown(self: Box<Self>) -> TeardownFuture;
}

/// One unit of the destroy sequence. The future is only created when the
/// step is reached.
pub struct TeardownStep {
    label: String,
    run: Box<dyn FnOnce() -> TeardownFuture>,
}

impl TeardownStep {
    pub fn new<F>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce() -> TeardownFuture + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }

    /// A step that tears down an owned component.
    pub fn component(label: impl Into<String>, component: Box<dyn Teardown>) -> Self {
        Self::new(label, move || component.teardown())
    }

    /// A synchronous step.
    pub fn sync<F>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce() -> Result<(), TeardownError> + 'static,
    {
        Self::new(label, move || futures::future::ready(run()).boxed_local())
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Default)]
pub struct TeardownCoordinator {
    steps: Vec<TeardownStep>,
}

impl TeardownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: TeardownStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: TeardownStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first error.
    pub async fn destroy_all(self) -> Result<(), TeardownError> {
        let total = self.steps.len();
        for (index, step) in self.steps.into_iter().enumerate() {
            log::debug!("teardown {}/{total}: {}", index + 1, step.label);
            if let Err(err) = (step.run)().await {
                log::warn!(
                    "teardown stopped at `{}` ({} of {total} steps skipped): {err}",
                    step.label,
                    total - index - 1
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recording_step(log: &Log, label: &str, fail: bool) -> TeardownStep {
        let log = Rc::clone(log);
        let name = label.to_string();
        TeardownStep::new(label, move || {
            async move {
                log.borrow_mut().push(format!("start {name}"));
                if fail {
                    return Err(TeardownError::component(name, "still in use"));
                }
                log.borrow_mut().push(format!("done {name}"));
                Ok(())
            }
            .boxed_local()
        })
    }

    #[test]
    fn test_all_steps_run_in_order() {
        let log = Log::default();
        let coordinator = TeardownCoordinator::new()
            .step(recording_step(&log, "view", false))
            .step(recording_step(&log, "controller", false))
            .step(recording_step(&log, "canvas", false));

        block_on(coordinator.destroy_all()).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "start view",
                "done view",
                "start controller",
                "done controller",
                "start canvas",
                "done canvas",
            ]
        );
    }

    #[test]
    fn test_first_failure_skips_remaining_steps() {
        let log = Log::default();
        let coordinator = TeardownCoordinator::new()
            .step(recording_step(&log, "one", false))
            .step(recording_step(&log, "two", true))
            .step(recording_step(&log, "three", false));

        let err = block_on(coordinator.destroy_all()).unwrap_err();

        assert!(matches!(
            &err,
            TeardownError::Component { component, .. } if component == "two"
        ));
        assert_eq!(*log.borrow(), vec!["start one", "done one", "start two"]);
    }

    #[test]
    fn test_empty_coordinator_succeeds() {
        let coordinator = TeardownCoordinator::new();
        assert!(coordinator.is_empty());
        assert!(block_on(coordinator.destroy_all()).is_ok());
    }

    #[test]
    fn test_sync_and_component_steps() {
        struct Widget(Log);

        impl Teardown for Widget {
            fn teardown(self: Box<Self>) -> TeardownFuture {
                self.0.borrow_mut().push("widget".to_string());
                futures::future::ready(Ok(())).boxed_local()
            }
        }

        let log = Log::default();
        let sync_log = Rc::clone(&log);
        let mut coordinator = TeardownCoordinator::new();
        coordinator.push(TeardownStep::component("widget", Box::new(Widget(Rc::clone(&log)))));
        coordinator.push(TeardownStep::sync("internal", move || {
            sync_log.borrow_mut().push("internal".to_string());
            Ok(())
        }));
        assert_eq!(coordinator.len(), 2);

        block_on(coordinator.destroy_all()).unwrap();

        assert_eq!(*log.borrow(), vec!["widget", "internal"]);
    }

    #[test]
    fn test_error_display() {
        insta::assert_snapshot!(
            TeardownError::component("caret manager", "already destroyed"),
            @"failed to tear down caret manager: already destroyed"
        );
    }
}
