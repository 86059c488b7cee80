use std::cell::RefCell;
use std::rc::Rc;

use crate::session::types::{
    CurrentParagraphState, ParagraphChange, ParagraphChangeKind, ParagraphRef, SessionEvent,
    StyleId,
};
use crate::signals::{SignalBus, SignalError};

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<CurrentParagraphState>,
    /// `None` until something was observed; the default style is `Some("")`
    last_observed: Option<StyleId>,
}

/// Follows the paragraph under the local cursor and announces changes of
/// its resolved common style.
#[derive(Debug)]
pub struct StyleTracker {
    bus: Rc<SignalBus<SessionEvent>>,
    state: RefCell<TrackerState>,
}

impl StyleTracker {
    pub fn new(bus: Rc<SignalBus<SessionEvent>>) -> Self {
        Self {
            bus,
            state: RefCell::new(TrackerState::default()),
        }
    }

    /// Record the paragraph at the local cursor and its resolved style.
    ///
    /// Emits `ParagraphChanged` with a style payload only when the style
    /// differs from the last observed one. Returns whether it emitted.
    pub fn observe(
        &self,
        paragraph: ParagraphRef,
        resolved_style: StyleId,
    ) -> Result<bool, SignalError> {
        let changed = {
            let mut state = self.state.borrow_mut();
            state.current = Some(CurrentParagraphState {
                paragraph,
                resolved_style: resolved_style.clone(),
            });
            if state.last_observed.as_ref() == Some(&resolved_style) {
                false
            } else {
                state.last_observed = Some(resolved_style.clone());
                true
            }
        };

        if changed {
            log::debug!("paragraph {paragraph:?} now resolves to style {resolved_style:?}");
            self.bus
                .emit(&SessionEvent::ParagraphChanged(ParagraphChange {
                    paragraph,
                    kind: ParagraphChangeKind::Style(resolved_style),
                }))?;
        }
        Ok(changed)
    }

    pub fn current(&self) -> Option<CurrentParagraphState> {
        self.state.borrow().current.clone()
    }

    pub fn current_paragraph(&self) -> Option<ParagraphRef> {
        self.state.borrow().current.as_ref().map(|c| c.paragraph)
    }

    pub fn last_observed_style(&self) -> Option<StyleId> {
        self.state.borrow().last_observed.clone()
    }

    /// Forget the tracked paragraph; the next observation always emits.
    pub fn reset(&self) {
        *self.state.borrow_mut() = TrackerState::default();
    }
}
