use std::fmt;

use crate::controller::ControllerError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    /// Waiting for the engine to finish loading a document
    Loading,
    Editing,
    /// Waiting for the engine to close and the session to be torn down
    Closing,
    Closed,
    Destroyed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    Open,
    Ready,
    LoadFailed,
    Close,
    Closed,
    Destroy,
}

impl LifecycleState {
    /// The state reached by `action`, or `IllegalTransition` when `action`
    /// is not allowed in this state.
    pub fn next(self, action: LifecycleAction) -> Result<LifecycleState, ControllerError> {
        use LifecycleAction as A;
        use LifecycleState as S;

        match (self, action) {
            (S::Uninitialized | S::Closed, A::Open) => Ok(S::Loading),
            (S::Loading, A::Ready) => Ok(S::Editing),
            (S::Loading, A::LoadFailed) => Ok(S::Closed),
            (S::Editing, A::Close) => Ok(S::Closing),
            (S::Closing, A::Closed) => Ok(S::Closed),
            (S::Uninitialized | S::Closed, A::Destroy) => Ok(S::Destroyed),
            (from, action) => {
                log::error!("illegal editor transition: {action:?} while {from}");
                Err(ControllerError::IllegalTransition { from, action })
            }
        }
    }

    /// Whether a document may be opened in this state.
    pub fn can_open(self) -> bool {
        matches!(self, LifecycleState::Uninitialized | LifecycleState::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Loading => "loading",
            LifecycleState::Editing => "editing",
            LifecycleState::Closing => "closing",
            LifecycleState::Closed => "closed",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
