//! Fixed-vocabulary publish/subscribe.
//!
//! A [`SignalBus`] is built from the closed set of event kinds a component
//! is allowed to announce. Subscribing to, or emitting, a kind outside that
//! set is a configuration error and is reported as
//! [`SignalError::InvalidSignalKind`].
//!
//! Dispatch is single-threaded: handlers are `Rc`-held and run on the
//! emitting call stack, in subscription order, over a snapshot of the
//! subscriber list taken when emission starts.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// An event that belongs to a closed vocabulary of kinds.
pub trait BusEvent {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("signal kind {0} is not declared on this bus")]
    InvalidSignalKind(String),
}

/// Token returned by [`SignalBus::subscribe`], used to unsubscribe.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SubscriptionId(pub u64);

type Handler<E> = Rc<dyn Fn(&E)>;

pub struct SignalBus<E: BusEvent> {
    declared: HashSet<E::Kind>,
    subscribers: RefCell<HashMap<E::Kind, Vec<(SubscriptionId, Handler<E>)>>>,
    next_id: Cell<u64>,
}

impl<E: BusEvent> SignalBus<E> {
    pub fn new(kinds: impl IntoIterator<Item = E::Kind>) -> Self {
        Self {
            declared: kinds.into_iter().collect(),
            subscribers: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn is_declared(&self, kind: E::Kind) -> bool {
        self.declared.contains(&kind)
    }

    fn check_declared(&self, kind: E::Kind) -> Result<(), SignalError> {
        if self.is_declared(kind) {
            Ok(())
        } else {
            log::error!("signal kind {kind:?} used on a bus that does not declare it");
            Err(SignalError::InvalidSignalKind(format!("{kind:?}")))
        }
    }

    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> Result<SubscriptionId, SignalError>
    where
        F: Fn(&E) + 'static,
    {
        self.check_declared(kind)?;
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, Rc::new(handler)));
        Ok(id)
    }

    /// Remove a subscription. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, kind: E::Kind, id: SubscriptionId) {
        if let Some(handlers) = self.subscribers.borrow_mut().get_mut(&kind) {
            handlers.retain(|(existing, _)| *existing != id);
        }
    }

    /// Deliver `event` to every handler subscribed to its kind.
    ///
    /// Handlers added or removed while the emission is running only take
    /// effect for the next emission.
    pub fn emit(&self, event: &E) -> Result<(), SignalError> {
        let kind = event.kind();
        self.check_declared(kind)?;

        let snapshot: Vec<Handler<E>> = self
            .subscribers
            .borrow()
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default();

        for handler in snapshot {
            handler(event);
        }
        Ok(())
    }

    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.subscribers
            .borrow()
            .get(&kind)
            .map_or(0, |handlers| handlers.len())
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.subscribers.borrow_mut().clear();
    }
}

impl<E: BusEvent> fmt::Debug for SignalBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("declared", &self.declared)
            .finish_non_exhaustive()
    }
}
