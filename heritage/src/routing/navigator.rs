//! Navigator
//!
//! Couples a route guard to the session store's event stream. Pending
//! session events are applied before every navigation, so the decision
//! always reflects the latest sign-in state.

use super::guard::{GuardState, RouteDecision, RouteGuard};
use crate::services::session::{SessionEvent, SessionStore};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub struct Navigator {
    guard: RouteGuard,
    events: broadcast::Receiver<SessionEvent>,
}

impl Navigator {
    /// Follow `store` from now on. If the store has already resolved, the
    /// guard starts from its current state instead of Loading.
    pub fn new(store: &SessionStore) -> Self {
        let events = store.subscribe();
        let mut guard = RouteGuard::new();

        let snapshot = store.snapshot();
        if !snapshot.loading {
            guard.handle(&SessionEvent::Resolved(snapshot.session));
        }

        Self { guard, events }
    }

    fn sync(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.guard.handle(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Navigator skipped {} session events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    pub fn state(&mut self) -> GuardState {
        self.sync();
        self.guard.state()
    }

    /// Where navigating to `path` ends up
    pub fn navigate(&mut self, path: &str) -> RouteDecision {
        self.sync();
        self.guard.settle(path)
    }
}
