//! Route guard
//!
//! Decides what each path shows given the session state. The guard is a
//! small state machine fed by session events:
//!
//! ```text
//! Loading --Resolved(Some)--> Authenticated
//! Loading --Resolved(None)--> Unauthenticated
//! Unauthenticated <--SignedIn / SignedOut--> Authenticated
//! ```
//!
//! While Loading every known route shows the loading view. Protected
//! routes need Authenticated (else landing); public routes need
//! Unauthenticated (else dashboard). Unknown paths go to landing.

use crate::services::session::SessionEvent;

/// Who may see a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only signed-out visitors
    Public,
    /// Only signed-in users
    Protected,
}

/// Screens of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Dashboard,
    AddMemory,
    FamilyTree,
    CreateFamilyTree,
    Timeline,
    Profile,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Landing,
        Route::Dashboard,
        Route::AddMemory,
        Route::FamilyTree,
        Route::CreateFamilyTree,
        Route::Timeline,
        Route::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Dashboard => "/dashboard",
            Route::AddMemory => "/add-memory",
            Route::FamilyTree => "/family-tree",
            Route::CreateFamilyTree => "/create-family-tree",
            Route::Timeline => "/timeline",
            Route::Profile => "/profile",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Landing => Access::Public,
            _ => Access::Protected,
        }
    }

    /// Match a path, ignoring any query string, fragment or trailing slash
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };

        Route::ALL.into_iter().find(|route| route.path() == normalized)
    }
}

/// Session state as the guard sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    Authenticated,
}

/// What navigating to a path produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// The initial session check is still pending
    ShowLoading,
    Render(Route),
    Redirect(Route),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    state: GuardState,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteGuard {
    pub fn new() -> Self {
        Self {
            state: GuardState::Loading,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Apply a session change
    pub fn handle(&mut self, event: &SessionEvent) {
        let next = match event {
            SessionEvent::Resolved(Some(_)) | SessionEvent::SignedIn(_) => {
                GuardState::Authenticated
            }
            SessionEvent::Resolved(None) | SessionEvent::SignedOut => GuardState::Unauthenticated,
        };

        if next != self.state {
            tracing::debug!("Route guard: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Decide what `path` shows, without following redirects
    pub fn resolve(&self, path: &str) -> RouteDecision {
        let Some(route) = Route::from_path(path) else {
            return RouteDecision::Redirect(Route::Landing);
        };

        match (self.state, route.access()) {
            (GuardState::Loading, _) => RouteDecision::ShowLoading,
            (GuardState::Authenticated, Access::Protected)
            | (GuardState::Unauthenticated, Access::Public) => RouteDecision::Render(route),
            (GuardState::Authenticated, Access::Public) => RouteDecision::Redirect(Route::Dashboard),
            (GuardState::Unauthenticated, Access::Protected) => {
                RouteDecision::Redirect(Route::Landing)
            }
        }
    }

    /// Follow redirects from `path` until a screen (or the loading view) shows
    pub fn settle(&self, path: &str) -> RouteDecision {
        let mut decision = self.resolve(path);

        // Every redirect lands on a route that renders in the current
        // state, so two hops always suffice.
        for _ in 0..Route::ALL.len() {
            match decision {
                RouteDecision::Redirect(target) => decision = self.resolve(target.path()),
                settled => return settled,
            }
        }

        decision
    }
}
