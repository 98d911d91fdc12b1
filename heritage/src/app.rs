//! Application state and lifecycle
//!
//! `AppState` is the context object handed to every screen: the backend
//! client, the session store, the services built on them, and the
//! navigator. It is created once at start and torn down at exit.

use crate::backend::{Backend, Repository, SupabaseClient};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use crate::routing::{Navigator, Route, RouteDecision};
use crate::services::{
    DashboardService, FamilyService, MemoriesService, Session, SessionCache, SessionStore,
};
use crate::storage::MediaStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Central application state holding all services
pub struct AppState {
    pub session: Arc<SessionStore>,
    pub family: FamilyService,
    pub memories: MemoriesService,
    pub dashboard: DashboardService,
    pub navigator: Navigator,
}

impl AppState {
    /// Wire every service to `backend`. With a cache the session survives
    /// between runs.
    pub fn new(backend: Arc<dyn Backend>, cache: Option<SessionCache>) -> Self {
        let session = Arc::new(SessionStore::new(backend.clone(), cache));
        let repo = Repository::new(backend.clone());
        let navigator = Navigator::new(&session);

        Self {
            family: FamilyService::new(repo.clone()),
            memories: MemoriesService::new(repo.clone(), MediaStore::new(backend)),
            dashboard: DashboardService::new(repo),
            session,
            navigator,
        }
    }

    /// Build state against the hosted backend described by `config`
    pub fn connect(config: &BackendConfig, data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Connecting to backend at {}", config.url);
        std::fs::create_dir_all(&data_dir)?;

        let cache = SessionCache::new(&data_dir)?;
        let backend: Arc<dyn Backend> = Arc::new(SupabaseClient::new(config)?);
        Ok(Self::new(backend, Some(cache)))
    }

    /// Resolve the initial session. Until this returns every guarded route
    /// shows the loading view.
    pub async fn start(&self) -> Option<Session> {
        tracing::info!("Initializing application");
        let session = self.session.initialize().await;
        tracing::info!("Application initialized successfully");
        session
    }

    /// Enter `route`, returning the session the screen runs under.
    ///
    /// Fails when the guard sends the user elsewhere, e.g. a protected
    /// screen while signed out.
    pub fn enter(&mut self, route: Route) -> Result<Option<Session>> {
        match self.navigator.navigate(route.path()) {
            RouteDecision::Render(shown) if shown == route => Ok(self.session.current()),
            RouteDecision::Render(shown) | RouteDecision::Redirect(shown) => Err(AppError::Auth(
                format!("{} is not available here; redirected to {}", route.path(), shown.path()),
            )),
            RouteDecision::ShowLoading => Err(AppError::Generic(
                "Session is still loading".to_string(),
            )),
        }
    }

    /// Enter a protected route and return its session
    pub fn enter_protected(&mut self, route: Route) -> Result<Session> {
        self.enter(route)?
            .ok_or_else(|| AppError::Auth("Not signed in".to_string()))
    }

    pub fn shutdown(self) {
        tracing::info!("Shutting down");
    }
}
