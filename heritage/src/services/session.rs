//! Session store
//!
//! Single source of truth for who is signed in. The store starts in the
//! loading state, resolves once `initialize` has checked for a saved
//! session, and afterwards changes only through sign-in, sign-up and
//! sign-out. Every change is published as a `SessionEvent` so observers
//! such as the route guard can follow along.

use super::session_cache::{CachedSession, SessionCache};
use crate::backend::{AuthSession, Backend, Profile, Repository};
use crate::config::MIN_PASSWORD_LENGTH;
use crate::error::{AppError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 16;

/// The authenticated identity of the current user
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    fn from_auth(auth: AuthSession) -> Self {
        let display_name = auth.user.full_name().unwrap_or_default().to_string();
        Self {
            user_id: auth.user.id,
            email: auth.user.email.unwrap_or_default(),
            display_name,
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// A change in who is signed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The initial check finished
    Resolved(Option<Session>),
    SignedIn(Session),
    SignedOut,
}

/// Current identity plus whether the initial check is still pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub session: Option<Session>,
}

pub struct SessionStore {
    backend: Arc<dyn Backend>,
    repo: Repository,
    cache: Option<SessionCache>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Create a store in the loading state. With a cache, sessions survive
    /// between runs.
    pub fn new(backend: Arc<dyn Backend>, cache: Option<SessionCache>) -> Self {
        let (state, _) = watch::channel(SessionState {
            loading: true,
            session: None,
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            repo: Repository::new(backend.clone()),
            backend,
            cache,
            state,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    fn publish(&self, session: Option<Session>, event: SessionEvent) {
        self.state.send_replace(SessionState {
            loading: false,
            session,
        });
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Resolve the initial identity, restoring a cached session if one
    /// exists. A failed restore resolves to signed out.
    pub async fn initialize(&self) -> Option<Session> {
        if !self.is_loading() {
            return self.current();
        }

        let restored = match self.restore().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not restore saved session: {}", e);
                self.forget_cached().await;
                None
            }
        };

        match &restored {
            Some(session) => tracing::info!("Session restored for {}", session.email),
            None => tracing::info!("No active session"),
        }

        self.publish(restored.clone(), SessionEvent::Resolved(restored.clone()));
        restored
    }

    async fn restore(&self) -> Result<Option<Session>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let Some(cached) = cache.load().await? else {
            return Ok(None);
        };

        let mut auth = self.backend.refresh_session(&cached.refresh_token).await?;
        auth.user = self.backend.get_user(&auth.access_token).await?;
        let session = Session::from_auth(auth);
        self.remember(&session).await;

        Ok(Some(session))
    }

    /// Create an account and its profile record.
    ///
    /// Returns `None` when the backend wants the e-mail address confirmed
    /// before the first sign-in. A failed profile insert fails the sign-up
    /// and leaves the store signed out.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Option<Session>> {
        let email = email.trim();
        validate_email(email)?;
        if display_name.trim().is_empty() {
            return Err(AppError::Auth("Full name is required".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Auth(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        tracing::info!("Signing up {}", email);
        let outcome = self
            .backend
            .sign_up(email, password, display_name.trim())
            .await?;

        let Some(auth) = outcome.session else {
            tracing::info!("Account {} created, awaiting e-mail confirmation", email);
            return Ok(None);
        };

        let profile = Profile {
            id: auth.user.id.clone(),
            email: email.to_string(),
            full_name: Some(display_name.trim().to_string()),
            avatar_url: None,
        };
        self.repo
            .create_profile(&profile, &auth.access_token)
            .await
            .map_err(|e| {
                tracing::error!("Account {} created but profile insert failed: {}", email, e);
                e
            })?;

        let session = Session::from_auth(auth);
        self.remember(&session).await;
        self.publish(Some(session.clone()), SessionEvent::SignedIn(session.clone()));

        tracing::info!("Signed up {}", session.user_id);
        Ok(Some(session))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        validate_email(email)?;
        if password.is_empty() {
            return Err(AppError::Auth("Password is required".to_string()));
        }

        let auth = self.backend.sign_in_with_password(email, password).await?;
        let session = Session::from_auth(auth);
        self.remember(&session).await;
        self.publish(Some(session.clone()), SessionEvent::SignedIn(session.clone()));

        tracing::info!("Signed in {}", session.user_id);
        Ok(session)
    }

    /// Clear the session. Always succeeds locally; the server-side sign-out
    /// is best effort.
    pub async fn sign_out(&self) {
        if let Some(session) = self.current() {
            if let Err(e) = self.backend.sign_out(&session.access_token).await {
                tracing::warn!("Server sign-out failed, clearing locally: {}", e);
            }
        }

        self.forget_cached().await;
        self.publish(None, SessionEvent::SignedOut);
        tracing::info!("Signed out");
    }

    async fn remember(&self, session: &Session) {
        let Some(cache) = &self.cache else {
            return;
        };
        let cached = CachedSession {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            refresh_token: session.refresh_token.clone(),
        };
        if let Err(e) = cache.save(&cached).await {
            tracing::warn!("Could not cache session: {}", e);
        }
    }

    async fn forget_cached(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear().await {
                tracing::warn!("Could not clear session cache: {}", e);
            }
        }
    }
}

fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Auth("A valid e-mail address is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::{BackendCall, FailPoint};
    use crate::backend::InMemoryBackend;
    use crate::config::PROFILES_TABLE;
    use tempfile::TempDir;

    fn create_test_cache(dir: &std::path::Path) -> SessionCache {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        SessionCache::new(dir).unwrap()
    }

    fn create_test_store() -> (SessionStore, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let store = SessionStore::new(Arc::new(backend.clone()), None);
        (store, backend)
    }

    #[tokio::test]
    async fn test_starts_loading_then_resolves() {
        let (store, _backend) = create_test_store();
        let mut events = store.subscribe();
        assert!(store.is_loading());

        assert_eq!(store.initialize().await, None);

        assert!(!store.is_loading());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Resolved(None));
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_and_session() {
        let (store, backend) = create_test_store();
        store.initialize().await;

        let session = store
            .sign_up("arta@example.com", "secret1", "Arta Krasniqi")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.display_name, "Arta Krasniqi");
        assert_eq!(store.current(), Some(session.clone()));

        let profiles = backend.rows(PROFILES_TABLE);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["id"], session.user_id);
        assert_eq!(profiles[0]["full_name"], "Arta Krasniqi");
    }

    #[tokio::test]
    async fn test_sign_up_fails_when_profile_insert_fails() {
        let temp = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        let cache = create_test_cache(temp.path());
        let store = SessionStore::new(Arc::new(backend.clone()), Some(cache.clone()));
        store.initialize().await;
        let mut events = store.subscribe();

        backend.fail_on(FailPoint::Insert(PROFILES_TABLE.to_string()));
        let err = store
            .sign_up("arta@example.com", "secret1", "Arta")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Write(_)));
        assert_eq!(store.current(), None);
        assert!(events.try_recv().is_err());
        assert!(backend.rows(PROFILES_TABLE).is_empty());
        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_weak_password_rejected_without_network() {
        let (store, backend) = create_test_store();

        let err = store
            .sign_up("arta@example.com", "12345", "Arta")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_auth_error() {
        let (store, backend) = create_test_store();
        backend.register("arta@example.com", "secret1", "Arta");

        let err = store
            .sign_up("arta@example.com", "secret2", "Arta")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(store.current(), None);
    }

    #[tokio::test]
    async fn test_sign_up_awaiting_confirmation() {
        let (store, backend) = create_test_store();
        backend.require_email_confirmation(true);

        let outcome = store
            .sign_up("arta@example.com", "secret1", "Arta")
            .await
            .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(store.current(), None);
        assert!(backend.rows(PROFILES_TABLE).is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let (store, backend) = create_test_store();
        backend.register("arta@example.com", "secret1", "Arta");

        let err = store.sign_in("arta@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(store.current(), None);
    }

    #[tokio::test]
    async fn test_sign_out_succeeds_when_network_fails() {
        let (store, backend) = create_test_store();
        backend.register("arta@example.com", "secret1", "Arta");
        store.sign_in("arta@example.com", "secret1").await.unwrap();
        let mut events = store.subscribe();

        backend.fail_on(FailPoint::SignOut);
        store.sign_out().await;

        assert_eq!(store.current(), None);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);
        assert!(backend.calls().contains(&BackendCall::SignOut));
    }

    #[tokio::test]
    async fn test_session_restored_from_cache() {
        let temp = TempDir::new().unwrap();
        let backend = InMemoryBackend::new();
        backend.register("arta@example.com", "secret1", "Arta");

        let cache = create_test_cache(temp.path());

        let first = SessionStore::new(Arc::new(backend.clone()), Some(cache.clone()));
        first.initialize().await;
        let signed_in = first.sign_in("arta@example.com", "secret1").await.unwrap();

        let second = SessionStore::new(Arc::new(backend.clone()), Some(cache));
        let restored = second.initialize().await.unwrap();

        assert_eq!(restored.user_id, signed_in.user_id);
        assert_eq!(restored.display_name, "Arta");
        assert_ne!(restored.access_token, signed_in.access_token);
    }

    #[tokio::test]
    async fn test_failed_restore_resolves_signed_out() {
        let temp = TempDir::new().unwrap();
        let cache = create_test_cache(temp.path());
        cache
            .save(&CachedSession {
                user_id: "gone".to_string(),
                email: "gone@example.com".to_string(),
                refresh_token: "revoked".to_string(),
            })
            .await
            .unwrap();

        let store = SessionStore::new(Arc::new(InMemoryBackend::new()), Some(cache.clone()));

        assert_eq!(store.initialize().await, None);
        assert!(!store.is_loading());
        assert_eq!(cache.load().await.unwrap(), None);
    }
}
