use crate::{FolioError, FolioResult, SessionUser};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Supplies bearer tokens to the clients and hears back when the backend
/// rejects one. Clients hold this instead of a token so a login or logout
/// never requires rebuilding them.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Called with the exact token the backend answered 401 for.
    fn on_unauthorized(&self, token: &str);
}

/// Notified when the session is torn down because the backend rejected its
/// token. Hosts use it to redirect to the login screen.
pub trait SessionListener: Send + Sync {
    fn on_session_expired(&self, user: &SessionUser);
}

/// The signed-in administrator, shared by every client.
#[derive(Default)]
pub struct Session {
    user: RwLock<Option<SessionUser>>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(user: SessionUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
            listeners: RwLock::default(),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn login(&self, user: SessionUser) {
        info!(email = %user.email, is_admin = user.is_admin, "session started");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Explicit sign-out. Listeners are not notified.
    pub fn logout(&self) -> Option<SessionUser> {
        let previous = self
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(user) = &previous {
            info!(email = %user.email, "session ended");
        }
        previous
    }

    #[must_use]
    pub fn current(&self) -> Option<SessionUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.current().is_some_and(|user| user.is_admin)
    }

    /// Token of the current session, or `AuthRequired`.
    pub fn token(&self) -> FolioResult<String> {
        self.current()
            .map(|user| user.token)
            .ok_or(FolioError::AuthRequired)
    }

    /// Token of the current session if it belongs to an administrator.
    pub fn require_admin(&self) -> FolioResult<String> {
        match self.current() {
            None => Err(FolioError::AuthRequired),
            Some(user) if !user.is_admin => Err(FolioError::AdminRequired),
            Some(user) => Ok(user.token),
        }
    }

    /// Tear the session down if `token` is still the current one. Returns
    /// whether this call did the teardown; later calls for the same stale
    /// token are no-ops, so listeners fire once however many requests fail.
    pub fn expire(&self, token: &str) -> bool {
        let expired = {
            let mut guard = self.user.write().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(user) if user.token == token => guard.take(),
                _ => None,
            }
        };

        let Some(user) = expired else {
            return false;
        };
        warn!(email = %user.email, "session expired, signing out");

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_session_expired(&user);
        }
        true
    }
}

impl TokenProvider for Session {
    fn bearer_token(&self) -> Option<String> {
        self.current().map(|user| user.token)
    }

    fn on_unauthorized(&self, token: &str) {
        self.expire(token);
    }
}
