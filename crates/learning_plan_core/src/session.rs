//! crates/learning_plan_core/src/session.rs
//!
//! Login lifecycle around an injected `SessionStore`, plus an in-memory store.

use std::sync::RwLock;
use tracing::info;

use crate::domain::{AuthSession, User, UserRole};
use crate::ports::{AuthService, PortError, PortResult, SessionStore};

/// Keeps the session for the lifetime of the process.
#[derive(Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<AuthSession>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<AuthSession> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, session: AuthSession) -> PortResult<()> {
        let mut guard = self.session.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(session);
        Ok(())
    }

    fn clear(&self) -> PortResult<()> {
        let mut guard = self.session.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
        Ok(())
    }
}

/// Authenticates and keeps the resulting token and user in `store`.
pub async fn login(
    auth: &dyn AuthService,
    store: &dyn SessionStore,
    username: &str,
    password: &str,
) -> PortResult<User> {
    let session = auth.login(username, password).await?;
    let user = session.user.clone();
    store.store(session)?;
    info!(username = %user.username, role = ?user.role, "Logged in");
    Ok(user)
}

pub fn logout(store: &dyn SessionStore) -> PortResult<()> {
    store.clear()?;
    info!("Logged out");
    Ok(())
}

pub fn current_user(store: &dyn SessionStore) -> Option<User> {
    store.load().map(|session| session.user)
}

/// The logged-in user, if they hold `role`.
pub fn require_role(store: &dyn SessionStore, role: UserRole) -> PortResult<User> {
    let user = current_user(store).ok_or(PortError::Unauthorized)?;
    if user.role != role {
        return Err(PortError::Rejected("權限不足".into()));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn login_persists_the_token_and_logout_clears_it() {
        let backend = FakeBackend::default();
        let store = MemorySessionStore::default();

        let user = login(&backend, &store, "11430001", "secret").await.unwrap();
        assert_eq!(user.role, UserRole::Student);
        assert_eq!(store.load().unwrap().access_token, "token-11430001");

        logout(&store).unwrap();
        assert!(store.load().is_none());
        assert!(current_user(&store).is_none());
    }

    #[tokio::test]
    async fn failed_login_leaves_the_store_empty() {
        let backend = FakeBackend::default();
        let store = MemorySessionStore::default();
        assert_matches!(
            login(&backend, &store, "11430001", "wrong").await,
            Err(PortError::Rejected(_))
        );
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn role_is_checked_against_the_stored_user() {
        let backend = FakeBackend::default();
        let store = MemorySessionStore::default();
        assert_matches!(require_role(&store, UserRole::Student), Err(PortError::Unauthorized));

        login(&backend, &store, "11430001", "secret").await.unwrap();
        assert!(require_role(&store, UserRole::Student).is_ok());
        assert_matches!(require_role(&store, UserRole::Teacher), Err(PortError::Rejected(_)));
    }
}
