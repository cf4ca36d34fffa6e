/// Session Lifecycle
///
/// Resolves the caller's session on every request, refreshing an expired
/// access token through the identity backend and rotating the cookie.
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::cookies::{CookieJar, SessionStore};
use super::identity::IdentityProvider;
use super::session::{Session, unix_now};

/// Message shown on the login page when a protected page needs a session
pub const SIGN_IN_REQUIRED: &str = "Please sign in to continue.";

/// Where a request's session stands after the cookie has been inspected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Valid(Session),
    ExpiredPendingRefresh(Session),
}

/// Redirect to the login page, returned when a session is required
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub location: String,
}

impl LoginRedirect {
    pub fn new(login_path: &str, message: &str) -> Self {
        let query = serde_urlencoded::to_string([("error", message)]).unwrap_or_default();
        Self {
            location: format!("{}?{}", login_path, query),
        }
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.location).into_response()
    }
}

/// Session resolver shared by every request
pub struct SessionManager {
    store: SessionStore,
    identity: Arc<dyn IdentityProvider>,
    login_path: String,
}

impl SessionManager {
    pub fn new(
        store: SessionStore,
        identity: Arc<dyn IdentityProvider>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            login_path: login_path.into(),
        }
    }

    /// Classify the request's session cookie at time `now`
    pub fn inspect(&self, jar: &CookieJar, now: i64) -> SessionState {
        match self.store.read_session(jar) {
            None => SessionState::Unauthenticated,
            Some(session) if session.is_expired_at(now) => {
                SessionState::ExpiredPendingRefresh(session)
            }
            Some(session) => SessionState::Valid(session),
        }
    }

    /// The caller's session, refreshed if its access token has expired.
    ///
    /// Refresh failures are not reported: the cookie is deleted and the
    /// caller is treated as signed out.
    pub async fn resolve_session(&self, jar: &mut CookieJar) -> Option<Session> {
        let expired = match self.inspect(jar, unix_now()) {
            SessionState::Unauthenticated => return None,
            SessionState::Valid(session) => {
                debug!("Session valid for user {}", session.user_id);
                return Some(session);
            }
            SessionState::ExpiredPendingRefresh(session) => session,
        };

        debug!("Session expired for user {}, refreshing", expired.user_id);
        let refreshed = match self.identity.refresh_session(&expired.refresh_token).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Session refresh failed for user {}: {}", expired.user_id, e);
                self.store.clear_session(jar);
                return None;
            }
        };

        if let Err(e) = self.store.write_session(jar, &refreshed) {
            error!("Failed to persist refreshed session: {}", e);
            self.store.clear_session(jar);
            return None;
        }

        info!("Session refreshed for user {}", refreshed.user_id);
        Some(refreshed)
    }

    /// Like `resolve_session`, but an unauthenticated caller gets a redirect
    /// to the login page instead of `None`
    pub async fn require_session(&self, jar: &mut CookieJar) -> Result<Session, LoginRedirect> {
        self.resolve_session(jar)
            .await
            .ok_or_else(|| LoginRedirect::new(&self.login_path, SIGN_IN_REQUIRED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::SessionCodec;
    use crate::auth::cookies::CookiePolicy;
    use crate::auth::error::AuthError;
    use crate::auth::identity::MockIdentityProvider;
    use crate::config::Environment;
    use crate::security::SessionCipher;

    const COOKIE: &str = "carelink_session";

    fn test_store() -> SessionStore {
        let key: [u8; 32] = rand::random();
        SessionStore::new(
            Arc::new(SessionCodec::with_cipher(
                SessionCipher::new(&key),
                Environment::Production,
            )),
            CookiePolicy {
                session_cookie_name: COOKIE.to_string(),
                session_max_age: 604_800,
                oauth_max_age: 600,
                secure: false,
            },
        )
    }

    fn session(expires_at: i64, access_token: &str) -> Session {
        Session {
            user_id: "user-1".to_string(),
            email: "guardian@example.com".to_string(),
            access_token: access_token.to_string(),
            refresh_token: format!("refresh-for-{}", access_token),
            expires_at,
        }
    }

    /// Jar whose incoming session cookie holds `session`
    fn jar_with(store: &SessionStore, session: &Session) -> CookieJar {
        let mut scratch = CookieJar::new();
        store.write_session(&mut scratch, session).unwrap();
        let value = scratch.find_delta(COOKIE).unwrap().value.clone();
        CookieJar::new().with_cookie(COOKIE, value)
    }

    fn manager(store: SessionStore, identity: MockIdentityProvider) -> SessionManager {
        SessionManager::new(store, Arc::new(identity), "/auth/login")
    }

    #[tokio::test]
    async fn test_no_cookie_is_unauthenticated() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_refresh_session().never();

        let manager = manager(test_store(), identity);
        let mut jar = CookieJar::new();

        assert_eq!(manager.resolve_session(&mut jar).await, None);
        assert!(jar.delta().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_cookie_is_unauthenticated() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_refresh_session().never();

        let manager = manager(test_store(), identity);
        let mut jar = CookieJar::new().with_cookie(COOKIE, "00:11:22");

        assert_eq!(manager.resolve_session(&mut jar).await, None);
    }

    #[tokio::test]
    async fn test_valid_session_skips_refresh() {
        let store = test_store();
        let current = session(unix_now() + 600, "access-1");
        let mut jar = jar_with(&store, &current);

        let mut identity = MockIdentityProvider::new();
        identity.expect_refresh_session().never();

        let manager = manager(store, identity);
        assert_eq!(manager.resolve_session(&mut jar).await, Some(current));
        assert!(jar.delta().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_once() {
        let store = test_store();
        let expired = session(unix_now() - 10, "access-old");
        let mut jar = jar_with(&store, &expired);

        let fresh = Session {
            user_id: "user-1".to_string(),
            email: "guardian@example.com".to_string(),
            access_token: "access-new".to_string(),
            refresh_token: "refresh-new".to_string(),
            expires_at: unix_now() + 3600,
        };
        let returned = fresh.clone();

        let mut identity = MockIdentityProvider::new();
        identity
            .expect_refresh_session()
            .withf(|token| token.to_string() == "refresh-for-access-old")
            .times(1)
            .returning(move |_| Ok(returned.clone()));

        let manager = manager(store.clone(), identity);
        let resolved = manager.resolve_session(&mut jar).await.unwrap();

        assert_eq!(resolved, fresh);
        assert_eq!(resolved.user_id, "user-1");
        assert_eq!(resolved.email, "guardian@example.com");

        // The rotated session is persisted to the response cookie
        let cookie = jar.find_delta(COOKIE).unwrap();
        assert!(!cookie.is_removal());
        assert_eq!(store.read_session(&jar), Some(fresh));
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_cookie() {
        let store = test_store();
        let mut jar = jar_with(&store, &session(unix_now() - 10, "access-old"));

        let mut identity = MockIdentityProvider::new();
        identity
            .expect_refresh_session()
            .times(1)
            .returning(|_| Err(AuthError::Remote("Invalid Refresh Token".to_string())));

        let manager = manager(store, identity);
        assert_eq!(manager.resolve_session(&mut jar).await, None);

        assert!(jar.find_delta(COOKIE).unwrap().is_removal());
        assert_eq!(jar.get(COOKIE), None);
    }

    #[tokio::test]
    async fn test_require_session_redirects_to_login() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_refresh_session().never();

        let manager = manager(test_store(), identity);
        let redirect = manager
            .require_session(&mut CookieJar::new())
            .await
            .unwrap_err();

        assert_eq!(
            redirect.location,
            "/auth/login?error=Please+sign+in+to+continue."
        );
    }

    #[test]
    fn test_inspect_states() {
        let store = test_store();
        let manager = manager(store.clone(), MockIdentityProvider::new());
        let current = session(1_000, "a");
        let jar = jar_with(&store, &current);

        assert_eq!(
            manager.inspect(&jar, 999),
            SessionState::Valid(current.clone())
        );
        assert_eq!(
            manager.inspect(&jar, 1_000),
            SessionState::ExpiredPendingRefresh(current)
        );
        assert_eq!(
            manager.inspect(&CookieJar::new(), 0),
            SessionState::Unauthenticated
        );
    }
}
