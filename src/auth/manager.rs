/// Authentication Manager
///
/// Central orchestrator for authentication operations, coordinating the
/// identity backend, the session cookie, and the OAuth flow.
use std::sync::Arc;
use tracing::info;

use crate::auth::{
    AuthError, BackendIdentityClient, CallbackOutcome, CallbackParams, CookieJar, CookiePolicy,
    IdentityProvider, LoginRedirect, OAuthFlow, OAuthProvider, Session, SessionCodec,
    SessionManager, SessionStore, SignUpOutcome,
};
use crate::config::Config;

/// Message shown after a sign-up that awaits email confirmation
pub const CONFIRM_EMAIL: &str = "Check your email to confirm your account, then sign in.";

pub struct AuthManager {
    config: Arc<Config>,
    identity: Arc<dyn IdentityProvider>,
    store: SessionStore,
    sessions: SessionManager,
    oauth: OAuthFlow,
}

impl AuthManager {
    /// Build the manager against the configured identity backend
    pub fn from_config(config: Arc<Config>) -> Result<Self, AuthError> {
        let identity = Arc::new(BackendIdentityClient::new(&config.backend)?);
        Self::new(config, identity)
    }

    /// Build the manager with an explicit identity provider
    pub fn new(
        config: Arc<Config>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AuthError> {
        let codec = SessionCodec::new(config.auth.session_secret.as_deref(), config.environment)?;
        let store = SessionStore::new(
            Arc::new(codec),
            CookiePolicy {
                session_cookie_name: config.auth.session_cookie_name.clone(),
                session_max_age: config.auth.session_max_age_secs,
                oauth_max_age: config.auth.oauth_max_age_secs,
                secure: config.secure_cookies(),
            },
        );

        let sessions = SessionManager::new(
            store.clone(),
            Arc::clone(&identity),
            config.auth.login_path.clone(),
        );
        let oauth = OAuthFlow::new(
            store.clone(),
            Arc::clone(&identity),
            config.auth.callback_url(),
        );

        Ok(Self {
            config,
            identity,
            store,
            sessions,
            oauth,
        })
    }

    /// Password sign-in; on success the session cookie is set
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        jar: &mut CookieJar,
    ) -> Result<Session, AuthError> {
        let session = self.identity.sign_in_with_password(email, password).await?;
        self.store.write_session(jar, &session)?;
        Ok(session)
    }

    /// Password sign-up; the session cookie is set only when the backend
    /// auto-confirms the account
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        jar: &mut CookieJar,
    ) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.identity.sign_up_with_password(email, password).await?;
        if let SignUpOutcome::Session(session) = &outcome {
            self.store.write_session(jar, session)?;
        }
        Ok(outcome)
    }

    pub fn sign_out(&self, jar: &mut CookieJar) {
        if let Some(session) = self.store.read_session(jar) {
            info!("User {} signed out", session.user_id);
        }
        self.store.clear_session(jar);
    }

    /// Begin an OAuth sign-in; `provider` comes straight from the URL
    pub fn start_oauth(&self, provider: &str, jar: &mut CookieJar) -> Result<String, AuthError> {
        let provider: OAuthProvider = provider.parse()?;
        self.oauth.begin(provider, jar)
    }

    pub async fn handle_callback(
        &self,
        params: CallbackParams,
        jar: &mut CookieJar,
    ) -> CallbackOutcome {
        self.oauth.complete(params, jar).await
    }

    pub async fn resolve_session(&self, jar: &mut CookieJar) -> Option<Session> {
        self.sessions.resolve_session(jar).await
    }

    pub async fn require_session(&self, jar: &mut CookieJar) -> Result<Session, LoginRedirect> {
        self.sessions.require_session(jar).await
    }

    /// Redirect to the login page carrying an error message
    pub fn login_error(&self, message: &str) -> LoginRedirect {
        LoginRedirect::new(&self.config.auth.login_path, message)
    }

    /// Redirect to the login page carrying an informational message
    pub fn login_notice(&self, message: &str) -> LoginRedirect {
        let query = serde_urlencoded::to_string([("message", message)]).unwrap_or_default();
        LoginRedirect {
            location: format!("{}?{}", self.config.auth.login_path, query),
        }
    }

    /// Get authentication manager configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::MockIdentityProvider;
    use crate::config::Environment;

    fn test_config(environment: Environment, secret: Option<&str>) -> Arc<Config> {
        let mut config = Config::default();
        config.environment = environment;
        config.backend.url = "https://backend.example.com".to_string();
        config.backend.anon_key = "anon".to_string();
        config.auth.session_secret = secret.map(str::to_string);
        Arc::new(config)
    }

    fn sample_session() -> Session {
        Session {
            user_id: "user-1".to_string(),
            email: "guardian@example.com".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_900_000_000,
        }
    }

    #[tokio::test]
    async fn test_sign_in_sets_cookie() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_in_with_password()
            .times(1)
            .returning(|_, _| Ok(sample_session()));

        let config = test_config(Environment::Development, Some("k".repeat(32).as_str()));
        let manager = AuthManager::new(config, Arc::new(identity)).unwrap();
        let mut jar = CookieJar::new();

        let session = manager
            .sign_in("guardian@example.com", "pw", &mut jar)
            .await
            .unwrap();
        assert_eq!(session, sample_session());
        assert_eq!(manager.resolve_session(&mut jar).await, Some(sample_session()));
    }

    #[tokio::test]
    async fn test_sign_in_error_leaves_cookies_alone() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_in_with_password()
            .returning(|_, _| Err(AuthError::Remote("Invalid login credentials".to_string())));

        let manager =
            AuthManager::new(test_config(Environment::Development, None), Arc::new(identity))
                .unwrap();
        let mut jar = CookieJar::new();

        let err = manager.sign_in("a@b.c", "pw", &mut jar).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(jar.delta().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_pending_sets_no_cookie() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_up_with_password()
            .returning(|_, _| Ok(SignUpOutcome::PendingConfirmation));

        let manager =
            AuthManager::new(test_config(Environment::Development, None), Arc::new(identity))
                .unwrap();
        let mut jar = CookieJar::new();

        let outcome = manager.sign_up("a@b.c", "pw", &mut jar).await.unwrap();
        assert_eq!(outcome, SignUpOutcome::PendingConfirmation);
        assert!(jar.delta().is_empty());
    }

    #[tokio::test]
    async fn test_production_without_secret_fails_on_write() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_in_with_password()
            .returning(|_, _| Ok(sample_session()));

        let manager =
            AuthManager::new(test_config(Environment::Production, None), Arc::new(identity))
                .unwrap();
        let mut jar = CookieJar::new();

        let err = manager.sign_in("a@b.c", "pw", &mut jar).await.unwrap_err();
        assert!(err.is_config_error());
        assert!(jar.delta().is_empty());
    }

    #[test]
    fn test_start_oauth_rejects_unknown_provider() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_authorize_url().never();

        let manager =
            AuthManager::new(test_config(Environment::Development, None), Arc::new(identity))
                .unwrap();
        let result = manager.start_oauth("myspace", &mut CookieJar::new());
        assert!(matches!(result, Err(AuthError::UnsupportedProvider(_))));
    }

    #[test]
    fn test_sign_out_clears_cookie() {
        let manager = AuthManager::new(
            test_config(Environment::Development, None),
            Arc::new(MockIdentityProvider::new()),
        )
        .unwrap();
        let mut jar = CookieJar::new();
        manager.sign_out(&mut jar);

        assert!(jar.find_delta("carelink_session").unwrap().is_removal());
    }

    #[test]
    fn test_login_redirects() {
        let manager = AuthManager::new(
            test_config(Environment::Development, None),
            Arc::new(MockIdentityProvider::new()),
        )
        .unwrap();

        assert_eq!(
            manager.login_error("Bad things").location,
            "/auth/login?error=Bad+things"
        );
        assert_eq!(
            manager.login_notice(CONFIRM_EMAIL).location,
            "/auth/login?message=Check+your+email+to+confirm+your+account%2C+then+sign+in."
        );
    }
}
