/// Identity Backend Client
///
/// Password sign-in, password sign-up, PKCE code exchange and refresh-token
/// exchange against the hosted backend's auth REST API. Every success shape
/// is normalized into a `Session`; every error shape into `AuthError::Remote`.
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::provider::OAuthProvider;
use super::session::{Session, unix_now};
use crate::config::BackendConfig;

/// Outcome of a password sign-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The backend auto-confirmed the account and issued a session
    Session(Session),
    /// Account created; the user must confirm their email before signing in
    PendingConfirmation,
}

/// Remote identity operations the session core depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, AuthError>;

    /// PKCE authorization-code grant
    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthError>;

    /// Refresh-token grant
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    /// Browser-facing authorize URL for the PKCE flow
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        code_challenge: &str,
        state: &str,
        redirect_to: &str,
    ) -> Result<String, AuthError>;
}

/// Session-shaped token response. Every field is optional so that contract
/// violations are reported by name instead of as a generic JSON error.
#[derive(Debug, Deserialize)]
struct TokenResponseRaw {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<UserRaw>,
}

#[derive(Debug, Deserialize)]
struct UserRaw {
    id: Option<String>,
    email: Option<String>,
}

impl TokenResponseRaw {
    /// Build a session, stamping `expires_at` from the local clock
    fn into_session(self, now: i64) -> Result<Session, AuthError> {
        let access_token = require_text(self.access_token, "access_token")?;
        let refresh_token = require_text(self.refresh_token, "refresh_token")?;
        let expires_in = self
            .expires_in
            .filter(|secs| *secs > 0)
            .ok_or_else(|| AuthError::InvalidResponse("missing expires_in".to_string()))?;
        let user = self
            .user
            .ok_or_else(|| AuthError::InvalidResponse("missing user".to_string()))?;
        let user_id = require_text(user.id, "user.id")?;
        let expires_at = now
            .checked_add(expires_in)
            .ok_or_else(|| AuthError::InvalidResponse("expires_in out of range".to_string()))?;

        Ok(Session {
            user_id,
            email: user.email.unwrap_or_default(),
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

fn require_text(value: Option<String>, field: &str) -> Result<String, AuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::InvalidResponse(format!("missing {}", field)))
}

/// Pull a human-readable message out of whichever error key the backend used
fn extract_error_message(body: &Value, status: reqwest::StatusCode) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Authentication request failed with status {}", status))
}

/// Identity client for the hosted backend's `/auth/v1` API
pub struct BackendIdentityClient {
    base_url: url::Url,
    anon_key: String,
    http_client: reqwest::Client,
}

impl BackendIdentityClient {
    pub fn new(config: &BackendConfig) -> Result<Self, AuthError> {
        let mut base_url = url::Url::parse(&config.url)
            .map_err(|e| AuthError::ConfigError(format!("Invalid backend URL: {}", e)))?;
        // `join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        if config.anon_key.is_empty() {
            return Err(AuthError::MissingConfig("backend.anon_key".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            anon_key: config.anon_key.clone(),
            http_client,
        })
    }

    fn endpoint(&self, path: &str, grant_type: Option<&str>) -> Result<url::Url, AuthError> {
        let mut url = self
            .base_url
            .join(&format!("auth/v1/{}", path))
            .map_err(|e| AuthError::ConfigError(format!("Invalid backend URL: {}", e)))?;
        if let Some(grant_type) = grant_type {
            url.query_pairs_mut().append_pair("grant_type", grant_type);
        }
        Ok(url)
    }

    /// POST a JSON body and return the JSON response, mapping non-2xx
    /// statuses to `AuthError::Remote`
    async fn post(&self, url: url::Url, body: Value) -> Result<Value, AuthError> {
        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = extract_error_message(&payload, status);
            warn!("Identity backend rejected request ({}): {}", status, message);
            return Err(AuthError::Remote(message));
        }

        if payload.is_null() {
            return Err(AuthError::InvalidResponse(format!(
                "expected JSON body, got {} bytes",
                text.len()
            )));
        }

        Ok(payload)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let url = self.endpoint("token", Some(grant_type))?;
        let payload = self.post(url, body).await?;
        let raw: TokenResponseRaw = serde_json::from_value(payload)?;
        raw.into_session(unix_now())
    }
}

#[async_trait]
impl IdentityProvider for BackendIdentityClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        info!("Password sign-in succeeded for user {}", session.user_id);
        Ok(session)
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let url = self.endpoint("signup", None)?;
        let payload = self
            .post(url, json!({ "email": email, "password": password }))
            .await?;

        let has_access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .is_some_and(|token| !token.is_empty());
        if !has_access_token {
            info!("Sign-up accepted, email confirmation pending");
            return Ok(SignUpOutcome::PendingConfirmation);
        }

        let raw: TokenResponseRaw = serde_json::from_value(payload)?;
        let session = raw.into_session(unix_now())?;
        info!("Sign-up auto-confirmed for user {}", session.user_id);
        Ok(SignUpOutcome::Session(session))
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .token_grant(
                "pkce",
                json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
            )
            .await?;
        info!("Authorization code exchanged for user {}", session.user_id);
        Ok(session)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let session = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        debug!("Refreshed session for user {}", session.user_id);
        Ok(session)
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        code_challenge: &str,
        state: &str,
        redirect_to: &str,
    ) -> Result<String, AuthError> {
        let mut url = self.endpoint("authorize", None)?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256")
            .append_pair("state", state)
            .append_pair("redirect_to", redirect_to);
        Ok(url.into())
    }
}
