/// OAuth Authorization-Code Flow with PKCE
///
/// `begin` stashes a fresh verifier, state and provider in cookies and
/// returns the authorize URL; `complete` validates the provider's redirect,
/// exchanges the code and always clears the stashed transaction.
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::cookies::{CookieJar, SessionStore};
use super::error::AuthError;
use super::identity::IdentityProvider;
use super::pkce::{PkcePair, generate_oauth_state};
use super::provider::{OAuthProvider, OAuthTransaction};
use super::session::Session;

/// Query parameters of the authorization server's redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Terminal states of the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The provider redirected back with an error
    ProviderError(String),
    /// Query parameters or stashed cookies missing (expired or never started)
    MissingTransaction,
    UnknownProvider(String),
    /// Cookie state and query state differ; the code is never exchanged
    StateMismatch,
    ExchangeFailed(String),
    Success(Session),
}

impl CallbackOutcome {
    /// Message for the login page; `None` on success
    pub fn error_message(&self) -> Option<String> {
        match self {
            CallbackOutcome::ProviderError(message) | CallbackOutcome::ExchangeFailed(message) => {
                Some(message.clone())
            }
            CallbackOutcome::MissingTransaction => {
                Some("Your sign-in attempt expired. Please try again.".to_string())
            }
            CallbackOutcome::UnknownProvider(provider) => {
                Some(format!("Unsupported sign-in provider: {}", provider))
            }
            CallbackOutcome::StateMismatch => {
                Some("Sign-in could not be verified. Please try again.".to_string())
            }
            CallbackOutcome::Success(_) => None,
        }
    }
}

pub struct OAuthFlow {
    store: SessionStore,
    identity: Arc<dyn IdentityProvider>,
    callback_url: String,
}

impl OAuthFlow {
    pub fn new(
        store: SessionStore,
        identity: Arc<dyn IdentityProvider>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            callback_url: callback_url.into(),
        }
    }

    /// Start a sign-in with `provider`; returns the URL to redirect the
    /// browser to
    pub fn begin(&self, provider: OAuthProvider, jar: &mut CookieJar) -> Result<String, AuthError> {
        let pkce = PkcePair::generate();
        let state = generate_oauth_state();

        let url = self.identity.authorize_url(
            provider,
            &pkce.code_challenge,
            &state,
            &self.callback_url,
        )?;

        self.store.write_oauth_transaction(
            jar,
            &OAuthTransaction {
                provider: provider.as_str().to_string(),
                code_verifier: pkce.code_verifier,
                state,
            },
        );

        info!("Starting OAuth sign-in with {}", provider);
        Ok(url)
    }

    /// Run the callback state machine. The transaction cookies are cleared
    /// in every terminal state; only success writes the session cookie.
    pub async fn complete(&self, params: CallbackParams, jar: &mut CookieJar) -> CallbackOutcome {
        let outcome = self.evaluate(params, jar).await;
        self.store.clear_oauth_transaction(jar);

        match &outcome {
            CallbackOutcome::Success(session) => {
                info!("OAuth sign-in completed for user {}", session.user_id)
            }
            other => warn!("OAuth callback ended in {:?}", other),
        }
        outcome
    }

    async fn evaluate(&self, params: CallbackParams, jar: &mut CookieJar) -> CallbackOutcome {
        if let Some(error) = params.error {
            return CallbackOutcome::ProviderError(params.error_description.unwrap_or(error));
        }

        let (Some(code), Some(query_state), Some(transaction)) = (
            params.code.filter(|c| !c.is_empty()),
            params.state.filter(|s| !s.is_empty()),
            self.store.read_oauth_transaction(jar),
        ) else {
            return CallbackOutcome::MissingTransaction;
        };

        if transaction.provider.parse::<OAuthProvider>().is_err() {
            return CallbackOutcome::UnknownProvider(transaction.provider);
        }

        let states_match: bool = transaction
            .state
            .as_bytes()
            .ct_eq(query_state.as_bytes())
            .into();
        if !states_match {
            return CallbackOutcome::StateMismatch;
        }

        let session = match self
            .identity
            .exchange_code_for_session(&code, &transaction.code_verifier)
            .await
        {
            Ok(session) => session,
            Err(e) => return CallbackOutcome::ExchangeFailed(e.to_string()),
        };

        match self.store.write_session(jar, &session) {
            Ok(()) => CallbackOutcome::Success(session),
            Err(e) => CallbackOutcome::ExchangeFailed(e.to_string()),
        }
    }
}
