// Authentication Module
// Password and OAuth2 PKCE sign-in against the identity backend, with the
// session carried in an encrypted cookie

pub mod codec;
pub mod config;
pub mod cookies;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod manager;
pub mod middleware;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod routes;
pub mod session;

pub use codec::{DecodedCookie, SessionCodec};
pub use config::AuthConfig;
pub use cookies::{
    Cookie, CookieJar, CookiePolicy, OAUTH_PROVIDER_COOKIE, OAUTH_STATE_COOKIE,
    OAUTH_VERIFIER_COOKIE, SameSite, SessionStore,
};
pub use error::AuthError;
pub use identity::{BackendIdentityClient, IdentityProvider, SignUpOutcome};
pub use lifecycle::{LoginRedirect, SIGN_IN_REQUIRED, SessionManager, SessionState};
pub use manager::{AuthManager, CONFIRM_EMAIL};
pub use middleware::{optional_auth_middleware, required_auth_middleware};
pub use oauth::{CallbackOutcome, CallbackParams, OAuthFlow};
pub use pkce::PkcePair;
pub use provider::{OAuthProvider, OAuthTransaction};
pub use routes::create_auth_router;
pub use session::Session;
