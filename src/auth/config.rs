// Authentication Configuration
// Session secret, cookie names and lifetimes, and redirect targets

use serde::{Deserialize, Serialize};

use super::routes::AUTH_BASE_PATH;
use super::error::AuthError;
use crate::config::Environment;

const MIN_SECRET_LEN: usize = 32;

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Passphrase the session cookie key is derived from.
    /// Required in production; without it development falls back to
    /// plaintext session cookies.
    #[serde(default)]
    pub session_secret: Option<String>,

    /// Session cookie name
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,

    /// Session cookie Max-Age in seconds (default: 7 days)
    #[serde(default = "default_session_max_age")]
    pub session_max_age_secs: i64,

    /// OAuth transaction cookie Max-Age in seconds (default: 10 minutes)
    #[serde(default = "default_oauth_max_age")]
    pub oauth_max_age_secs: i64,

    /// Public origin of this application, used for the OAuth `redirect_to`
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Where unauthenticated requests are sent, with `?error=` or `?message=`
    /// attached. The built-in page is `/auth/login`; a custom page must post
    /// its forms to the `/auth` routes.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Where a completed sign-in lands
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

impl AuthConfig {
    /// Validate configuration values
    pub fn validate(&self, environment: Environment) -> Result<(), AuthError> {
        match self.session_secret.as_deref() {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(AuthError::InvalidConfig {
                    key: "auth.session_secret".to_string(),
                    reason: format!("must be at least {} characters", MIN_SECRET_LEN),
                });
            }
            None if environment.is_production() => {
                return Err(AuthError::MissingConfig("auth.session_secret".to_string()));
            }
            _ => {}
        }

        if self.session_cookie_name.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: "auth.session_cookie_name".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        if self.session_max_age_secs <= 0 {
            return Err(AuthError::InvalidConfig {
                key: "auth.session_max_age_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if self.oauth_max_age_secs <= 0 {
            return Err(AuthError::InvalidConfig {
                key: "auth.oauth_max_age_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        url::Url::parse(&self.site_url).map_err(|e| AuthError::InvalidConfig {
            key: "auth.site_url".to_string(),
            reason: e.to_string(),
        })?;

        for (key, path) in [
            ("auth.login_path", &self.login_path),
            ("auth.landing_path", &self.landing_path),
        ] {
            if !path.starts_with('/') {
                return Err(AuthError::InvalidConfig {
                    key: key.to_string(),
                    reason: "must be an absolute path".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Absolute URL the identity backend redirects back to after consent
    pub fn callback_url(&self) -> String {
        format!(
            "{}{}/callback",
            self.site_url.trim_end_matches('/'),
            AUTH_BASE_PATH
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_cookie_name: default_session_cookie_name(),
            session_max_age_secs: default_session_max_age(),
            oauth_max_age_secs: default_oauth_max_age(),
            site_url: default_site_url(),
            login_path: default_login_path(),
            landing_path: default_landing_path(),
        }
    }
}

// Default value functions
fn default_session_cookie_name() -> String {
    "carelink_session".to_string()
}

fn default_session_max_age() -> i64 {
    60 * 60 * 24 * 7 // 7 days
}

fn default_oauth_max_age() -> i64 {
    60 * 10 // 10 minutes
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_landing_path() -> String {
    "/app".to_string()
}
