use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::{AuthConfig, AuthError};

/// Deployment context. Production enables `Secure` cookies and refuses to
/// write plaintext session cookies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Configuration for the carelink server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Hosted backend (identity + data) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend project, e.g. `https://xyz.backend.example`
    #[serde(default)]
    pub url: String,

    /// Public API key sent with every identity request
    #[serde(default)]
    pub anon_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Layered configuration: defaults, then the TOML file (if it exists),
    /// then `CARELINK_*` environment variables (`__` separates sections).
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CARELINK_").split("__"))
    }

    /// Load and validate configuration
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let config: Config = Self::figment(path)
            .extract()
            .map_err(|e| AuthError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.backend.url.is_empty() {
            return Err(AuthError::MissingConfig("backend.url".to_string()));
        }

        let url = url::Url::parse(&self.backend.url).map_err(|e| AuthError::InvalidConfig {
            key: "backend.url".to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AuthError::InvalidConfig {
                key: "backend.url".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        if self.backend.anon_key.is_empty() {
            return Err(AuthError::MissingConfig("backend.anon_key".to_string()));
        }

        if self.backend.timeout_secs == 0 {
            return Err(AuthError::InvalidConfig {
                key: "backend.timeout_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        self.auth.validate(self.environment)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Cookies carry the `Secure` attribute in production
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}
