/// OAuth providers accepted by the identity backend, and the transient
/// transaction stashed in cookies for one authorization round trip.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Apple,
    Kakao,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [
        OAuthProvider::Google,
        OAuthProvider::Apple,
        OAuthProvider::Kakao,
    ];

    /// Provider name as the identity backend expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Apple => "apple",
            OAuthProvider::Kakao => "kakao",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Apple => "Apple",
            OAuthProvider::Kakao => "Kakao",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AuthError::UnsupportedProvider(s.to_string()))
    }
}

/// OAuth transaction state held in cookies between the authorize redirect
/// and the callback. The provider stays a raw string until the callback
/// validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTransaction {
    pub provider: String,
    pub code_verifier: String,
    pub state: String,
}
