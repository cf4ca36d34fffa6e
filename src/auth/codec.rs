// Session Codec
// Pure encoding of a Session to and from the session cookie value

use serde_json::Value;
use tracing::{debug, warn};

use super::error::AuthError;
use super::session::Session;
use crate::config::Environment;
use crate::security::SessionCipher;

/// Result of classifying a raw cookie value.
///
/// Legacy deployments wrote the session as plain JSON; current ones write
/// `iv:tag:ciphertext`. Both shapes are read so an encryption key can be
/// introduced without signing everybody out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedCookie {
    Plaintext(Session),
    Ciphertext(Session),
    Unrecognized,
}

impl DecodedCookie {
    pub fn into_session(self) -> Option<Session> {
        match self {
            DecodedCookie::Plaintext(session) | DecodedCookie::Ciphertext(session) => Some(session),
            DecodedCookie::Unrecognized => None,
        }
    }
}

/// Serializes sessions for the cookie, encrypting when a secret is configured
#[derive(Debug)]
pub struct SessionCodec {
    cipher: Option<SessionCipher>,
    environment: Environment,
}

impl SessionCodec {
    /// Build a codec from the configured session secret.
    ///
    /// The key is derived once here and reused for every cookie.
    pub fn new(secret: Option<&str>, environment: Environment) -> Result<Self, AuthError> {
        let cipher = secret.map(SessionCipher::from_secret).transpose()?;

        if cipher.is_none() {
            if environment.is_production() {
                warn!("No session secret configured in production; session writes will fail");
            } else {
                warn!("No session secret configured; session cookies are written as plaintext");
            }
        }

        Ok(Self {
            cipher,
            environment,
        })
    }

    pub fn with_cipher(cipher: SessionCipher, environment: Environment) -> Self {
        Self {
            cipher: Some(cipher),
            environment,
        }
    }

    /// Encode a session for the cookie.
    ///
    /// Without a key this is a configuration error in production and
    /// plain JSON elsewhere.
    pub fn serialize(&self, session: &Session) -> Result<String, AuthError> {
        let json = serde_json::to_string(session)?;

        match &self.cipher {
            Some(cipher) => Ok(cipher.encrypt(&json)?),
            None if self.environment.is_production() => {
                Err(AuthError::MissingConfig("auth.session_secret".to_string()))
            }
            None => Ok(json),
        }
    }

    /// Decode a cookie value, failing closed to `None`
    pub fn deserialize(&self, raw: &str) -> Option<Session> {
        self.classify(raw).into_session()
    }

    /// Decode a cookie value and report which format it was in
    pub fn classify(&self, raw: &str) -> DecodedCookie {
        if let Some(session) = parse_session_json(raw) {
            debug!("Decoded legacy plaintext session cookie");
            return DecodedCookie::Plaintext(session);
        }

        let Some(cipher) = &self.cipher else {
            return DecodedCookie::Unrecognized;
        };

        match cipher.decrypt(raw) {
            Ok(json) => match parse_session_json(&json) {
                Some(session) => DecodedCookie::Ciphertext(session),
                None => {
                    warn!("Decrypted session cookie has an invalid shape");
                    DecodedCookie::Unrecognized
                }
            },
            Err(e) => {
                debug!("Session cookie could not be decrypted: {}", e);
                DecodedCookie::Unrecognized
            }
        }
    }
}

/// Strict shape check: an object carrying all five fields with the right
/// primitive types and a non-empty user id. Nothing is trusted partially.
fn parse_session_json(raw: &str) -> Option<Session> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    let text = |key: &str| object.get(key)?.as_str().map(str::to_string);

    let session = Session {
        user_id: text("userId")?,
        email: text("email")?,
        access_token: text("accessToken")?,
        refresh_token: text("refreshToken")?,
        expires_at: object.get("expiresAt")?.as_i64()?,
    };

    (!session.user_id.is_empty()).then_some(session)
}
