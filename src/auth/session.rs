// Authenticated Session
// The session record carried in the session cookie

use serde::{Deserialize, Serialize};

/// Authenticated identity of a guardian user.
///
/// Serialized as the canonical cookie JSON:
/// `{"userId","email","accessToken","refreshToken","expiresAt"}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    /// May be empty for providers that do not expose an email
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of `access_token`, Unix seconds
    pub expires_at: i64,
}

impl Session {
    /// True once `now` (Unix seconds) has reached `expires_at`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Current time as Unix seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
