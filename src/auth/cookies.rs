/// Session and OAuth Transaction Cookies
///
/// `CookieJar` holds the cookies a request arrived with plus the changes the
/// handler made; `SessionStore` maps sessions and OAuth transactions onto
/// named cookies with fixed security attributes.
use axum::{
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::codec::SessionCodec;
use super::error::AuthError;
use super::provider::OAuthTransaction;
use super::session::Session;

pub const OAUTH_VERIFIER_COOKIE: &str = "oauth-verifier";
pub const OAUTH_STATE_COOKIE: &str = "oauth-state";
pub const OAUTH_PROVIDER_COOKIE: &str = "oauth-provider";

const OAUTH_COOKIES: [&str; 3] = [
    OAUTH_VERIFIER_COOKIE,
    OAUTH_STATE_COOKIE,
    OAUTH_PROVIDER_COOKIE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// A `Set-Cookie` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// HttpOnly, SameSite=Lax, Path=/ cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            http_only: true,
            secure,
            same_site: SameSite::Lax,
            max_age: None,
            expires: None,
        }
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Cookie that deletes `name` in the browser
    pub fn removal(name: impl Into<String>, secure: bool) -> Self {
        Self::new(name, "", secure)
            .max_age(0)
            .expires(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn is_removal(&self) -> bool {
        self.max_age == Some(0)
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}",
            self.name,
            urlencoding::encode(&self.value),
            self.path
        )?;
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age)?;
        }
        if let Some(expires) = self.expires {
            write!(f, "; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT"))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        write!(f, "; SameSite={}", self.same_site.as_str())?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Cookies of one request/response cycle
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    incoming: HashMap<String, String>,
    outgoing: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the request's `Cookie` headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();

        for value in headers.get_all(header::COOKIE) {
            let Ok(cookies) = value.to_str() else {
                continue;
            };
            for cookie in cookies.split(';') {
                let Some((name, value)) = cookie.trim().split_once('=') else {
                    continue;
                };
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                jar.incoming.entry(name.to_string()).or_insert(value);
            }
        }

        jar
    }

    /// Seed an incoming cookie
    #[cfg(test)]
    pub(crate) fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.incoming.insert(name.into(), value.into());
        self
    }

    /// Current value of a cookie, taking this cycle's changes into account
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(cookie) = self.outgoing.iter().rev().find(|c| c.name == name) {
            return (!cookie.is_removal()).then_some(cookie.value.as_str());
        }
        self.incoming.get(name).map(String::as_str)
    }

    pub fn add(&mut self, cookie: Cookie) {
        self.outgoing.retain(|c| c.name != cookie.name);
        self.outgoing.push(cookie);
    }

    /// Cookies to send back with the response
    pub fn delta(&self) -> &[Cookie] {
        &self.outgoing
    }

    pub fn find_delta(&self, name: &str) -> Option<&Cookie> {
        self.outgoing.iter().find(|c| c.name == name)
    }

    /// Append the pending `Set-Cookie` headers to a response
    pub fn apply(&self, mut response: Response) -> Response {
        for cookie in &self.outgoing {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => warn!("Dropping unrepresentable cookie {}: {}", cookie.name, e),
            }
        }
        response
    }
}

/// Lifetimes and flags shared by every cookie this crate writes
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub session_cookie_name: String,
    pub session_max_age: i64,
    pub oauth_max_age: i64,
    pub secure: bool,
}

/// Reads and writes the session and OAuth transaction cookies
#[derive(Debug, Clone)]
pub struct SessionStore {
    codec: Arc<SessionCodec>,
    policy: CookiePolicy,
}

impl SessionStore {
    pub fn new(codec: Arc<SessionCodec>, policy: CookiePolicy) -> Self {
        Self { codec, policy }
    }

    pub fn policy(&self) -> &CookiePolicy {
        &self.policy
    }

    /// Decode the session cookie; absent or undecodable yields `None`
    pub fn read_session(&self, jar: &CookieJar) -> Option<Session> {
        let raw = jar.get(&self.policy.session_cookie_name)?;
        let session = self.codec.deserialize(raw);
        if session.is_none() {
            warn!("Ignoring undecodable session cookie");
        }
        session
    }

    /// Encode and set the session cookie.
    ///
    /// `Expires` is pinned to the session's own expiry alongside the fixed
    /// Max-Age.
    pub fn write_session(&self, jar: &mut CookieJar, session: &Session) -> Result<(), AuthError> {
        let value = self.codec.serialize(session)?;
        let expires = DateTime::from_timestamp(session.expires_at, 0).ok_or_else(|| {
            AuthError::InvalidResponse(format!("expiry out of range: {}", session.expires_at))
        })?;

        jar.add(
            Cookie::new(&self.policy.session_cookie_name, value, self.policy.secure)
                .max_age(self.policy.session_max_age)
                .expires(expires),
        );
        debug!("Session cookie written for user {}", session.user_id);
        Ok(())
    }

    pub fn clear_session(&self, jar: &mut CookieJar) {
        jar.add(Cookie::removal(
            &self.policy.session_cookie_name,
            self.policy.secure,
        ));
    }

    /// Stash verifier, state and provider for one authorization round trip
    pub fn write_oauth_transaction(&self, jar: &mut CookieJar, transaction: &OAuthTransaction) {
        for (name, value) in [
            (OAUTH_VERIFIER_COOKIE, &transaction.code_verifier),
            (OAUTH_STATE_COOKIE, &transaction.state),
            (OAUTH_PROVIDER_COOKIE, &transaction.provider),
        ] {
            jar.add(
                Cookie::new(name, value.as_str(), self.policy.secure)
                    .max_age(self.policy.oauth_max_age),
            );
        }
    }

    /// The stashed transaction, only when all three cookies are present
    pub fn read_oauth_transaction(&self, jar: &CookieJar) -> Option<OAuthTransaction> {
        let non_empty = |name: &str| jar.get(name).filter(|v| !v.is_empty()).map(str::to_string);

        Some(OAuthTransaction {
            code_verifier: non_empty(OAUTH_VERIFIER_COOKIE)?,
            state: non_empty(OAUTH_STATE_COOKIE)?,
            provider: non_empty(OAUTH_PROVIDER_COOKIE)?,
        })
    }

    /// Delete all three transaction cookies together
    pub fn clear_oauth_transaction(&self, jar: &mut CookieJar) {
        for name in OAUTH_COOKIES {
            jar.add(Cookie::removal(name, self.policy.secure));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::security::SessionCipher;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn test_store(secure: bool) -> SessionStore {
        let key: [u8; 32] = rand::random();
        let codec = SessionCodec::with_cipher(SessionCipher::new(&key), Environment::Production);
        SessionStore::new(
            Arc::new(codec),
            CookiePolicy {
                session_cookie_name: "carelink_session".to_string(),
                session_max_age: 604_800,
                oauth_max_age: 600,
                secure,
            },
        )
    }

    fn sample_session() -> Session {
        Session {
            user_id: "user-1".to_string(),
            email: "guardian@example.com".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_cookie_rendering() {
        let cookie = Cookie::new("name", "a b;c", true)
            .max_age(600)
            .expires(DateTime::from_timestamp(1_700_000_000, 0).unwrap());

        assert_eq!(
            cookie.to_string(),
            "name=a%20b%3Bc; Path=/; Max-Age=600; Expires=Tue, 14 Nov 2023 22:13:20 GMT; HttpOnly; SameSite=Lax; Secure"
        );
    }

    #[test]
    fn test_removal_cookie() {
        let cookie = Cookie::removal("oauth-state", false);
        assert!(cookie.is_removal());
        assert_eq!(
            cookie.to_string(),
            "oauth-state=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_jar_parses_request_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; carelink_session=%7B%22a%22%3A1%7D; broken"),
        );

        let jar = CookieJar::from_headers(&headers);
        assert_eq!(jar.get("theme"), Some("dark"));
        assert_eq!(jar.get("carelink_session"), Some(r#"{"a":1}"#));
        assert_eq!(jar.get("broken"), None);
    }

    #[test]
    fn test_jar_reflects_pending_changes() {
        let mut jar = CookieJar::new().with_cookie("a", "1");
        jar.add(Cookie::new("a", "2", false));
        assert_eq!(jar.get("a"), Some("2"));

        jar.add(Cookie::removal("a", false));
        assert_eq!(jar.get("a"), None);
        assert_eq!(jar.delta().len(), 1);
    }

    #[test]
    fn test_apply_appends_set_cookie_headers() {
        let mut jar = CookieJar::new();
        jar.add(Cookie::new("a", "1", false));
        jar.add(Cookie::new("b", "2", false));

        let response = jar.apply(StatusCode::OK.into_response());
        let values: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let store = test_store(true);
        let mut jar = CookieJar::new();
        store.write_session(&mut jar, &sample_session()).unwrap();

        let cookie = jar.find_delta("carelink_session").unwrap();
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, SameSite::Lax);
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.max_age, Some(604_800));
        assert_eq!(cookie.expires.unwrap().timestamp(), 1_700_000_000);

        assert_eq!(store.read_session(&jar), Some(sample_session()));
    }

    #[test]
    fn test_session_survives_header_round_trip() {
        let store = test_store(false);
        let mut jar = CookieJar::new();
        store.write_session(&mut jar, &sample_session()).unwrap();
        let value = jar.find_delta("carelink_session").unwrap().value.clone();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!(
                "carelink_session={}",
                urlencoding::encode(&value)
            ))
            .unwrap(),
        );

        let incoming = CookieJar::from_headers(&headers);
        assert_eq!(store.read_session(&incoming), Some(sample_session()));
    }

    #[test]
    fn test_clear_session() {
        let store = test_store(false);
        let mut jar = CookieJar::new().with_cookie("carelink_session", "anything");
        store.clear_session(&mut jar);

        assert!(jar.find_delta("carelink_session").unwrap().is_removal());
        assert_eq!(store.read_session(&jar), None);
    }

    #[test]
    fn test_oauth_transaction_cookies() {
        let store = test_store(true);
        let mut jar = CookieJar::new();
        let transaction = OAuthTransaction {
            provider: "google".to_string(),
            code_verifier: "verifier".to_string(),
            state: "state".to_string(),
        };

        store.write_oauth_transaction(&mut jar, &transaction);
        for name in OAUTH_COOKIES {
            let cookie = jar.find_delta(name).unwrap();
            assert_eq!(cookie.max_age, Some(600));
            assert!(cookie.http_only);
            assert!(cookie.secure);
        }
        assert_eq!(store.read_oauth_transaction(&jar), Some(transaction));

        store.clear_oauth_transaction(&mut jar);
        assert!(OAUTH_COOKIES.iter().all(|n| jar.find_delta(n).unwrap().is_removal()));
        assert_eq!(store.read_oauth_transaction(&jar), None);
    }

    #[test]
    fn test_partial_oauth_transaction_is_absent() {
        let store = test_store(false);
        let jar = CookieJar::new()
            .with_cookie(OAUTH_STATE_COOKIE, "state")
            .with_cookie(OAUTH_PROVIDER_COOKIE, "google");

        assert_eq!(store.read_oauth_transaction(&jar), None);
    }
}
