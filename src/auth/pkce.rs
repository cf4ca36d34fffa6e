/// PKCE (Proof Key for Code Exchange) Implementation
///
/// Implements RFC 7636 - Proof Key for Code Exchange by OAuth Public Clients.
/// Also generates the opaque anti-CSRF `state` token round-tripped through
/// the authorization redirect.
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Random bytes behind a code_verifier (encodes to 43 characters)
const VERIFIER_BYTES: usize = 32;

/// Random bytes behind an OAuth state token (encodes to 32 characters)
const STATE_BYTES: usize = 24;

/// Generate a cryptographically random code_verifier
///
/// 32 bytes from the thread-local CSPRNG, base64url-encoded without padding.
/// The alphabet is a subset of the RFC 7636 unreserved characters.
pub fn generate_code_verifier() -> String {
    let bytes: [u8; VERIFIER_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Calculate code_challenge from code_verifier using S256 method
///
/// Per RFC 7636: code_challenge = BASE64URL(SHA256(ASCII(code_verifier)))
pub fn generate_code_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    let hash = hasher.finalize();
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate an unpredictable OAuth `state` token.
///
/// Carries no payload; callers compare it by exact equality.
pub fn generate_oauth_state() -> String {
    let bytes: [u8; STATE_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE pair containing both verifier and challenge
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// The code verifier (keep secret, send to token endpoint)
    pub code_verifier: String,

    /// The code challenge (send to authorization endpoint)
    pub code_challenge: String,
}

impl PkcePair {
    /// Generate a new PKCE verifier/challenge pair
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
        }
    }
}
