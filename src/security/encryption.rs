// Session Encryption Module
// AES-256-GCM with a 16-byte IV and a detached tag, keyed through Argon2id

use aes_gcm::{
    AesGcm,
    aead::{AeadInPlace, KeyInit, consts::U16, generic_array::GenericArray},
    aes::Aes256,
};
use argon2::Argon2;
use tracing::debug;

/// AES-256-GCM parameterised with a 128-bit nonce
type SessionAead = AesGcm<Aes256, U16>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Fixed application salt for key derivation. Changing it invalidates every
/// encrypted cookie in circulation.
const KDF_SALT: &[u8] = b"carelink.session-cookie.v1";

/// Encryption-related errors
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,

    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),
}

/// Symmetric cipher for session cookie payloads.
///
/// Output format is `ivHex:authTagHex:ciphertextHex`, all lowercase.
pub struct SessionCipher {
    cipher: SessionAead,
}

impl SessionCipher {
    /// Create a cipher from a raw 256-bit key
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: SessionAead::new(GenericArray::from_slice(key)),
        }
    }

    /// Derive the key from a passphrase with Argon2id and the application salt.
    ///
    /// The derived key is held for the lifetime of the cipher, so a process
    /// pays the derivation cost once per configured secret.
    pub fn from_secret(secret: &str) -> Result<Self, EncryptionError> {
        let mut key = [0u8; 32];

        Argon2::default()
            .hash_password_into(secret.as_bytes(), KDF_SALT, &mut key)
            .map_err(|e| EncryptionError::KeyDerivationFailed(e.to_string()))?;

        debug!("Derived session encryption key");
        Ok(Self::new(&key))
    }

    /// Encrypt a UTF-8 payload under a fresh random IV
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let iv: [u8; IV_LEN] = rand::random();
        let mut buffer = plaintext.as_bytes().to_vec();

        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(buffer)
        ))
    }

    /// Decrypt an `iv:tag:ciphertext` triplet, verifying the tag
    pub fn decrypt(&self, encoded: &str) -> Result<String, EncryptionError> {
        let mut parts = encoded.split(':');
        let (Some(iv_hex), Some(tag_hex), Some(data_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(EncryptionError::InvalidFormat);
        };

        let iv = hex::decode(iv_hex)?;
        let tag = hex::decode(tag_hex)?;
        let mut buffer = hex::decode(data_hex)?;

        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(EncryptionError::InvalidFormat);
        }

        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(buffer)
            .map_err(|e| EncryptionError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionCipher([REDACTED])")
    }
}
