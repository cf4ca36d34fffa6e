pub mod encryption;

pub use encryption::{EncryptionError, SessionCipher};
