//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors produced by the primitive layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Certificate verification failed: {0}")]
    Certificate(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

/// Result type for primitive-layer operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for latticeguard_core::Error {
    fn from(err: CryptoError) -> Self {
        latticeguard_core::Error::Crypto(err.to_string())
    }
}
