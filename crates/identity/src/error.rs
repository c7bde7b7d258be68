//! Error types for identity and credential operations.

use thiserror::Error;

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Cryptographic primitive failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] latticeguard_crypto::CryptoError),

    /// Certificate chain validation failed
    #[error("Certificate chain invalid: {0}")]
    CertificateChain(String),

    /// SVID verification failed
    #[error("SVID invalid: {0}")]
    SvidInvalid(String),

    /// SVID older than the accepted maximum age
    #[error("SVID expired: {0}")]
    SvidExpired(String),

    /// Structurally valid value bound to the wrong context
    #[error("Binding violation: {0}")]
    Binding(String),

    /// Evidence presented without its verified predecessor
    #[error("Sequencing violation: {0}")]
    Sequencing(String),

    /// Attestation verification failed
    #[error("Attestation invalid: {0}")]
    AttestationInvalid(String),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

impl From<IdentityError> for latticeguard_core::Error {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Binding(detail) => {
                latticeguard_core::Error::binding("identity", detail)
            }
            IdentityError::Sequencing(detail) => latticeguard_core::Error::Sequencing(detail),
            other => latticeguard_core::Error::Crypto(other.to_string()),
        }
    }
}
