//! Error types for deployment sessions.

use thiserror::Error;

/// Errors that can occur during a deployment protocol run.
///
/// Every variant is terminal for the session that produced it; none of
/// them affects other concurrent sessions.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Cryptographic primitive failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] latticeguard_crypto::CryptoError),

    /// Identity or credential failure
    #[error("Identity error: {0}")]
    Identity(#[from] latticeguard_identity::IdentityError),

    /// Structurally valid value bound to the wrong context
    #[error("Binding violation: {0}")]
    Binding(String),

    /// Message arrived without its required predecessor
    #[error("Sequencing violation: {0}")]
    Sequencing(String),

    /// Session received an event its current state does not accept
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// The TEE did not approve the design
    #[error("Design rejected: {0}")]
    DesignRejected(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;
