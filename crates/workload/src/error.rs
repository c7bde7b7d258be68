//! Error types for workload sessions.

use thiserror::Error;

/// Errors that can occur in a workload's identity lifecycle.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// Cryptographic primitive failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] latticeguard_crypto::CryptoError),

    /// Identity or credential failure
    #[error("Identity error: {0}")]
    Identity(#[from] latticeguard_identity::IdentityError),

    /// Structurally valid value bound to the wrong context
    #[error("Binding violation: {0}")]
    Binding(String),

    /// Session received an event its current state does not accept
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for workload operations.
pub type WorkloadResult<T> = Result<T, WorkloadError>;
