//! Core error types.
//!
//! Every failure in the protocol engine falls into one of three classes:
//! a cryptographic verification failure, a binding violation (a value that
//! is structurally valid but bound to the wrong context), or a sequencing
//! violation (a message arriving without its required predecessor). All of
//! them are terminal for the session that produced them and none of them
//! is fatal to the process hosting the session.

use thiserror::Error;

/// Core error type for LatticeGuard.
#[derive(Debug, Error)]
pub enum Error {
    /// Signature, certificate or decryption mismatch
    #[error("Cryptographic verification failed: {0}")]
    Crypto(String),

    /// Structurally valid value bound to the wrong context
    #[error("Binding violation on {field}: {detail}")]
    Binding { field: String, detail: String },

    /// Message arrived without its required predecessor
    #[error("Sequencing violation: {0}")]
    Sequencing(String),

    /// State machine received an event its current state does not accept
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a binding violation.
    pub fn binding(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Binding {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
