//! Cryptographic primitive layer for LatticeGuard.
//!
//! All protocol logic in the workspace is written against this crate:
//! Ed25519 signing, X25519 agreement, ChaCha20-Poly1305 authenticated
//! encryption, BLAKE3 hashing, HKDF-SHA256 key derivation, sealed boxes for
//! asymmetric encryption and signed certificates. Operations are pure and
//! side-effect-free; decryption and verification fail explicitly when keys
//! or data mismatch, never silently.

pub mod cert;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod seal;
pub mod symmetric;

pub use cert::Certificate;
pub use error::{CryptoError, CryptoResult};
pub use hash::{digest, Digest};
pub use kdf::{derive_key, hkdf_derive};
pub use keys::{verify_signature, EcdhKeyPair, SigningKeyPair};
pub use seal::{open, seal, SealedBox};
pub use symmetric::{AeadCiphertext, SymmetricKey};

// Re-exported so downstream crates do not need a direct dalek dependency.
pub use ed25519_dalek::{Signature, VerifyingKey};
