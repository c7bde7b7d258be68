//! Signing and key-agreement key pairs.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};

/// Ed25519 identity key pair.
///
/// The private key never leaves this type; the public key is a pure
/// function of it.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Restore a key pair from raw secret bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Raw secret bytes, used as HKDF input keying material by the owner.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key as raw bytes, the form carried in protocol messages.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a payload, returning the raw signature bytes.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.signing_key.sign(payload).to_bytes().to_vec()
    }
}

/// Verify an Ed25519 signature carried as raw bytes in a message.
///
/// Reconstructs the public key, parses the signature, then verifies; any of
/// the three steps failing is an explicit error.
pub fn verify_signature(
    public_bytes: &[u8; 32],
    payload: &[u8],
    signature: &[u8],
) -> CryptoResult<()> {
    let verifying_key = VerifyingKey::from_bytes(public_bytes)
        .map_err(|_| CryptoError::InvalidKey("malformed Ed25519 public key".to_string()))?;
    let signature = Signature::from_slice(signature)
        .map_err(|_| CryptoError::Signature("malformed signature".to_string()))?;
    verifying_key
        .verify(payload, &signature)
        .map_err(|_| CryptoError::Signature("signature does not match payload".to_string()))
}

/// X25519 key pair for Diffie-Hellman agreement.
///
/// Generated fresh per protocol run; the secret zeroizes on drop.
pub struct EcdhKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl EcdhKeyPair {
    /// Generate a fresh agreement key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(&mut OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public key as raw bytes, the form carried in protocol messages.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Compute the shared secret with a peer's public key.
    ///
    /// `agree(a, pub(b)) == agree(b, pub(a))`.
    pub fn agree(&self, peer_public: &[u8; 32]) -> [u8; 32] {
        let peer = X25519PublicKey::from(*peer_public);
        self.secret.diffie_hellman(&peer).to_bytes()
    }
}
