//! Asymmetric encryption as X25519 sealed boxes.
//!
//! The sender generates an ephemeral X25519 key pair, agrees with the
//! recipient's public key, bridges the shared secret through HKDF and seals
//! the plaintext with ChaCha20-Poly1305. Only the holder of the recipient
//! secret can open the box; the ephemeral secret is dropped after the
//! agreement.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::hkdf_derive;
use crate::keys::EcdhKeyPair;
use crate::symmetric::{self, AeadCiphertext, AEAD_NONCE_LEN};

const SEAL_CONTEXT: &[u8] = b"latticeguard-seal-v1";

/// Ciphertext sealed to a recipient's X25519 public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBox {
    /// Sender's ephemeral public key
    pub ephemeral_public: [u8; 32],
    /// AEAD nonce
    pub nonce: [u8; AEAD_NONCE_LEN],
    /// AEAD ciphertext
    pub ciphertext: Vec<u8>,
}

/// Seal a plaintext to a recipient public key.
pub fn seal(recipient_public: &[u8; 32], plaintext: &[u8]) -> CryptoResult<SealedBox> {
    let ephemeral = EphemeralSecret::random_from_rng(&mut OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral).to_bytes();

    let shared = ephemeral.diffie_hellman(&X25519PublicKey::from(*recipient_public));
    let key = seal_key(shared.as_bytes(), &ephemeral_public, recipient_public)?;

    let sealed = symmetric::encrypt(&key, plaintext)?;
    Ok(SealedBox {
        ephemeral_public,
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext,
    })
}

/// Open a sealed box with the recipient key pair.
pub fn open(recipient: &EcdhKeyPair, sealed: &SealedBox) -> CryptoResult<Vec<u8>> {
    let shared = recipient.agree(&sealed.ephemeral_public);
    let key = seal_key(&shared, &sealed.ephemeral_public, &recipient.public_bytes())?;

    symmetric::decrypt(
        &key,
        &AeadCiphertext {
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext.clone(),
        },
    )
    .map_err(|_| CryptoError::Decryption("sealed box does not open with this key".to_string()))
}

// Salt binds the derived key to both public keys of the exchange.
fn seal_key(
    shared: &[u8],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> CryptoResult<crate::symmetric::SymmetricKey> {
    let mut salt = Vec::with_capacity(64);
    salt.extend_from_slice(ephemeral_public);
    salt.extend_from_slice(recipient_public);
    hkdf_derive(shared, &salt, SEAL_CONTEXT)
}
