//! Symmetric authenticated encryption with ChaCha20-Poly1305.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce as ChaChaNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const AEAD_NONCE_LEN: usize = 12;

/// 256-bit symmetric key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes are never printed.
        write!(f, "SymmetricKey(..)")
    }
}

/// AEAD ciphertext plus the nonce it was sealed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeadCiphertext {
    pub nonce: [u8; AEAD_NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt a plaintext under a symmetric key with a fresh random nonce.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<AeadCiphertext> {
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; AEAD_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = ChaChaNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(AeadCiphertext {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt and authenticate a ciphertext.
///
/// A wrong key, a tampered ciphertext or a mismatched nonce all fail the
/// Poly1305 tag check and surface as `CryptoError::Decryption`.
pub fn decrypt(key: &SymmetricKey, sealed: &AeadCiphertext) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.as_bytes()));
    let nonce = ChaChaNonce::from_slice(&sealed.nonce);

    cipher
        .decrypt(nonce, sealed.ciphertext.as_ref())
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}
