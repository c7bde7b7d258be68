//! Key derivation.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};
use crate::symmetric::SymmetricKey;

/// Single-input KDF: derive a symmetric key from input keying material.
pub fn derive_key(ikm: &[u8], info: &[u8]) -> CryptoResult<SymmetricKey> {
    expand(Hkdf::<Sha256>::new(None, ikm), info)
}

/// Salted HKDF: derive a symmetric key from keying material, a salt and a
/// context string. Distinct salts or contexts yield unlinkable keys.
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8]) -> CryptoResult<SymmetricKey> {
    expand(Hkdf::<Sha256>::new(Some(salt), ikm), info)
}

fn expand(hk: Hkdf<Sha256>, info: &[u8]) -> CryptoResult<SymmetricKey> {
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(SymmetricKey::from_bytes(okm))
}
