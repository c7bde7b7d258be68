//! Certificates binding a public key to an issuer.
//!
//! A certificate is a pure function of (subject key, issuer key, optional
//! serial): the issuer signs the canonical encoding of the subject key and,
//! for device certificates, the hardware serial. Verification recomputes
//! the same encoding, so a certificate minted for one serial can never
//! verify for another, and a serial-free certificate can never stand in
//! for a serial-bound one.

use latticeguard_core::wire::PayloadBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{verify_signature, SigningKeyPair};

const CERT_TAG: &str = "latticeguard-certificate-v1";

/// Signed binding of a subject public key to an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Subject's Ed25519 public key
    pub subject_key: [u8; 32],
    /// Hardware serial for device (EK) certificates
    pub serial: Option<String>,
    /// Issuer signature over the canonical (subject, serial) encoding
    pub signature: Vec<u8>,
}

impl Certificate {
    /// Issue a certificate for a subject key, optionally bound to a serial.
    pub fn issue(issuer: &SigningKeyPair, subject_key: [u8; 32], serial: Option<&str>) -> Self {
        let payload = signing_payload(&subject_key, serial);
        Self {
            subject_key,
            serial: serial.map(str::to_string),
            signature: issuer.sign(&payload),
        }
    }

    /// Verify this certificate against an issuer public key.
    ///
    /// When `expected_serial` is given the certificate must carry exactly
    /// that serial; when it is `None` the certificate must carry none.
    pub fn verify(
        &self,
        issuer_public: &[u8; 32],
        expected_serial: Option<&str>,
    ) -> CryptoResult<()> {
        match (self.serial.as_deref(), expected_serial) {
            (Some(have), Some(want)) if have != want => {
                return Err(CryptoError::Certificate(format!(
                    "serial mismatch: certificate is bound to {have}, expected {want}"
                )));
            }
            (Some(_), None) => {
                return Err(CryptoError::Certificate(
                    "unexpected serial-bound certificate".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(CryptoError::Certificate(
                    "certificate carries no serial".to_string(),
                ));
            }
            _ => {}
        }

        let payload = signing_payload(&self.subject_key, self.serial.as_deref());
        verify_signature(issuer_public, &payload, &self.signature)
            .map_err(|e| CryptoError::Certificate(e.to_string()))
    }
}

fn signing_payload(subject_key: &[u8; 32], serial: Option<&str>) -> Vec<u8> {
    let mut builder = PayloadBuilder::new(CERT_TAG).field(subject_key);
    if let Some(serial) = serial {
        builder = builder.field(b"serial").field(serial.as_bytes());
    }
    builder.build()
}
