//! Signed validation attestations.
//!
//! A TEE that has inspected a design emits a validation attestation over
//! the design hash, its verdict, the tenant it validated for and the time
//! of validation. The four fields are signed jointly, so a verdict for one
//! design can never be recombined with the hash of another.

use latticeguard_core::unix_millis;
use latticeguard_core::wire::PayloadBuilder;
use latticeguard_crypto::{verify_signature, Digest, SigningKeyPair};
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, IdentityResult};

const VALIDATION_TAG: &str = "latticeguard-validation-v1";

/// Outcome of a TEE design inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    fn as_byte(self) -> [u8; 1] {
        match self {
            Verdict::Approved => [1],
            Verdict::Rejected => [0],
        }
    }
}

/// A TEE's signed claim about a design measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAttestation {
    /// Hash of the validated design
    pub design_hash: Digest,
    /// Validation verdict
    pub verdict: Verdict,
    /// Tenant the validation was performed for
    pub tenant_public: [u8; 32],
    /// Validation time (Unix epoch milliseconds)
    pub timestamp: u64,
    /// TEE identity key the signature verifies under
    pub tee_public: [u8; 32],
    /// Signature over the joint (hash, verdict, tenant, time) binding
    pub signature: Vec<u8>,
}

impl ValidationAttestation {
    /// Issue an attestation under the TEE's identity key.
    pub fn issue(
        tee: &SigningKeyPair,
        design_hash: Digest,
        verdict: Verdict,
        tenant_public: [u8; 32],
    ) -> Self {
        let timestamp = unix_millis();
        let payload = signing_payload(&design_hash, verdict, &tenant_public, timestamp);
        Self {
            design_hash,
            verdict,
            tenant_public,
            timestamp,
            tee_public: tee.public_bytes(),
            signature: tee.sign(&payload),
        }
    }

    /// Verify this attestation against the expected TEE identity key.
    pub fn verify(&self, expected_tee: &[u8; 32]) -> IdentityResult<()> {
        if &self.tee_public != expected_tee {
            return Err(IdentityError::Binding(
                "attestation signed by an unexpected TEE key".to_string(),
            ));
        }
        let payload = signing_payload(
            &self.design_hash,
            self.verdict,
            &self.tenant_public,
            self.timestamp,
        );
        verify_signature(&self.tee_public, &payload, &self.signature)
            .map_err(|e| IdentityError::AttestationInvalid(e.to_string()))
    }
}

fn signing_payload(
    design_hash: &Digest,
    verdict: Verdict,
    tenant_public: &[u8; 32],
    timestamp: u64,
) -> Vec<u8> {
    PayloadBuilder::new(VALIDATION_TAG)
        .field(design_hash.as_bytes())
        .field(&verdict.as_byte())
        .field(tenant_public)
        .field(&timestamp.to_le_bytes())
        .build()
}
