//! SVID issuance and verification.
//!
//! An SVID binds exactly one (SPIFFE ID, public key, issuance time) triple
//! under the Identity Authority's signature. Verification checks all fields
//! jointly against the trust bundle: a valid signature over one triple can
//! never be combined with substituted fields from another.

use latticeguard_core::wire::PayloadBuilder;
use latticeguard_core::unix_millis;
use latticeguard_crypto::{verify_signature, SigningKeyPair};
use serde::{Deserialize, Serialize};

use crate::bundle::TrustBundle;
use crate::error::{IdentityError, IdentityResult};
use crate::spiffe::SpiffeId;

const SVID_TAG: &str = "latticeguard-svid-v1";

/// Short-lived credential binding a SPIFFE ID to a public key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Svid {
    /// The identity this credential names
    pub id: SpiffeId,
    /// The public key bound to that identity
    pub public_key: [u8; 32],
    /// Issuance time (Unix epoch milliseconds)
    pub issued_at: u64,
    /// Authority signature over the (id, key, time) triple
    pub signature: Vec<u8>,
}

impl Svid {
    /// Issue an SVID under the authority's CA key.
    pub fn issue(ca: &SigningKeyPair, id: SpiffeId, public_key: [u8; 32]) -> Self {
        let issued_at = unix_millis();
        let payload = signing_payload(&id, &public_key, issued_at);
        Self {
            id,
            public_key,
            issued_at,
            signature: ca.sign(&payload),
        }
    }

    /// Verify the joint (id, key, time) binding against the trust bundle.
    pub fn verify(&self, bundle: &TrustBundle) -> IdentityResult<()> {
        let payload = signing_payload(&self.id, &self.public_key, self.issued_at);
        verify_signature(bundle.ca_public(), &payload, &self.signature)
            .map_err(|e| IdentityError::SvidInvalid(e.to_string()))
    }

    /// Verify and additionally enforce a maximum credential age.
    ///
    /// This is the expiry policy of the workspace: no revocation list, just
    /// an issuance-age bound checked at every point of use.
    pub fn verify_fresh(&self, bundle: &TrustBundle, max_age_ms: u64) -> IdentityResult<()> {
        self.verify(bundle)?;
        let now = unix_millis();
        if now.saturating_sub(self.issued_at) > max_age_ms {
            return Err(IdentityError::SvidExpired(format!(
                "issued at {} ms, now {} ms, max age {} ms",
                self.issued_at, now, max_age_ms
            )));
        }
        Ok(())
    }
}

fn signing_payload(id: &SpiffeId, public_key: &[u8; 32], issued_at: u64) -> Vec<u8> {
    PayloadBuilder::new(SVID_TAG)
        .field(&id.canonical_bytes())
        .field(public_key)
        .field(&issued_at.to_le_bytes())
        .build()
}
