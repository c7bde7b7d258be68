//! Identity Authority: node and workload attestation handlers.
//!
//! Both handlers take `&self` and share only the immutable issuing key and
//! trust anchors, so one authority value can serve unbounded concurrent,
//! order-independent requests. Every check is a hard gate: the first
//! failure aborts the request with no partial output, and a failed request
//! leaves the authority fully available to every other session.

use latticeguard_core::wire::PayloadBuilder;
use latticeguard_core::{unix_millis, DeviceSerial, Nonce, RegionId};
use latticeguard_crypto::{verify_signature, Certificate, Digest, SigningKeyPair};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attestation::{ValidationAttestation, Verdict};
use crate::bundle::TrustBundle;
use crate::error::{IdentityError, IdentityResult};
use crate::spiffe::{SpiffeId, TrustDomain};
use crate::svid::Svid;

const NODE_QUOTE_TAG: &str = "latticeguard-node-quote-v1";
const WORKLOAD_EVIDENCE_TAG: &str = "latticeguard-workload-evidence-v1";

/// Canonical payload a device signs with its AIK to prove node identity.
pub fn node_quote_payload(aik_public: &[u8; 32], nonce: &Nonce, serial: &DeviceSerial) -> Vec<u8> {
    PayloadBuilder::new(NODE_QUOTE_TAG)
        .field(aik_public)
        .field(nonce.as_bytes())
        .field(serial.as_bytes())
        .build()
}

/// Canonical payload a Security Agent signs with its AIK to vouch for a
/// workload's key and measurement within a region.
pub fn workload_evidence_payload(
    measurement: &Digest,
    workload_public: &[u8; 32],
    region: RegionId,
) -> Vec<u8> {
    PayloadBuilder::new(WORKLOAD_EVIDENCE_TAG)
        .field(measurement.as_bytes())
        .field(workload_public)
        .field(&region.to_le_bytes())
        .build()
}

/// Node attestation request (AIK/EK evidence plus a signed quote).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAttestationRequest {
    /// Device attestation identity key
    pub aik_public: [u8; 32],
    /// AIK certificate, issued under the EK
    pub aik_cert: Certificate,
    /// EK certificate, issued by the manufacturer and bound to the serial
    pub ek_cert: Certificate,
    /// Endorsement key
    pub ek_public: [u8; 32],
    /// AIK signature over (AIK public key, nonce, serial)
    pub quote_signature: Vec<u8>,
    /// Challenge nonce the quote answers
    pub nonce: Nonce,
    /// Claimed hardware serial
    pub serial: DeviceSerial,
}

/// Record of a successfully attested node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedNode {
    pub serial: DeviceSerial,
    pub aik_public: [u8; 32],
    pub verified_at: u64,
}

/// Successful node attestation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAttestationResponse {
    pub svid: Svid,
    pub node: VerifiedNode,
}

/// Workload attestation request, gated on a completed node attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadAttestationRequest {
    /// Runtime measurement hash of the configured region
    pub measurement: Digest,
    /// Workload public key to bind into the SVID
    pub workload_public: [u8; 32],
    /// Node SVID from the earlier node attestation; the explicit predecessor
    /// artifact, never inferred from channel identity
    pub node_svid: Svid,
    /// Region the workload runs in
    pub region: RegionId,
    /// TEE validation attestation for the deployed design
    pub validation: ValidationAttestation,
    /// AIK signature over (measurement, workload key, region)
    pub evidence_signature: Vec<u8>,
    /// Device serial
    pub serial: DeviceSerial,
    /// AIK the evidence verifies under
    pub aik_public: [u8; 32],
}

/// Successful workload attestation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadAttestationResponse {
    pub svid: Svid,
}

/// Issuer and verifier for the trust domain.
///
/// Holds no cross-request mutable state; handlers borrow it immutably.
pub struct IdentityAuthority {
    ca: SigningKeyPair,
    manufacturer_root: [u8; 32],
    trusted_tee: [u8; 32],
    trust_domain: TrustDomain,
}

impl IdentityAuthority {
    pub fn new(
        ca: SigningKeyPair,
        manufacturer_root: [u8; 32],
        trusted_tee: [u8; 32],
        trust_domain: TrustDomain,
    ) -> Self {
        Self {
            ca,
            manufacturer_root,
            trusted_tee,
            trust_domain,
        }
    }

    /// The trust bundle every relying party verifies SVIDs against.
    pub fn bundle(&self) -> TrustBundle {
        TrustBundle::new(self.ca.public_bytes())
    }

    pub fn trust_domain(&self) -> &TrustDomain {
        &self.trust_domain
    }

    /// Node attestation handler.
    ///
    /// Verifies the EK certificate for the claimed serial under the
    /// manufacturer root, the AIK certificate under the EK, the consistency
    /// of both embedded keys, and the quote signature over
    /// (AIK public key, nonce, serial) under the AIK. Only then does it
    /// mint a node SVID over the node identity and the AIK.
    pub fn attest_node(
        &self,
        request: &NodeAttestationRequest,
    ) -> IdentityResult<NodeAttestationResponse> {
        request
            .ek_cert
            .verify(&self.manufacturer_root, Some(&request.serial.0))
            .map_err(|e| {
                warn!(serial = %request.serial, "node attestation rejected: EK certificate: {e}");
                IdentityError::CertificateChain(format!("EK certificate: {e}"))
            })?;

        if request.ek_cert.subject_key != request.ek_public {
            warn!(serial = %request.serial, "node attestation rejected: EK key mismatch");
            return Err(IdentityError::Binding(
                "EK public key does not match EK certificate subject".to_string(),
            ));
        }

        request
            .aik_cert
            .verify(&request.ek_public, None)
            .map_err(|e| {
                warn!(serial = %request.serial, "node attestation rejected: AIK certificate: {e}");
                IdentityError::CertificateChain(format!("AIK certificate: {e}"))
            })?;

        if request.aik_cert.subject_key != request.aik_public {
            warn!(serial = %request.serial, "node attestation rejected: AIK key mismatch");
            return Err(IdentityError::Binding(
                "AIK public key does not match AIK certificate subject".to_string(),
            ));
        }

        let quote = node_quote_payload(&request.aik_public, &request.nonce, &request.serial);
        verify_signature(&request.aik_public, &quote, &request.quote_signature).map_err(|e| {
            warn!(serial = %request.serial, "node attestation rejected: quote: {e}");
            IdentityError::AttestationInvalid(format!("quote: {e}"))
        })?;

        let id = SpiffeId::node(self.trust_domain.clone(), request.serial.clone());
        let svid = Svid::issue(&self.ca, id, request.aik_public);
        let node = VerifiedNode {
            serial: request.serial.clone(),
            aik_public: request.aik_public,
            verified_at: unix_millis(),
        };

        info!(serial = %request.serial, "node attested, SVID issued");
        Ok(NodeAttestationResponse { svid, node })
    }

    /// Workload attestation handler.
    ///
    /// Requires the node SVID from a completed node attestation as an
    /// explicit input, verifies it against the claimed node identity and
    /// AIK, then verifies the TEE validation attestation and the AIK
    /// evidence signature over (measurement, workload key, region) before
    /// minting the workload SVID.
    pub fn attest_workload(
        &self,
        request: &WorkloadAttestationRequest,
    ) -> IdentityResult<WorkloadAttestationResponse> {
        request.node_svid.verify(&self.bundle()).map_err(|e| {
            warn!(serial = %request.serial, "workload attestation rejected: node SVID: {e}");
            IdentityError::Sequencing(format!("node SVID does not verify: {e}"))
        })?;

        let expected_node = SpiffeId::node(self.trust_domain.clone(), request.serial.clone());
        if request.node_svid.id != expected_node {
            warn!(serial = %request.serial, "workload attestation rejected: node identity mismatch");
            return Err(IdentityError::Binding(
                "node SVID names a different device".to_string(),
            ));
        }

        if request.node_svid.public_key != request.aik_public {
            warn!(serial = %request.serial, "workload attestation rejected: AIK not bound to node SVID");
            return Err(IdentityError::Binding(
                "AIK does not match the key bound to the node SVID".to_string(),
            ));
        }

        request.validation.verify(&self.trusted_tee).map_err(|e| {
            warn!(serial = %request.serial, "workload attestation rejected: validation attestation: {e}");
            e
        })?;
        if request.validation.verdict != Verdict::Approved {
            warn!(serial = %request.serial, "workload attestation rejected: design not approved");
            return Err(IdentityError::AttestationInvalid(
                "TEE did not approve the deployed design".to_string(),
            ));
        }

        let evidence = workload_evidence_payload(
            &request.measurement,
            &request.workload_public,
            request.region,
        );
        verify_signature(&request.aik_public, &evidence, &request.evidence_signature).map_err(
            |e| {
                warn!(serial = %request.serial, "workload attestation rejected: evidence: {e}");
                IdentityError::AttestationInvalid(format!("evidence: {e}"))
            },
        )?;

        let id = SpiffeId::workload(
            self.trust_domain.clone(),
            request.serial.clone(),
            request.region,
            request.measurement,
            &request.workload_public,
        );
        let svid = Svid::issue(&self.ca, id, request.workload_public);

        info!(serial = %request.serial, region = %request.region, "workload attested, SVID issued");
        Ok(WorkloadAttestationResponse { svid })
    }
}
