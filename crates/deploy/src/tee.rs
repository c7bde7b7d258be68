//! TEE design-validation session.
//!
//! # State Transitions
//!
//! ```text
//! Idle
//!     ↓ (publish_attestation)
//! AttestationSent
//!     ↓ (handle_design, via AwaitingDesign)
//! Validated
//!     ↓ (emit_report)
//! ResultSent
//! ```
//!
//! Any gate failure moves the session to `Failed`; a failed session
//! produces no further events.

use latticeguard_core::{unix_millis, Nonce, SessionId};
use latticeguard_crypto::{digest, seal, verify_signature, EcdhKeyPair, SigningKeyPair};
use latticeguard_identity::{ValidationAttestation, Verdict};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::error::{DeployError, DeployResult};
use crate::messages::{
    design_binding_payload, tee_attestation_payload, tee_nonce_echo_payload, EncryptedDesign,
    TeeAttestation,
};

enum TeeState {
    Idle,
    AttestationSent {
        transport: EcdhKeyPair,
        nonce: Nonce,
    },
    AwaitingDesign,
    Validated {
        report: ValidationAttestation,
    },
    ResultSent,
    Failed,
}

/// One TEE protocol run.
pub struct TeeSession {
    identity: SigningKeyPair,
    tenant_ca: [u8; 32],
    state: TeeState,
}

impl TeeSession {
    /// Create a session for a TEE identity that trusts tenants certified
    /// by the given CA.
    pub fn new(identity: SigningKeyPair, tenant_ca: [u8; 32]) -> Self {
        Self {
            identity,
            tenant_ca,
            state: TeeState::Idle,
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.identity.public_bytes()
    }

    /// Generate the ephemeral transport key and publish the signed
    /// attestation announcing it.
    pub fn publish_attestation(&mut self) -> DeployResult<TeeAttestation> {
        if !matches!(self.state, TeeState::Idle) {
            return Err(DeployError::InvalidTransition(
                "attestation can only be published from Idle".to_string(),
            ));
        }

        let transport = EcdhKeyPair::generate();
        let nonce = Nonce::generate();
        let payload = tee_attestation_payload(&transport.public_bytes(), &nonce);
        let attestation = TeeAttestation {
            tee_public: self.identity.public_bytes(),
            transport_public: transport.public_bytes(),
            nonce: nonce.clone(),
            timestamp: unix_millis(),
            signature: self.identity.sign(&payload),
        };

        self.state = TeeState::AttestationSent { transport, nonce };
        Ok(attestation)
    }

    /// Decrypt and validate a tenant's design submission.
    ///
    /// Verifies the tenant certificate, the design-binding signature and
    /// the attestation-nonce echo before hashing the design. The plaintext
    /// never leaves this method and is zeroized on every exit path.
    pub fn handle_design(&mut self, msg: &EncryptedDesign) -> DeployResult<()> {
        let (transport, nonce) =
            match std::mem::replace(&mut self.state, TeeState::AwaitingDesign) {
                TeeState::AttestationSent { transport, nonce } => (transport, nonce),
                other => {
                    self.state = other;
                    return Err(DeployError::InvalidTransition(
                        "design can only be handled after the attestation was sent".to_string(),
                    ));
                }
            };

        if let Err(e) = msg.tenant_cert.verify(&self.tenant_ca, None) {
            return Err(self.fail(DeployError::Crypto(e)));
        }
        if msg.tenant_cert.subject_key != msg.tenant_public {
            return Err(self.fail(DeployError::Binding(
                "tenant key does not match certificate subject".to_string(),
            )));
        }

        let mut design = match seal::open(&transport, &msg.sealed) {
            Ok(design) => design,
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };

        let binding = design_binding_payload(&design, &msg.tenant_nonce, &msg.session_id);
        if let Err(e) = verify_signature(&msg.tenant_public, &binding, &msg.design_signature) {
            design.zeroize();
            return Err(self.fail(DeployError::Crypto(e)));
        }

        let echo = tee_nonce_echo_payload(&nonce);
        if let Err(e) = verify_signature(&msg.tenant_public, &echo, &msg.echo_signature) {
            design.zeroize();
            return Err(self.fail(DeployError::Crypto(e)));
        }

        let design_hash = digest(&design);
        let verdict = Self::validate_design(&design);
        design.zeroize();

        let report =
            ValidationAttestation::issue(&self.identity, design_hash, verdict, msg.tenant_public);
        info!(session = %msg.session_id, hash = %design_hash, ?verdict, "design validated");
        self.state = TeeState::Validated { report };
        Ok(())
    }

    /// Emit the validation attestation for the handled design.
    pub fn emit_report(&mut self) -> DeployResult<ValidationAttestation> {
        match std::mem::replace(&mut self.state, TeeState::ResultSent) {
            TeeState::Validated { report } => Ok(report),
            other => {
                self.state = other;
                Err(DeployError::InvalidTransition(
                    "no validated design to report".to_string(),
                ))
            }
        }
    }

    // Structural design checks. An empty design can never be a valid
    // bitstream, everything else passes the reference policy.
    fn validate_design(design: &[u8]) -> Verdict {
        if design.is_empty() {
            Verdict::Rejected
        } else {
            Verdict::Approved
        }
    }

    fn fail(&mut self, err: DeployError) -> DeployError {
        warn!("TEE session failed: {err}");
        self.state = TeeState::Failed;
        err
    }
}
