//! Tenant deployment session.
//!
//! # State Transitions
//!
//! ```text
//! Idle
//!     ↓ (verify_tee)
//! TeeVerified
//!     ↓ (send_design)
//! DesignSent
//!     ↓ (receive_validation)
//! ValidationReceived
//!     ↓ (request_deployment)
//! DeploymentRequested
//!     ↓ (authenticate_agent)
//! MutuallyAuthenticated
//!     ↓ (send_bitstream)
//! BitstreamSent
//! ```
//!
//! The tenant verifies the TEE attestation before sending anything, and
//! authenticates the Security Agent's key-exchange material against the
//! expected hardware identity key before deriving any shared secret.

use latticeguard_core::{DeviceSerial, Nonce, RegionId, SessionId};
use latticeguard_crypto::{
    digest, seal, symmetric, verify_signature, Certificate, Digest, SigningKeyPair, SymmetricKey,
};
use latticeguard_identity::{ValidationAttestation, Verdict};
use tracing::{info, warn};

use crate::error::{DeployError, DeployResult};
use crate::messages::{
    agent_key_exchange_payload, deployment_request_payload, derive_session_key,
    design_binding_payload, tee_attestation_payload, tee_nonce_echo_payload, tenant_key_exchange_payload,
    AgentKeyExchange, DeploymentRequest, EncryptedBitstream, EncryptedDesign, TeeAttestation,
    TenantKeyExchange,
};

enum TenantState {
    Idle,
    TeeVerified {
        tee_public: [u8; 32],
        transport_public: [u8; 32],
        tee_nonce: Nonce,
    },
    DesignSent {
        tee_public: [u8; 32],
        design_hash: Digest,
    },
    ValidationReceived {
        report: ValidationAttestation,
    },
    DeploymentRequested {
        report: ValidationAttestation,
    },
    MutuallyAuthenticated {
        report: ValidationAttestation,
        session_key: SymmetricKey,
    },
    BitstreamSent,
    Failed,
}

/// One tenant protocol run.
pub struct TenantSession {
    keypair: SigningKeyPair,
    certificate: Certificate,
    session_id: SessionId,
    state: TenantState,
}

impl TenantSession {
    /// Start a run with a fresh session identifier.
    pub fn new(keypair: SigningKeyPair, certificate: Certificate) -> Self {
        Self {
            keypair,
            certificate,
            session_id: SessionId::generate(),
            state: TenantState::Idle,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.keypair.public_bytes()
    }

    /// Verify a TEE attestation before anything is sent to it.
    pub fn verify_tee(
        &mut self,
        attestation: &TeeAttestation,
        trusted_tee: &[u8; 32],
    ) -> DeployResult<()> {
        if !matches!(self.state, TenantState::Idle) {
            return Err(DeployError::InvalidTransition(
                "TEE can only be verified from Idle".to_string(),
            ));
        }
        if &attestation.tee_public != trusted_tee {
            return Err(self.fail(DeployError::Binding(
                "attestation does not come from the trusted TEE".to_string(),
            )));
        }
        let payload = tee_attestation_payload(&attestation.transport_public, &attestation.nonce);
        if let Err(e) = verify_signature(&attestation.tee_public, &payload, &attestation.signature)
        {
            return Err(self.fail(DeployError::Crypto(e)));
        }

        self.state = TenantState::TeeVerified {
            tee_public: attestation.tee_public,
            transport_public: attestation.transport_public,
            tee_nonce: attestation.nonce.clone(),
        };
        Ok(())
    }

    /// Seal the design to the TEE transport key and sign its bindings.
    ///
    /// Two independent signatures are produced: one over (design, tenant
    /// nonce, session id), one over the TEE's attestation nonce. A TEE
    /// nonce replay can therefore never be reinterpreted as design
    /// approval.
    pub fn send_design(&mut self, design: &[u8]) -> DeployResult<EncryptedDesign> {
        let (tee_public, transport_public, tee_nonce) =
            match std::mem::replace(&mut self.state, TenantState::Failed) {
                TenantState::TeeVerified {
                    tee_public,
                    transport_public,
                    tee_nonce,
                } => (tee_public, transport_public, tee_nonce),
                other => {
                    self.state = other;
                    return Err(DeployError::InvalidTransition(
                        "design can only be sent after the TEE was verified".to_string(),
                    ));
                }
            };

        let tenant_nonce = Nonce::generate();
        let sealed = match seal::seal(&transport_public, design) {
            Ok(sealed) => sealed,
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };

        let msg = EncryptedDesign {
            session_id: self.session_id.clone(),
            tenant_public: self.keypair.public_bytes(),
            tenant_cert: self.certificate.clone(),
            sealed,
            tenant_nonce: tenant_nonce.clone(),
            design_signature: self.keypair.sign(&design_binding_payload(
                design,
                &tenant_nonce,
                &self.session_id,
            )),
            echo_signature: self.keypair.sign(&tee_nonce_echo_payload(&tee_nonce)),
        };

        self.state = TenantState::DesignSent {
            tee_public,
            design_hash: digest(design),
        };
        Ok(msg)
    }

    /// Accept the TEE's validation attestation for the sent design.
    pub fn receive_validation(&mut self, report: &ValidationAttestation) -> DeployResult<()> {
        let (tee_public, design_hash) =
            match std::mem::replace(&mut self.state, TenantState::Failed) {
                TenantState::DesignSent {
                    tee_public,
                    design_hash,
                } => (tee_public, design_hash),
                other => {
                    self.state = other;
                    return Err(DeployError::InvalidTransition(
                        "no design awaiting validation".to_string(),
                    ));
                }
            };

        if let Err(e) = report.verify(&tee_public) {
            return Err(self.fail(DeployError::Identity(e)));
        }
        if report.tenant_public != self.keypair.public_bytes() {
            return Err(self.fail(DeployError::Binding(
                "validation was issued for a different tenant".to_string(),
            )));
        }
        if report.design_hash != design_hash {
            return Err(self.fail(DeployError::Binding(
                "validation covers a different design".to_string(),
            )));
        }
        if report.verdict != Verdict::Approved {
            return Err(self.fail(DeployError::DesignRejected(
                "TEE rejected the design".to_string(),
            )));
        }

        info!(session = %self.session_id, hash = %report.design_hash, "design validation accepted");
        self.state = TenantState::ValidationReceived {
            report: report.clone(),
        };
        Ok(())
    }

    /// Issue a signed deployment request for a device region.
    pub fn request_deployment(
        &mut self,
        serial: &DeviceSerial,
        region: RegionId,
    ) -> DeployResult<DeploymentRequest> {
        let report = match std::mem::replace(&mut self.state, TenantState::Failed) {
            TenantState::ValidationReceived { report } => report,
            other => {
                self.state = other;
                return Err(DeployError::InvalidTransition(
                    "deployment requires an accepted validation".to_string(),
                ));
            }
        };

        let nonce = Nonce::generate();
        let request = DeploymentRequest {
            session_id: self.session_id.clone(),
            tenant_public: self.keypair.public_bytes(),
            tenant_cert: self.certificate.clone(),
            serial: serial.clone(),
            region,
            nonce: nonce.clone(),
            signature: self.keypair.sign(&deployment_request_payload(
                serial,
                region,
                &nonce,
                &self.session_id,
            )),
        };

        self.state = TenantState::DeploymentRequested { report };
        Ok(request)
    }

    /// Authenticate the Security Agent's ephemeral key and answer with our
    /// own, deriving the bitstream session key.
    ///
    /// Both checks gate the key agreement: the accompanying hardware
    /// identity key must be the expected AIK, and the signature over
    /// (ecdh key, nonce, session id) must verify under it. No shared
    /// secret is derived from unauthenticated material.
    pub fn authenticate_agent(
        &mut self,
        exchange: &AgentKeyExchange,
        expected_aik: &[u8; 32],
    ) -> DeployResult<TenantKeyExchange> {
        let report = match std::mem::replace(&mut self.state, TenantState::Failed) {
            TenantState::DeploymentRequested { report } => report,
            other => {
                self.state = other;
                return Err(DeployError::InvalidTransition(
                    "agent authentication requires a pending deployment request".to_string(),
                ));
            }
        };

        if exchange.session_id != self.session_id {
            return Err(self.fail(DeployError::Binding(
                "key exchange belongs to a different session".to_string(),
            )));
        }
        if &exchange.aik_public != expected_aik {
            return Err(self.fail(DeployError::Binding(
                "key exchange is not signed by the attested device".to_string(),
            )));
        }
        let payload =
            agent_key_exchange_payload(&exchange.ecdh_public, &exchange.nonce, &self.session_id);
        if let Err(e) = verify_signature(&exchange.aik_public, &payload, &exchange.signature) {
            return Err(self.fail(DeployError::Crypto(e)));
        }

        let ecdh = latticeguard_crypto::EcdhKeyPair::generate();
        let tenant_nonce = Nonce::generate();
        let shared = ecdh.agree(&exchange.ecdh_public);
        let session_key = match derive_session_key(
            &shared,
            &exchange.nonce,
            &tenant_nonce,
            &self.session_id,
        ) {
            Ok(key) => key,
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };

        let answer = TenantKeyExchange {
            session_id: self.session_id.clone(),
            ecdh_public: ecdh.public_bytes(),
            nonce: tenant_nonce.clone(),
            signature: self.keypair.sign(&tenant_key_exchange_payload(
                &ecdh.public_bytes(),
                &tenant_nonce,
                &self.session_id,
            )),
        };

        info!(session = %self.session_id, "agent authenticated, session key established");
        self.state = TenantState::MutuallyAuthenticated {
            report,
            session_key,
        };
        Ok(answer)
    }

    /// Encrypt the validated bitstream under the session key.
    pub fn send_bitstream(&mut self, bitstream: &[u8]) -> DeployResult<EncryptedBitstream> {
        let (report, session_key) =
            match std::mem::replace(&mut self.state, TenantState::Failed) {
                TenantState::MutuallyAuthenticated {
                    report,
                    session_key,
                } => (report, session_key),
                other => {
                    self.state = other;
                    return Err(DeployError::InvalidTransition(
                        "bitstream delivery requires mutual authentication".to_string(),
                    ));
                }
            };

        if digest(bitstream) != report.design_hash {
            return Err(self.fail(DeployError::Binding(
                "bitstream does not match the validated design".to_string(),
            )));
        }

        let ciphertext = match symmetric::encrypt(&session_key, bitstream) {
            Ok(ciphertext) => ciphertext,
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };

        self.state = TenantState::BitstreamSent;
        Ok(EncryptedBitstream {
            session_id: self.session_id.clone(),
            ciphertext,
            validation: report,
        })
    }

    fn fail(&mut self, err: DeployError) -> DeployError {
        warn!(session = %self.session_id, "tenant session failed: {err}");
        self.state = TenantState::Failed;
        err
    }
}
