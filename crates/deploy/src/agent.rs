//! Security Agent session.
//!
//! The agent is the on-device authority: it proves the hardware identity
//! to the Identity Authority, verifies tenant allocations, runs the mutual
//! key exchange for bitstream delivery, configures the region and brokers
//! workload attestation over the device-private channel.
//!
//! # State Transitions
//!
//! ```text
//! Idle
//!     ↓ (attest_node)
//! NodeAttested
//!     ↓ (receive_node_svid)
//! SvidReceived
//!     ↓ (verify_allocation)
//! AllocationVerified
//!     ↓ (begin_mutual_auth)
//! KeyOffered
//!     ↓ (complete_mutual_auth)
//! MutuallyAuthenticated
//!     ↓ (receive_bitstream)
//! BitstreamVerified
//!     ↓ (configure_region)
//! Configured
//!     ↓ (issue_region_key)
//! RegionKeyed
//!     ↓ (handle_svid_request)
//! WorkloadChallengeIssued
//!     ↓ (certify_workload)
//! EvidenceSent
//! ```

use latticeguard_core::wire::PayloadBuilder;
use latticeguard_core::{DeviceSerial, Nonce, RegionId, SessionId};
use latticeguard_crypto::{
    digest, hkdf_derive, symmetric, verify_signature, Certificate, Digest, EcdhKeyPair,
    SigningKeyPair, SymmetricKey,
};
use latticeguard_identity::{
    node_quote_payload, workload_evidence_payload, NodeAttestationRequest,
    NodeAttestationResponse, SpiffeId, Svid, TrustBundle, ValidationAttestation, Verdict,
    WorkloadAttestationRequest,
};
use tracing::{info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{DeployError, DeployResult};
use crate::messages::{
    agent_key_exchange_payload, challenge_answer_payload, deployment_request_payload,
    derive_session_key, tenant_key_exchange_payload, AgentKeyExchange, AttestationRequestMsg,
    ChallengeAnswer, DeploymentRequest, EncryptedBitstream, EncryptedSvidRequest,
    RegionKeyHandoff, TenantKeyExchange, WorkloadChallenge,
};

const REGION_KEY_INFO_TAG: &str = "latticeguard-region-key-v1";
const REGION_MEASUREMENT_TAG: &str = "latticeguard-region-measurement-v1";

/// Hardware identity material provisioned into a device at manufacture.
///
/// The endorsement key certificate carries the serial and chains to the
/// manufacturer root; the attestation identity key certificate chains to
/// the endorsement key.
pub struct DeviceIdentity {
    pub aik: SigningKeyPair,
    pub ek_public: [u8; 32],
    pub ek_cert: Certificate,
    pub aik_cert: Certificate,
    pub serial: DeviceSerial,
}

impl DeviceIdentity {
    /// Generate a device identity endorsed by the given manufacturer root.
    pub fn provision(manufacturer_root: &SigningKeyPair, serial: DeviceSerial) -> Self {
        let ek = SigningKeyPair::generate();
        let aik = SigningKeyPair::generate();
        let ek_cert =
            Certificate::issue(manufacturer_root, ek.public_bytes(), Some(&serial.0));
        let aik_cert = Certificate::issue(&ek, aik.public_bytes(), None);
        Self {
            ek_public: ek.public_bytes(),
            aik_cert,
            ek_cert,
            aik,
            serial,
        }
    }
}

enum AgentState {
    Idle,
    NodeAttested,
    SvidReceived,
    AllocationVerified,
    KeyOffered {
        ecdh: EcdhKeyPair,
        nonce: Nonce,
    },
    MutuallyAuthenticated,
    BitstreamVerified {
        bitstream: Zeroizing<Vec<u8>>,
        hash: Digest,
    },
    Configured,
    RegionKeyed,
    WorkloadChallengeIssued {
        challenge: Nonce,
        workload_public: [u8; 32],
    },
    EvidenceSent,
    Failed,
}

/// One Security Agent protocol run on a device.
pub struct AgentSession {
    identity: DeviceIdentity,
    tenant_ca: [u8; 32],
    bundle: TrustBundle,
    state: AgentState,
    node_svid: Option<Svid>,
    tenant_public: Option<[u8; 32]>,
    session_id: Option<SessionId>,
    region: Option<RegionId>,
    session_key: Option<SymmetricKey>,
    validation: Option<ValidationAttestation>,
    measurement: Option<Digest>,
    region_key: Option<SymmetricKey>,
}

impl AgentSession {
    pub fn new(identity: DeviceIdentity, tenant_ca: [u8; 32], bundle: TrustBundle) -> Self {
        Self {
            identity,
            tenant_ca,
            bundle,
            state: AgentState::Idle,
            node_svid: None,
            tenant_public: None,
            session_id: None,
            region: None,
            session_key: None,
            validation: None,
            measurement: None,
            region_key: None,
        }
    }

    pub fn serial(&self) -> &DeviceSerial {
        &self.identity.serial
    }

    pub fn aik_public(&self) -> [u8; 32] {
        self.identity.aik.public_bytes()
    }

    /// Answer the Identity Authority's challenge with the full hardware
    /// evidence: EK certificate, AIK certificate and a quote over
    /// (AIK, nonce, serial).
    pub fn attest_node(&mut self, challenge: &Nonce) -> DeployResult<NodeAttestationRequest> {
        if !matches!(self.state, AgentState::Idle) {
            return Err(DeployError::InvalidTransition(
                "node attestation can only start from Idle".to_string(),
            ));
        }

        let quote = node_quote_payload(&self.aik_public(), challenge, &self.identity.serial);
        let request = NodeAttestationRequest {
            aik_public: self.aik_public(),
            aik_cert: self.identity.aik_cert.clone(),
            ek_cert: self.identity.ek_cert.clone(),
            ek_public: self.identity.ek_public,
            quote_signature: self.identity.aik.sign(&quote),
            nonce: challenge.clone(),
            serial: self.identity.serial.clone(),
        };

        self.state = AgentState::NodeAttested;
        Ok(request)
    }

    /// Accept and verify the node SVID issued for this device.
    pub fn receive_node_svid(&mut self, response: &NodeAttestationResponse) -> DeployResult<()> {
        if !matches!(self.state, AgentState::NodeAttested) {
            return Err(DeployError::InvalidTransition(
                "no node attestation in flight".to_string(),
            ));
        }

        if let Err(e) = response.svid.verify(&self.bundle) {
            return Err(self.fail(DeployError::Identity(e)));
        }
        if response.svid.public_key != self.aik_public() {
            return Err(self.fail(DeployError::Binding(
                "node SVID binds a different key".to_string(),
            )));
        }
        match &response.svid.id {
            SpiffeId::Node { serial, .. } if serial == &self.identity.serial => {}
            _ => {
                return Err(self.fail(DeployError::Binding(
                    "node SVID names a different device".to_string(),
                )));
            }
        }

        info!(serial = %self.identity.serial, "node SVID accepted");
        self.node_svid = Some(response.svid.clone());
        self.state = AgentState::SvidReceived;
        Ok(())
    }

    /// Verify a tenant's deployment request against the tenant CA and this
    /// device's serial.
    pub fn verify_allocation(&mut self, request: &DeploymentRequest) -> DeployResult<()> {
        if !matches!(self.state, AgentState::SvidReceived) {
            return Err(DeployError::InvalidTransition(
                "allocation requires an issued node SVID".to_string(),
            ));
        }

        if let Err(e) = request.tenant_cert.verify(&self.tenant_ca, None) {
            return Err(self.fail(DeployError::Crypto(e)));
        }
        if request.tenant_cert.subject_key != request.tenant_public {
            return Err(self.fail(DeployError::Binding(
                "tenant key does not match certificate subject".to_string(),
            )));
        }
        let payload = deployment_request_payload(
            &request.serial,
            request.region,
            &request.nonce,
            &request.session_id,
        );
        if let Err(e) = verify_signature(&request.tenant_public, &payload, &request.signature) {
            return Err(self.fail(DeployError::Crypto(e)));
        }
        if request.serial != self.identity.serial {
            return Err(self.fail(DeployError::Binding(
                "deployment request targets a different device".to_string(),
            )));
        }

        info!(
            serial = %self.identity.serial,
            region = %request.region,
            session = %request.session_id,
            "tenant allocation verified"
        );
        self.tenant_public = Some(request.tenant_public);
        self.session_id = Some(request.session_id.clone());
        self.region = Some(request.region);
        self.state = AgentState::AllocationVerified;
        Ok(())
    }

    /// Offer an ephemeral key for the bitstream session, signed under the
    /// attestation identity key.
    pub fn begin_mutual_auth(&mut self) -> DeployResult<AgentKeyExchange> {
        if !matches!(self.state, AgentState::AllocationVerified) {
            return Err(DeployError::InvalidTransition(
                "key exchange requires a verified allocation".to_string(),
            ));
        }
        let session_id = self.session_id()?.clone();

        let ecdh = EcdhKeyPair::generate();
        let nonce = Nonce::generate();
        let payload = agent_key_exchange_payload(&ecdh.public_bytes(), &nonce, &session_id);
        let exchange = AgentKeyExchange {
            session_id,
            ecdh_public: ecdh.public_bytes(),
            nonce: nonce.clone(),
            aik_public: self.aik_public(),
            signature: self.identity.aik.sign(&payload),
        };

        self.state = AgentState::KeyOffered { ecdh, nonce };
        Ok(exchange)
    }

    /// Authenticate the tenant's answer and derive the session key.
    pub fn complete_mutual_auth(&mut self, exchange: &TenantKeyExchange) -> DeployResult<()> {
        let (ecdh, agent_nonce) = match std::mem::replace(&mut self.state, AgentState::Failed) {
            AgentState::KeyOffered { ecdh, nonce } => (ecdh, nonce),
            other => {
                self.state = other;
                return Err(DeployError::InvalidTransition(
                    "no key offer in flight".to_string(),
                ));
            }
        };
        let session_id = self.session_id()?.clone();
        let tenant_public = self.tenant_public()?;

        if exchange.session_id != session_id {
            return Err(self.fail(DeployError::Binding(
                "key exchange belongs to a different session".to_string(),
            )));
        }
        let payload =
            tenant_key_exchange_payload(&exchange.ecdh_public, &exchange.nonce, &session_id);
        if let Err(e) = verify_signature(&tenant_public, &payload, &exchange.signature) {
            return Err(self.fail(DeployError::Crypto(e)));
        }

        let shared = ecdh.agree(&exchange.ecdh_public);
        let session_key =
            match derive_session_key(&shared, &agent_nonce, &exchange.nonce, &session_id) {
                Ok(key) => key,
                Err(e) => return Err(self.fail(DeployError::Crypto(e))),
            };

        info!(session = %session_id, "tenant authenticated, session key established");
        self.session_key = Some(session_key);
        self.state = AgentState::MutuallyAuthenticated;
        Ok(())
    }

    /// Decrypt the bitstream and verify it against the TEE validation
    /// attestation carried with it.
    ///
    /// The recomputed bitstream hash must exactly equal the hash the TEE
    /// attested, and the attestation must name the tenant this session
    /// authenticated. A valid attestation for a different design or a
    /// different tenant configures nothing.
    pub fn receive_bitstream(
        &mut self,
        msg: &EncryptedBitstream,
        trusted_tee: &[u8; 32],
    ) -> DeployResult<()> {
        if !matches!(self.state, AgentState::MutuallyAuthenticated) {
            return Err(DeployError::InvalidTransition(
                "bitstream requires mutual authentication".to_string(),
            ));
        }
        let session_id = self.session_id()?.clone();
        let tenant_public = self.tenant_public()?;
        let session_key = match &self.session_key {
            Some(key) => key.clone(),
            None => {
                return Err(self.fail(DeployError::Sequencing(
                    "no session key established".to_string(),
                )))
            }
        };

        if msg.session_id != session_id {
            return Err(self.fail(DeployError::Binding(
                "bitstream belongs to a different session".to_string(),
            )));
        }
        // The plaintext wipes on every exit from here on, verification
        // failures included.
        let bitstream = match symmetric::decrypt(&session_key, &msg.ciphertext) {
            Ok(plain) => Zeroizing::new(plain),
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };
        let hash = digest(&bitstream);

        if let Err(e) = msg.validation.verify(trusted_tee) {
            return Err(self.fail(DeployError::Identity(e)));
        }
        if msg.validation.verdict != Verdict::Approved {
            return Err(self.fail(DeployError::DesignRejected(
                "validation attestation carries a rejection".to_string(),
            )));
        }
        if msg.validation.design_hash != hash {
            return Err(self.fail(DeployError::Binding(
                "bitstream does not match the validated design hash".to_string(),
            )));
        }
        if msg.validation.tenant_public != tenant_public {
            return Err(self.fail(DeployError::Binding(
                "validation was issued for a different tenant".to_string(),
            )));
        }

        info!(session = %session_id, hash = %hash, "bitstream verified against validation");
        self.validation = Some(msg.validation.clone());
        self.state = AgentState::BitstreamVerified { bitstream, hash };
        Ok(())
    }

    /// Load the verified bitstream into the allocated region and record the
    /// runtime measurement. The plaintext bitstream zeroizes on drop.
    pub fn configure_region(&mut self) -> DeployResult<Digest> {
        let (bitstream, hash) =
            match std::mem::replace(&mut self.state, AgentState::Failed) {
                AgentState::BitstreamVerified { bitstream, hash } => (bitstream, hash),
                other => {
                    self.state = other;
                    return Err(DeployError::InvalidTransition(
                        "no verified bitstream to configure".to_string(),
                    ));
                }
            };
        let region = self.region()?;

        // Measurement covers the region slot, so the same design in two
        // regions measures differently.
        let measurement = digest(
            &PayloadBuilder::new(REGION_MEASUREMENT_TAG)
                .field(&region.to_le_bytes())
                .field(hash.as_bytes())
                .build(),
        );
        drop(bitstream);

        info!(region = %region, measurement = %measurement, "region configured");
        self.measurement = Some(measurement);
        self.state = AgentState::Configured;
        Ok(measurement)
    }

    /// Derive the region key and hand it to the workload over the
    /// device-private channel.
    ///
    /// The key is rooted in the attestation identity secret, salted by a
    /// fresh nonce and bound to (region, serial); it never transits an
    /// external channel.
    pub fn issue_region_key(&mut self) -> DeployResult<RegionKeyHandoff> {
        if !matches!(self.state, AgentState::Configured) {
            return Err(DeployError::InvalidTransition(
                "region key requires a configured region".to_string(),
            ));
        }
        let region = self.region()?;

        let region_nonce = Nonce::generate();
        let info = PayloadBuilder::new(REGION_KEY_INFO_TAG)
            .field(&region.to_le_bytes())
            .field(self.identity.serial.as_bytes())
            .build();
        let mut ikm = self.identity.aik.to_bytes();
        let derived = hkdf_derive(&ikm, region_nonce.as_bytes(), &info);
        ikm.zeroize();
        let key = match derived {
            Ok(key) => key,
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };

        self.region_key = Some(key.clone());
        self.state = AgentState::RegionKeyed;
        Ok(RegionKeyHandoff { region, key })
    }

    /// Open a workload's encrypted attestation request and answer with a
    /// possession challenge.
    pub fn handle_svid_request(
        &mut self,
        request: &EncryptedSvidRequest,
    ) -> DeployResult<WorkloadChallenge> {
        if !matches!(self.state, AgentState::RegionKeyed) {
            return Err(DeployError::InvalidTransition(
                "workload attestation requires an issued region key".to_string(),
            ));
        }
        let region = self.region()?;
        let region_key = match &self.region_key {
            Some(key) => key.clone(),
            None => {
                return Err(self.fail(DeployError::Sequencing(
                    "no region key derived".to_string(),
                )))
            }
        };

        if request.region != region {
            return Err(self.fail(DeployError::Binding(
                "attestation request names a different region".to_string(),
            )));
        }
        let plaintext = match symmetric::decrypt(&region_key, &request.ciphertext) {
            Ok(plain) => plain,
            Err(e) => return Err(self.fail(DeployError::Crypto(e))),
        };
        let msg: AttestationRequestMsg = match serde_json::from_slice(&plaintext) {
            Ok(msg) => msg,
            Err(e) => return Err(self.fail(DeployError::Serialization(e))),
        };
        if msg.region != region {
            return Err(self.fail(DeployError::Binding(
                "decrypted request names a different region".to_string(),
            )));
        }

        let challenge = Nonce::generate();
        self.state = AgentState::WorkloadChallengeIssued {
            challenge: challenge.clone(),
            workload_public: msg.workload_public,
        };
        Ok(WorkloadChallenge { challenge, region })
    }

    /// Verify the workload's proof of key possession and assemble the
    /// attestation evidence for the Identity Authority.
    pub fn certify_workload(
        &mut self,
        answer: &ChallengeAnswer,
    ) -> DeployResult<WorkloadAttestationRequest> {
        let (challenge, workload_public) =
            match std::mem::replace(&mut self.state, AgentState::Failed) {
                AgentState::WorkloadChallengeIssued {
                    challenge,
                    workload_public,
                } => (challenge, workload_public),
                other => {
                    self.state = other;
                    return Err(DeployError::InvalidTransition(
                        "no workload challenge in flight".to_string(),
                    ));
                }
            };
        let region = self.region()?;
        let measurement = match self.measurement {
            Some(measurement) => measurement,
            None => {
                return Err(self.fail(DeployError::Sequencing(
                    "region was never measured".to_string(),
                )))
            }
        };
        let node_svid = match &self.node_svid {
            Some(svid) => svid.clone(),
            None => {
                return Err(self.fail(DeployError::Sequencing(
                    "no node SVID held".to_string(),
                )))
            }
        };
        let validation = match &self.validation {
            Some(validation) => validation.clone(),
            None => {
                return Err(self.fail(DeployError::Sequencing(
                    "no validation attestation held".to_string(),
                )))
            }
        };

        if answer.workload_public != workload_public {
            return Err(self.fail(DeployError::Binding(
                "challenge answer names a different workload key".to_string(),
            )));
        }
        let payload = challenge_answer_payload(&challenge, &workload_public, region);
        if let Err(e) = verify_signature(&workload_public, &payload, &answer.signature) {
            return Err(self.fail(DeployError::Crypto(e)));
        }

        let evidence =
            workload_evidence_payload(&measurement, &workload_public, region);
        let request = WorkloadAttestationRequest {
            measurement,
            workload_public,
            node_svid,
            region,
            validation,
            evidence_signature: self.identity.aik.sign(&evidence),
            serial: self.identity.serial.clone(),
            aik_public: self.aik_public(),
        };

        info!(region = %region, "workload possession proven, evidence signed");
        self.state = AgentState::EvidenceSent;
        Ok(request)
    }

    fn session_id(&mut self) -> DeployResult<&SessionId> {
        match self.session_id {
            Some(ref id) => Ok(id),
            None => {
                self.state = AgentState::Failed;
                Err(DeployError::Sequencing(
                    "no session bound to this run".to_string(),
                ))
            }
        }
    }

    fn tenant_public(&mut self) -> DeployResult<[u8; 32]> {
        match self.tenant_public {
            Some(key) => Ok(key),
            None => {
                self.state = AgentState::Failed;
                Err(DeployError::Sequencing(
                    "no tenant bound to this run".to_string(),
                ))
            }
        }
    }

    fn region(&mut self) -> DeployResult<RegionId> {
        match self.region {
            Some(region) => Ok(region),
            None => {
                self.state = AgentState::Failed;
                Err(DeployError::Sequencing(
                    "no region bound to this run".to_string(),
                ))
            }
        }
    }

    fn fail(&mut self, err: DeployError) -> DeployError {
        warn!(serial = %self.identity.serial, "agent session failed: {err}");
        self.state = AgentState::Failed;
        err
    }
}
