//! Protocol message shapes and their canonical signed payloads.
//!
//! Every message that crosses the public channel is a structured tuple of
//! certificates, signatures, keys, nonces and ciphertexts; every signature
//! covers a tagged, length-prefixed payload so it can never be
//! reinterpreted in another context. The region-key handoff is the one
//! exception: it crosses the device-private channel only and is
//! deliberately not serializable.

use latticeguard_core::wire::PayloadBuilder;
use latticeguard_core::{DeviceSerial, Nonce, RegionId, SessionId};
use latticeguard_crypto::{
    hkdf_derive, AeadCiphertext, Certificate, CryptoResult, SealedBox, SymmetricKey,
};
use latticeguard_identity::ValidationAttestation;
use serde::{Deserialize, Serialize};

/// Marker bound into every TEE attestation.
pub const TEE_ATTESTATION_MARKER: &[u8] = b"validated";

/// A TEE's signed announcement of its ephemeral transport key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeeAttestation {
    /// TEE identity key
    pub tee_public: [u8; 32],
    /// Ephemeral X25519 transport key designs are sealed to
    pub transport_public: [u8; 32],
    /// Attestation nonce, echoed back by the tenant
    pub nonce: Nonce,
    /// Creation time (Unix epoch milliseconds)
    pub timestamp: u64,
    /// Signature over (transport key, nonce, marker) under the TEE key
    pub signature: Vec<u8>,
}

pub fn tee_attestation_payload(transport_public: &[u8; 32], nonce: &Nonce) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-tee-attestation-v1")
        .field(transport_public)
        .field(nonce.as_bytes())
        .field(TEE_ATTESTATION_MARKER)
        .build()
}

/// A tenant's design submission, sealed to the TEE transport key.
///
/// Carries two independent signatures: one binding the design to the
/// tenant nonce and session, one echoing the TEE's attestation nonce. A
/// replayed nonce echo can therefore never double as design approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedDesign {
    pub session_id: SessionId,
    pub tenant_public: [u8; 32],
    pub tenant_cert: Certificate,
    /// Design plaintext sealed to the TEE transport key
    pub sealed: SealedBox,
    pub tenant_nonce: Nonce,
    /// Signature over (design, tenant nonce, session id)
    pub design_signature: Vec<u8>,
    /// Signature over the TEE attestation nonce
    pub echo_signature: Vec<u8>,
}

pub fn design_binding_payload(
    design: &[u8],
    tenant_nonce: &Nonce,
    session_id: &SessionId,
) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-design-transfer-v1")
        .field(design)
        .field(tenant_nonce.as_bytes())
        .field(session_id.as_bytes())
        .build()
}

pub fn tee_nonce_echo_payload(tee_nonce: &Nonce) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-tee-nonce-echo-v1")
        .field(tee_nonce.as_bytes())
        .build()
}

/// A tenant's signed request to deploy onto a specific device region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub session_id: SessionId,
    pub tenant_public: [u8; 32],
    pub tenant_cert: Certificate,
    pub serial: DeviceSerial,
    pub region: RegionId,
    pub nonce: Nonce,
    /// Signature over (serial, region, nonce, session id)
    pub signature: Vec<u8>,
}

pub fn deployment_request_payload(
    serial: &DeviceSerial,
    region: RegionId,
    nonce: &Nonce,
    session_id: &SessionId,
) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-deployment-request-v1")
        .field(serial.as_bytes())
        .field(&region.to_le_bytes())
        .field(nonce.as_bytes())
        .field(session_id.as_bytes())
        .build()
}

/// The Security Agent's half of the mutual authentication exchange.
///
/// The ephemeral key is signed under the hardware identity key, binding
/// the key-exchange material to a specific attested device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentKeyExchange {
    pub session_id: SessionId,
    pub ecdh_public: [u8; 32],
    pub nonce: Nonce,
    pub aik_public: [u8; 32],
    /// AIK signature over (ecdh key, nonce, session id)
    pub signature: Vec<u8>,
}

/// The tenant's half of the mutual authentication exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantKeyExchange {
    pub session_id: SessionId,
    pub ecdh_public: [u8; 32],
    pub nonce: Nonce,
    /// Tenant signature over (ecdh key, nonce, session id)
    pub signature: Vec<u8>,
}

pub fn agent_key_exchange_payload(
    ecdh_public: &[u8; 32],
    nonce: &Nonce,
    session_id: &SessionId,
) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-agent-key-exchange-v1")
        .field(ecdh_public)
        .field(nonce.as_bytes())
        .field(session_id.as_bytes())
        .build()
}

pub fn tenant_key_exchange_payload(
    ecdh_public: &[u8; 32],
    nonce: &Nonce,
    session_id: &SessionId,
) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-tenant-key-exchange-v1")
        .field(ecdh_public)
        .field(nonce.as_bytes())
        .field(session_id.as_bytes())
        .build()
}

/// Derive the bitstream session key from the ECDH shared secret.
///
/// The salt binds both exchange nonces and the session id, so two runs
/// that somehow agreed on the same shared secret still derive distinct
/// keys.
pub fn derive_session_key(
    shared: &[u8; 32],
    agent_nonce: &Nonce,
    tenant_nonce: &Nonce,
    session_id: &SessionId,
) -> CryptoResult<SymmetricKey> {
    let salt = PayloadBuilder::new("latticeguard-session-salt-v1")
        .field(agent_nonce.as_bytes())
        .field(tenant_nonce.as_bytes())
        .field(session_id.as_bytes())
        .build();
    hkdf_derive(shared, &salt, b"latticeguard-bitstream-session-v1")
}

/// The validated bitstream, AEAD-encrypted under the session key, with the
/// TEE validation attestation that licenses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBitstream {
    pub session_id: SessionId,
    pub ciphertext: AeadCiphertext,
    pub validation: ValidationAttestation,
}

/// Region key delivered from the Security Agent to a Workload.
///
/// Crosses the device-private channel only; intentionally neither
/// `Serialize` nor `Clone`, so it cannot end up in a public transcript.
#[derive(Debug)]
pub struct RegionKeyHandoff {
    pub region: RegionId,
    pub key: SymmetricKey,
}

/// Plaintext of a workload's attestation request, AEAD-encrypted under the
/// region key before it crosses the device-private channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRequestMsg {
    pub nonce: Nonce,
    pub region: RegionId,
    pub workload_public: [u8; 32],
}

/// Encrypted workload attestation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSvidRequest {
    pub region: RegionId,
    pub ciphertext: AeadCiphertext,
}

/// Challenge nonce issued by the Security Agent to a workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadChallenge {
    pub challenge: Nonce,
    pub region: RegionId,
}

/// A workload's proof of key possession, bound to region and challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeAnswer {
    pub workload_public: [u8; 32],
    /// Signature over (challenge, workload key, region)
    pub signature: Vec<u8>,
}

pub fn challenge_answer_payload(
    challenge: &Nonce,
    workload_public: &[u8; 32],
    region: RegionId,
) -> Vec<u8> {
    PayloadBuilder::new("latticeguard-challenge-answer-v1")
        .field(challenge.as_bytes())
        .field(workload_public)
        .field(&region.to_le_bytes())
        .build()
}
