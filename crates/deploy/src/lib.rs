//! Attestation and deployment orchestrator for LatticeGuard.
//!
//! This crate implements the three interleaved protocol roles of a
//! deployment run:
//!
//! - **TEE**: validates a tenant's design inside an isolated environment
//!   and attests to its hash
//! - **Tenant**: verifies the TEE, delivers the design, requests
//!   deployment and delivers the bitstream over an authenticated session
//! - **Security Agent**: attests the device, mutually authenticates with
//!   the tenant, enforces that only TEE-approved bitstreams configure the
//!   fabric, and keys isolated regions for workloads
//!
//! Each role is a replicable session scoped to one protocol run. Every
//! verification step is a hard gate: a failure moves the session to a
//! terminal state and produces no further events. Retry and backoff are a
//! transport concern, not a protocol one.

pub mod agent;
pub mod error;
pub mod messages;
pub mod tee;
pub mod tenant;

pub use agent::{AgentSession, DeviceIdentity};
pub use error::{DeployError, DeployResult};
pub use messages::{
    AgentKeyExchange, AttestationRequestMsg, ChallengeAnswer, DeploymentRequest, EncryptedBitstream,
    EncryptedDesign, EncryptedSvidRequest, RegionKeyHandoff, TeeAttestation, TenantKeyExchange,
    WorkloadChallenge,
};
pub use tee::TeeSession;
pub use tenant::TenantSession;
