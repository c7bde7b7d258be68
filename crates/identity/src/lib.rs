//! Identity and credential model for LatticeGuard.
//!
//! This crate provides the SPIFFE-style identity namespace, short-lived
//! SVID credentials, trust-bundle distribution and the Identity Authority
//! that verifies hardware-rooted node and workload evidence before minting
//! credentials.
//!
//! # Core Concepts
//!
//! - **SPIFFE ID**: deterministic identity for a node (keyed by hardware
//!   serial) or a workload (keyed by serial, region and runtime measurement)
//! - **SVID**: signed credential binding a SPIFFE ID to a public key and an
//!   issuance time, verifiable against the trust bundle
//! - **Validation attestation**: a TEE's signed claim about a design hash
//! - **Identity Authority**: stateless-per-request issuer and verifier
//!
//! # Security Model
//!
//! Every handler verifies its full evidence chain before producing any
//! output; a single failed check aborts the request with no partial side
//! effects, and the authority remains available for concurrent sessions.

pub mod attestation;
pub mod authority;
pub mod bundle;
pub mod error;
pub mod spiffe;
pub mod svid;

pub use attestation::{ValidationAttestation, Verdict};
pub use authority::{
    node_quote_payload, workload_evidence_payload, IdentityAuthority, NodeAttestationRequest,
    NodeAttestationResponse, VerifiedNode, WorkloadAttestationRequest, WorkloadAttestationResponse,
};
pub use bundle::TrustBundle;
pub use error::{IdentityError, IdentityResult};
pub use spiffe::{SpiffeId, TrustDomain};
pub use svid::Svid;
