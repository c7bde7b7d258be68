//! End-to-end protocol tests for LatticeGuard
//!
//! This test suite drives the full multi-role protocol across crates:
//! - Design validation and attested bitstream deployment
//! - Hardware-rooted node and workload attestation
//! - Region keying and workload SVID issuance
//! - SVID-authenticated channels between workloads
//! - Authority availability under concurrent sessions

pub mod test_utils;

#[cfg(test)]
mod deployment_flow_tests;

#[cfg(test)]
mod attestation_boundary_tests;

#[cfg(test)]
mod workload_identity_tests;

#[cfg(test)]
mod concurrency_tests;
