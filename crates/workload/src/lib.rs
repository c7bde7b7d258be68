//! Workload runtime identity for LatticeGuard.
//!
//! A workload is a tenant design running in an isolated FPGA region. This
//! crate implements its side of the identity protocol: receiving the
//! region key from the Security Agent, requesting an SVID over the
//! device-private channel, proving key possession, and opening mutually
//! authenticated channels to peer workloads.
//!
//! Channel establishment verifies the peer's SVID against the trust bundle
//! before any key agreement; an unidentified peer gets no channel.

pub mod error;
pub mod mtls;
pub mod runtime;

pub use error::{WorkloadError, WorkloadResult};
pub use mtls::{MtlsHandshake, TlsHello, TlsSession};
pub use runtime::WorkloadSession;
