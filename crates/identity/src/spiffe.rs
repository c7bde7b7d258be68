//! SPIFFE-style identity namespace.
//!
//! Node identities are keyed by hardware serial; workload identities by
//! (serial, region, runtime measurement, instance). The instance component
//! is a digest of the workload public key, so the identity commits to the
//! one key it binds: no two workload keys can ever share an identity, no
//! matter how many times the same design is deployed to the same region.
//! Construction is deterministic and injective: the canonical bytes use
//! length-prefixed field encoding and the rendered path hex-encodes
//! free-form components, so no two distinct input tuples can produce the
//! same identity.

use latticeguard_core::wire::PayloadBuilder;
use latticeguard_core::{DeviceSerial, RegionId};
use latticeguard_crypto::{digest, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A SPIFFE trust domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustDomain(String);

impl TrustDomain {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity namespace entry for a node or a workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpiffeId {
    /// Device identity, keyed by hardware serial
    Node {
        trust_domain: TrustDomain,
        serial: DeviceSerial,
    },
    /// Workload identity, keyed by serial, region, runtime measurement and
    /// the digest of the workload key it was issued for
    Workload {
        trust_domain: TrustDomain,
        serial: DeviceSerial,
        region: RegionId,
        measurement: Digest,
        instance: Digest,
    },
}

const WORKLOAD_INSTANCE_TAG: &str = "spiffe-workload-instance-v1";

impl SpiffeId {
    /// Identity of the device with the given hardware serial.
    pub fn node(trust_domain: TrustDomain, serial: DeviceSerial) -> Self {
        SpiffeId::Node {
            trust_domain,
            serial,
        }
    }

    /// Identity of a workload running in a region of the given device,
    /// bound to the given workload public key.
    pub fn workload(
        trust_domain: TrustDomain,
        serial: DeviceSerial,
        region: RegionId,
        measurement: Digest,
        workload_public: &[u8; 32],
    ) -> Self {
        let instance = digest(
            &PayloadBuilder::new(WORKLOAD_INSTANCE_TAG)
                .field(workload_public)
                .build(),
        );
        SpiffeId::Workload {
            trust_domain,
            serial,
            region,
            measurement,
            instance,
        }
    }

    pub fn trust_domain(&self) -> &TrustDomain {
        match self {
            SpiffeId::Node { trust_domain, .. } => trust_domain,
            SpiffeId::Workload { trust_domain, .. } => trust_domain,
        }
    }

    /// Canonical bytes used wherever this identity is signed or hashed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            SpiffeId::Node {
                trust_domain,
                serial,
            } => PayloadBuilder::new("spiffe-node-v1")
                .field(trust_domain.as_str().as_bytes())
                .field(serial.as_bytes())
                .build(),
            SpiffeId::Workload {
                trust_domain,
                serial,
                region,
                measurement,
                instance,
            } => PayloadBuilder::new("spiffe-workload-v1")
                .field(trust_domain.as_str().as_bytes())
                .field(serial.as_bytes())
                .field(&region.to_le_bytes())
                .field(measurement.as_bytes())
                .field(instance.as_bytes())
                .build(),
        }
    }
}

impl fmt::Display for SpiffeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpiffeId::Node {
                trust_domain,
                serial,
            } => write!(
                f,
                "spiffe://{}/node/{}",
                trust_domain,
                hex::encode(serial.as_bytes())
            ),
            SpiffeId::Workload {
                trust_domain,
                serial,
                region,
                measurement,
                instance,
            } => write!(
                f,
                "spiffe://{}/workload/{}/{}/{}/{}",
                trust_domain,
                hex::encode(serial.as_bytes()),
                region.0,
                measurement,
                instance
            ),
        }
    }
}
