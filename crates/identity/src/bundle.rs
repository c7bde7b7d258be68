//! Trust bundle distribution.

use serde::{Deserialize, Serialize};

/// Root-of-trust container for a trust domain.
///
/// Immutable once published; exposes nothing beyond the CA verification
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustBundle {
    ca_public: [u8; 32],
}

impl TrustBundle {
    pub fn new(ca_public: [u8; 32]) -> Self {
        Self { ca_public }
    }

    /// The trust domain's CA verification key.
    pub fn ca_public(&self) -> &[u8; 32] {
        &self.ca_public
    }
}
