//! Configuration management for LatticeGuard.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub trust_domain: TrustDomainConfig,
    pub protocol: ProtocolConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustDomainConfig {
    /// Trust domain name used in every SPIFFE ID minted by the authority
    pub name: String,
    /// Maximum accepted SVID age in seconds
    pub svid_max_age_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Handshake timeout in milliseconds, enforced by the transport layer
    pub handshake_timeout_ms: u64,
    /// Nonce length in bytes
    pub nonce_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Number of isolated regions on the fabric
    pub region_count: u32,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            trust_domain: TrustDomainConfig {
                name: "fpga.example.org".to_string(),
                svid_max_age_secs: 3600,
            },
            protocol: ProtocolConfig {
                handshake_timeout_ms: 30_000,
                nonce_len: 32,
            },
            device: DeviceConfig { region_count: 4 },
        }
    }
}
