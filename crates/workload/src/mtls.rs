//! SVID-authenticated channel establishment.
//!
//! Both endpoints exchange a hello carrying their SVID, a claimed SPIFFE
//! ID, an ephemeral key and a signed binding of that key. Verification
//! order is fixed: the peer's SVID is checked against the trust bundle
//! before anything else, the claimed identity must equal the identity the
//! SVID certifies, and only then is the key agreement completed. A hello
//! that fails any check yields no channel and no derived key.

use latticeguard_core::wire::PayloadBuilder;
use latticeguard_core::Nonce;
use latticeguard_crypto::{
    hkdf_derive, symmetric, verify_signature, AeadCiphertext, EcdhKeyPair, SigningKeyPair,
    SymmetricKey,
};
use latticeguard_identity::{SpiffeId, Svid, TrustBundle};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{WorkloadError, WorkloadResult};

const HELLO_TAG: &str = "latticeguard-tls-hello-v1";
const SESSION_INFO: &[u8] = b"latticeguard-mtls-session-v1";

/// Handshake hello: identity claim plus signed ephemeral key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsHello {
    /// Identity the sender claims to hold
    pub claimed_id: SpiffeId,
    /// Credential backing the claim
    pub svid: Svid,
    /// Ephemeral key for this channel
    pub ecdh_public: [u8; 32],
    /// Freshness nonce, also bound into the channel key
    pub nonce: Nonce,
    /// Signature over (ecdh key, nonce) under the SVID key
    pub signature: Vec<u8>,
}

fn hello_payload(ecdh_public: &[u8; 32], nonce: &Nonce) -> Vec<u8> {
    PayloadBuilder::new(HELLO_TAG)
        .field(ecdh_public)
        .field(nonce.as_bytes())
        .build()
}

/// One endpoint's half-open handshake.
pub struct MtlsHandshake {
    ecdh: EcdhKeyPair,
    nonce: Nonce,
}

impl MtlsHandshake {
    /// Produce a hello for the given identity and hold the ephemeral
    /// secret until the peer's hello arrives.
    pub fn initiate(keypair: &SigningKeyPair, svid: &Svid) -> (Self, TlsHello) {
        let ecdh = EcdhKeyPair::generate();
        let nonce = Nonce::generate();
        let hello = TlsHello {
            claimed_id: svid.id.clone(),
            svid: svid.clone(),
            ecdh_public: ecdh.public_bytes(),
            nonce: nonce.clone(),
            signature: keypair.sign(&hello_payload(&ecdh.public_bytes(), &nonce)),
        };
        (Self { ecdh, nonce }, hello)
    }

    /// Verify the peer's hello and derive the channel.
    ///
    /// The peer SVID must verify fresh against the bundle before any other
    /// field of the hello is looked at.
    pub fn complete(
        self,
        peer: &TlsHello,
        bundle: &TrustBundle,
        max_svid_age_ms: u64,
    ) -> WorkloadResult<TlsSession> {
        peer.svid.verify_fresh(bundle, max_svid_age_ms)?;
        if peer.claimed_id != peer.svid.id {
            return Err(WorkloadError::Binding(
                "peer claims an identity its SVID does not certify".to_string(),
            ));
        }
        verify_signature(
            &peer.svid.public_key,
            &hello_payload(&peer.ecdh_public, &peer.nonce),
            &peer.signature,
        )?;

        let shared = self.ecdh.agree(&peer.ecdh_public);
        // Both sides must derive the same salt, so order the nonces
        // lexicographically rather than by role.
        let (lo, hi) = if self.nonce.as_bytes() <= peer.nonce.as_bytes() {
            (&self.nonce, &peer.nonce)
        } else {
            (&peer.nonce, &self.nonce)
        };
        let salt = PayloadBuilder::new("latticeguard-mtls-salt-v1")
            .field(lo.as_bytes())
            .field(hi.as_bytes())
            .build();
        let key = hkdf_derive(&shared, &salt, SESSION_INFO)?;

        info!(peer = %peer.svid.id, "mutually authenticated channel established");
        Ok(TlsSession {
            key,
            peer_id: peer.svid.id.clone(),
        })
    }
}

/// Established channel keyed by the handshake.
pub struct TlsSession {
    key: SymmetricKey,
    peer_id: SpiffeId,
}

impl TlsSession {
    /// The authenticated identity of the peer.
    pub fn peer_id(&self) -> &SpiffeId {
        &self.peer_id
    }

    pub fn send(&self, plaintext: &[u8]) -> WorkloadResult<AeadCiphertext> {
        Ok(symmetric::encrypt(&self.key, plaintext)?)
    }

    pub fn recv(&self, ciphertext: &AeadCiphertext) -> WorkloadResult<Vec<u8>> {
        Ok(symmetric::decrypt(&self.key, ciphertext)?)
    }
}
