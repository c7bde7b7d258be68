//! Workload identity lifecycle.
//!
//! # State Transitions
//!
//! ```text
//! Idle
//!     ↓ (receive_region_key)
//! RegionKeyed
//!     ↓ (request_svid)
//! SvidRequested
//!     ↓ (answer_challenge)
//! ChallengeAnswered
//!     ↓ (receive_svid)
//! Identified
//!     ↓ (begin_tls)
//! TlsOffered
//!     ↓ (complete_tls)
//! Identified
//! ```
//!
//! The workload holds no credential until the Security Agent's challenge
//! is answered and the Identity Authority issues the SVID. All traffic to
//! the agent crosses the device-private channel encrypted under the region
//! key.

use latticeguard_core::{Nonce, RegionId};
use latticeguard_crypto::{symmetric, SigningKeyPair, SymmetricKey};
use latticeguard_identity::{SpiffeId, Svid, TrustBundle, WorkloadAttestationResponse};
use latticeguard_deploy::messages::{
    challenge_answer_payload, AttestationRequestMsg, ChallengeAnswer, EncryptedSvidRequest,
    RegionKeyHandoff, WorkloadChallenge,
};
use tracing::{info, warn};

use crate::error::{WorkloadError, WorkloadResult};
use crate::mtls::{MtlsHandshake, TlsHello, TlsSession};

enum WorkloadState {
    Idle,
    RegionKeyed {
        region_key: SymmetricKey,
    },
    SvidRequested,
    ChallengeAnswered,
    Identified {
        svid: Svid,
    },
    TlsOffered {
        svid: Svid,
        handshake: MtlsHandshake,
    },
    Failed,
}

/// One workload's identity session in a configured region.
pub struct WorkloadSession {
    keypair: SigningKeyPair,
    bundle: TrustBundle,
    region: RegionId,
    max_svid_age_ms: u64,
    state: WorkloadState,
}

impl WorkloadSession {
    pub fn new(bundle: TrustBundle, region: RegionId, max_svid_age_ms: u64) -> Self {
        Self {
            keypair: SigningKeyPair::generate(),
            bundle,
            region,
            max_svid_age_ms,
            state: WorkloadState::Idle,
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.keypair.public_bytes()
    }

    /// Accept the region key from the Security Agent.
    pub fn receive_region_key(&mut self, handoff: RegionKeyHandoff) -> WorkloadResult<()> {
        if !matches!(self.state, WorkloadState::Idle) {
            return Err(WorkloadError::InvalidTransition(
                "region key can only arrive once, at startup".to_string(),
            ));
        }
        if handoff.region != self.region {
            return Err(self.fail(WorkloadError::Binding(
                "region key was issued for a different region".to_string(),
            )));
        }
        self.state = WorkloadState::RegionKeyed {
            region_key: handoff.key,
        };
        Ok(())
    }

    /// Request an SVID over the device-private channel.
    pub fn request_svid(&mut self) -> WorkloadResult<EncryptedSvidRequest> {
        let region_key = match std::mem::replace(&mut self.state, WorkloadState::Failed) {
            WorkloadState::RegionKeyed { region_key } => region_key,
            other => {
                self.state = other;
                return Err(WorkloadError::InvalidTransition(
                    "SVID request requires the region key".to_string(),
                ));
            }
        };

        let msg = AttestationRequestMsg {
            nonce: Nonce::generate(),
            region: self.region,
            workload_public: self.keypair.public_bytes(),
        };
        let plaintext = match serde_json::to_vec(&msg) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(WorkloadError::Serialization(e))),
        };
        let ciphertext = match symmetric::encrypt(&region_key, &plaintext) {
            Ok(ciphertext) => ciphertext,
            Err(e) => return Err(self.fail(WorkloadError::Crypto(e))),
        };

        // Region key zeroizes on drop.
        drop(region_key);
        self.state = WorkloadState::SvidRequested;
        Ok(EncryptedSvidRequest {
            region: self.region,
            ciphertext,
        })
    }

    /// Prove possession of the workload key for the agent's challenge.
    pub fn answer_challenge(
        &mut self,
        challenge: &WorkloadChallenge,
    ) -> WorkloadResult<ChallengeAnswer> {
        if !matches!(self.state, WorkloadState::SvidRequested { .. }) {
            return Err(WorkloadError::InvalidTransition(
                "no SVID request in flight".to_string(),
            ));
        }
        if challenge.region != self.region {
            return Err(self.fail(WorkloadError::Binding(
                "challenge names a different region".to_string(),
            )));
        }

        let payload = challenge_answer_payload(
            &challenge.challenge,
            &self.keypair.public_bytes(),
            self.region,
        );
        let answer = ChallengeAnswer {
            workload_public: self.keypair.public_bytes(),
            signature: self.keypair.sign(&payload),
        };

        self.state = WorkloadState::ChallengeAnswered;
        Ok(answer)
    }

    /// Accept the issued SVID after verifying it was minted for this
    /// workload in this region.
    pub fn receive_svid(&mut self, response: &WorkloadAttestationResponse) -> WorkloadResult<()> {
        if !matches!(self.state, WorkloadState::ChallengeAnswered) {
            return Err(WorkloadError::InvalidTransition(
                "no challenge answered".to_string(),
            ));
        }

        if let Err(e) = response.svid.verify_fresh(&self.bundle, self.max_svid_age_ms) {
            return Err(self.fail(WorkloadError::Identity(e)));
        }
        if response.svid.public_key != self.keypair.public_bytes() {
            return Err(self.fail(WorkloadError::Binding(
                "SVID binds a different key".to_string(),
            )));
        }
        match &response.svid.id {
            SpiffeId::Workload { region, .. } if *region == self.region => {}
            _ => {
                return Err(self.fail(WorkloadError::Binding(
                    "SVID names a different region".to_string(),
                )));
            }
        }

        info!(id = %response.svid.id, "workload identified");
        self.state = WorkloadState::Identified {
            svid: response.svid.clone(),
        };
        Ok(())
    }

    /// The credential held after identification.
    pub fn svid(&self) -> WorkloadResult<&Svid> {
        match &self.state {
            WorkloadState::Identified { svid } | WorkloadState::TlsOffered { svid, .. } => {
                Ok(svid)
            }
            _ => Err(WorkloadError::InvalidTransition(
                "workload holds no credential yet".to_string(),
            )),
        }
    }

    /// Open a channel handshake towards a peer workload.
    pub fn begin_tls(&mut self) -> WorkloadResult<TlsHello> {
        let svid = match std::mem::replace(&mut self.state, WorkloadState::Failed) {
            WorkloadState::Identified { svid } => svid,
            other => {
                self.state = other;
                return Err(WorkloadError::InvalidTransition(
                    "channels require an issued SVID".to_string(),
                ));
            }
        };

        let (handshake, hello) = MtlsHandshake::initiate(&self.keypair, &svid);
        self.state = WorkloadState::TlsOffered { svid, handshake };
        Ok(hello)
    }

    /// Verify the peer's hello and derive the channel. The session returns
    /// to `Identified`, ready to open further channels.
    pub fn complete_tls(&mut self, peer: &TlsHello) -> WorkloadResult<TlsSession> {
        let (svid, handshake) = match std::mem::replace(&mut self.state, WorkloadState::Failed) {
            WorkloadState::TlsOffered { svid, handshake } => (svid, handshake),
            other => {
                self.state = other;
                return Err(WorkloadError::InvalidTransition(
                    "no channel handshake in flight".to_string(),
                ));
            }
        };

        let session = match handshake.complete(peer, &self.bundle, self.max_svid_age_ms) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        self.state = WorkloadState::Identified { svid };
        Ok(session)
    }

    fn fail(&mut self, err: WorkloadError) -> WorkloadError {
        warn!(region = %self.region, "workload session failed: {err}");
        self.state = WorkloadState::Failed;
        err
    }
}
