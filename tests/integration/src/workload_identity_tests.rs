//! Workload attestation, SVID issuance and SVID-authenticated channels.

use latticeguard_core::RegionId;
use latticeguard_deploy::{ChallengeAnswer, DeployError};
use latticeguard_deploy::messages::challenge_answer_payload;
use latticeguard_crypto::SigningKeyPair;
use latticeguard_identity::SpiffeId;
use latticeguard_workload::{MtlsHandshake, WorkloadError};

use crate::test_utils::{identify_workload, run_deployment, TestBed, HOUR_MS};

const DESIGN: &[u8] = b"region-design-v1";

#[test]
fn test_workload_receives_svid_for_its_region() {
    let bed = TestBed::new();
    let mut run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let workload = identify_workload(&bed, &mut run, RegionId(0));

    let svid = workload.svid().unwrap();
    svid.verify(&bed.authority.bundle()).unwrap();
    match &svid.id {
        SpiffeId::Workload { region, measurement, .. } => {
            assert_eq!(*region, RegionId(0));
            assert_eq!(*measurement, run.measurement);
        }
        other => panic!("expected workload identity, got {other}"),
    }
}

#[test]
fn test_workloads_in_distinct_regions_get_distinct_identities() {
    let bed = TestBed::new();
    let mut run_a = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let mut run_b = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(1));

    let workload_a = identify_workload(&bed, &mut run_a, RegionId(0));
    let workload_b = identify_workload(&bed, &mut run_b, RegionId(1));

    let id_a = &workload_a.svid().unwrap().id;
    let id_b = &workload_b.svid().unwrap().id;
    assert_ne!(id_a, id_b);
}

#[test]
fn test_redeployed_region_never_reuses_an_identity() {
    // Same design, same device, same region, deployed twice: the two
    // workload processes hold different keys, so they must receive
    // different identities. One identity bound to two keys would let
    // either workload impersonate the other.
    let bed = TestBed::new();
    let mut run_a = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let mut run_b = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));

    let workload_a = identify_workload(&bed, &mut run_a, RegionId(0));
    let workload_b = identify_workload(&bed, &mut run_b, RegionId(0));

    let svid_a = workload_a.svid().unwrap();
    let svid_b = workload_b.svid().unwrap();
    assert_ne!(svid_a.public_key, svid_b.public_key);
    assert_ne!(svid_a.id, svid_b.id);
}

#[test]
fn test_challenge_answer_bound_to_region() {
    let bed = TestBed::new();
    let mut run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(1));

    let mut workload = bed.workload_session(RegionId(1));
    let handoff = run.agent.issue_region_key().unwrap();
    workload.receive_region_key(handoff).unwrap();
    let request = workload.request_svid().unwrap();
    let challenge = run.agent.handle_svid_request(&request).unwrap();

    // An answer signed for region 0 must not verify in region 1, even
    // under the correct key: the challenge payload binds the region id.
    let signer = SigningKeyPair::generate();
    let stale =
        signer.sign(&challenge_answer_payload(&challenge.challenge, &workload.public_bytes(), RegionId(0)));
    assert!(latticeguard_crypto::verify_signature(
        &signer.public_bytes(),
        &challenge_answer_payload(&challenge.challenge, &workload.public_bytes(), RegionId(1)),
        &stale,
    )
    .is_err());

    // Fed through the agent, the replay dies at the signature gate.
    let replayed = ChallengeAnswer {
        workload_public: workload.public_bytes(),
        signature: stale,
    };
    assert!(matches!(
        run.agent.certify_workload(&replayed),
        Err(DeployError::Crypto(_))
    ));
}

#[test]
fn test_region_key_never_in_public_transcript() {
    let bed = TestBed::new();
    let mut run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));

    let handoff = run.agent.issue_region_key().unwrap();
    let key_hex = hex::encode(handoff.key.as_bytes());
    for message in &run.transcript {
        assert!(!message.contains(&key_hex));
    }
}

#[test]
fn test_mtls_between_two_attested_workloads() {
    let bed = TestBed::new();
    let mut run_a = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let mut run_b = run_deployment(&bed, DESIGN, "FPGA-002", RegionId(0));

    let mut workload_a = identify_workload(&bed, &mut run_a, RegionId(0));
    let mut workload_b = identify_workload(&bed, &mut run_b, RegionId(0));

    let hello_a = workload_a.begin_tls().unwrap();
    let hello_b = workload_b.begin_tls().unwrap();

    let session_a = workload_a.complete_tls(&hello_b).unwrap();
    let session_b = workload_b.complete_tls(&hello_a).unwrap();

    let ciphertext = session_a.send(b"inter-region frame").unwrap();
    assert_eq!(session_b.recv(&ciphertext).unwrap(), b"inter-region frame");
    assert_eq!(session_a.peer_id(), &workload_b.svid().unwrap().id);
}

#[test]
fn test_mtls_requires_authority_issued_svid() {
    let bed = TestBed::new();
    let mut run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let mut workload = identify_workload(&bed, &mut run, RegionId(0));

    // Peer fabricates an SVID under a key the authority never signed with.
    let rogue_ca = SigningKeyPair::generate();
    let rogue_key = SigningKeyPair::generate();
    let rogue_svid = latticeguard_identity::Svid::issue(
        &rogue_ca,
        workload.svid().unwrap().id.clone(),
        rogue_key.public_bytes(),
    );
    let (_, rogue_hello) = MtlsHandshake::initiate(&rogue_key, &rogue_svid);

    workload.begin_tls().unwrap();
    assert!(workload.complete_tls(&rogue_hello).is_err());
}

#[test]
fn test_mtls_aborts_on_claimed_identity_mismatch() {
    let bed = TestBed::new();
    let mut run_a = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let mut run_b = run_deployment(&bed, DESIGN, "FPGA-002", RegionId(0));

    let mut workload_a = identify_workload(&bed, &mut run_a, RegionId(0));
    let mut workload_b = identify_workload(&bed, &mut run_b, RegionId(0));

    workload_a.begin_tls().unwrap();
    let mut hello_b = workload_b.begin_tls().unwrap();
    // Valid SVID, but the peer claims someone else's identity.
    hello_b.claimed_id = workload_a.svid().unwrap().id.clone();

    assert!(matches!(
        workload_a.complete_tls(&hello_b),
        Err(WorkloadError::Binding(_))
    ));
}

#[test]
fn test_stale_svid_fails_freshness_check() {
    let bed = TestBed::new();
    let mut run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let workload = identify_workload(&bed, &mut run, RegionId(0));

    let svid = workload.svid().unwrap();
    let bundle = bed.authority.bundle();
    svid.verify_fresh(&bundle, HOUR_MS).unwrap();

    // A verifier with a zero freshness window treats it as expired.
    std::thread::sleep(std::time::Duration::from_millis(5));
    assert!(svid.verify_fresh(&bundle, 0).is_err());
}
