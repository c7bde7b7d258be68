//! Concurrent-session tests: the Identity Authority holds only immutable
//! trust anchors, so any number of sessions may run against it in
//! parallel, and one failed session never affects another.

use std::sync::Arc;

use latticeguard_core::{DeviceSerial, Nonce, RegionId};
use latticeguard_crypto::SigningKeyPair;
use latticeguard_deploy::{AgentSession, DeviceIdentity};
use latticeguard_identity::{IdentityAuthority, TrustDomain};

use crate::test_utils::{identify_workload, run_deployment, TestBed};

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_node_attestations() {
    let manufacturer = Arc::new(SigningKeyPair::generate());
    let authority = Arc::new(IdentityAuthority::new(
        SigningKeyPair::generate(),
        manufacturer.public_bytes(),
        SigningKeyPair::generate().public_bytes(),
        TrustDomain::new("fpga.example.org"),
    ));

    let mut handles = Vec::new();
    for i in 0..16 {
        let authority = Arc::clone(&authority);
        let manufacturer = Arc::clone(&manufacturer);
        handles.push(tokio::spawn(async move {
            let serial = DeviceSerial::new(format!("FPGA-{i:04}"));
            let identity = DeviceIdentity::provision(&manufacturer, serial.clone());
            let mut agent = AgentSession::new(identity, [0u8; 32], authority.bundle());
            let request = agent.attest_node(&Nonce::generate()).expect("evidence");
            let response = authority.attest_node(&request).expect("attested");
            agent.receive_node_svid(&response).expect("SVID accepted");
            serial
        }));
    }

    let mut serials = Vec::new();
    for handle in handles {
        serials.push(handle.await.expect("task completes"));
    }
    serials.sort_by(|a, b| a.0.cmp(&b.0));
    serials.dedup();
    assert_eq!(serials.len(), 16);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_session_does_not_poison_concurrent_ones() {
    let manufacturer = Arc::new(SigningKeyPair::generate());
    let authority = Arc::new(IdentityAuthority::new(
        SigningKeyPair::generate(),
        manufacturer.public_bytes(),
        SigningKeyPair::generate().public_bytes(),
        TrustDomain::new("fpga.example.org"),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let authority = Arc::clone(&authority);
        let manufacturer = Arc::clone(&manufacturer);
        handles.push(tokio::spawn(async move {
            let serial = DeviceSerial::new(format!("FPGA-{i:04}"));
            // Odd sessions present a chain from the wrong root and fail.
            let root = if i % 2 == 0 {
                SigningKeyPair::from_bytes(&manufacturer.to_bytes())
            } else {
                SigningKeyPair::generate()
            };
            let identity = DeviceIdentity::provision(&root, serial);
            let mut agent = AgentSession::new(identity, [0u8; 32], authority.bundle());
            let request = agent.attest_node(&Nonce::generate()).expect("evidence");
            authority.attest_node(&request).is_ok()
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.expect("task completes"));
    }
    for (i, ok) in outcomes.iter().enumerate() {
        assert_eq!(*ok, i % 2 == 0, "session {i}");
    }
}

#[test]
fn test_two_tenants_deploy_to_distinct_devices() {
    let bed = TestBed::new();

    let mut run_a = run_deployment(&bed, b"tenant-a-design", "FPGA-00A", RegionId(0));
    let mut run_b = run_deployment(&bed, b"tenant-b-design", "FPGA-00B", RegionId(0));

    let workload_a = identify_workload(&bed, &mut run_a, RegionId(0));
    let workload_b = identify_workload(&bed, &mut run_b, RegionId(0));

    assert_ne!(run_a.report.design_hash, run_b.report.design_hash);
    assert_ne!(
        workload_a.svid().unwrap().id,
        workload_b.svid().unwrap().id
    );
}
