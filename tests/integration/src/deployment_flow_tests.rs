//! Full deployment pipeline tests: design validation through region
//! configuration.

use latticeguard_core::{DeviceSerial, RegionId};
use latticeguard_crypto::digest;
use latticeguard_deploy::DeployError;

use crate::test_utils::{run_deployment, TestBed};

const DESIGN: &[u8] = b"PROPRIETARY-NETLIST-v42: lut4 a0 b0; dsp48 m0; bram r0";

#[test]
fn test_validated_hash_matches_configured_bitstream() {
    let _ = tracing_subscriber::fmt::try_init();
    let bed = TestBed::new();

    let run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));

    // The hash the TEE attested equals the hash of the design that was
    // sent; the agent's gates let the run reach configuration only because
    // the delivered bitstream hashed to the same value.
    assert_eq!(run.report.design_hash, digest(DESIGN));
}

#[test]
fn test_design_plaintext_never_crosses_public_channel() {
    let bed = TestBed::new();
    let run = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));

    let design_text = std::str::from_utf8(DESIGN).unwrap();
    let design_hex = hex::encode(DESIGN);
    for message in &run.transcript {
        assert!(
            !message.contains(design_text),
            "design plaintext leaked: {message}"
        );
        assert!(
            !message.contains(&design_hex),
            "design plaintext leaked as hex: {message}"
        );
    }
}

#[test]
fn test_rejected_design_blocks_deployment() {
    let bed = TestBed::new();
    let mut tee = bed.tee_session();
    let mut tenant = bed.tenant_session();

    let attestation = tee.publish_attestation().unwrap();
    tenant.verify_tee(&attestation, &bed.tee_public()).unwrap();
    // The TEE policy never approves an empty design.
    let enc = tenant.send_design(b"").unwrap();
    tee.handle_design(&enc).unwrap();
    let report = tee.emit_report().unwrap();

    assert!(matches!(
        tenant.receive_validation(&report),
        Err(DeployError::DesignRejected(_))
    ));
    assert!(tenant
        .request_deployment(&DeviceSerial::new("FPGA-001"), RegionId(0))
        .is_err());
}

#[test]
fn test_tampered_bitstream_rejected_by_agent() {
    let bed = TestBed::new();
    let mut tee = bed.tee_session();
    let mut tenant = bed.tenant_session();
    let mut agent = bed.agent_session("FPGA-001");

    let attestation = tee.publish_attestation().unwrap();
    tenant.verify_tee(&attestation, &bed.tee_public()).unwrap();
    let enc = tenant.send_design(DESIGN).unwrap();
    tee.handle_design(&enc).unwrap();
    let report = tee.emit_report().unwrap();
    tenant.receive_validation(&report).unwrap();

    let challenge = latticeguard_core::Nonce::generate();
    let node_req = agent.attest_node(&challenge).unwrap();
    let node_resp = bed.authority.attest_node(&node_req).unwrap();
    agent.receive_node_svid(&node_resp).unwrap();

    let alloc = tenant
        .request_deployment(&DeviceSerial::new("FPGA-001"), RegionId(0))
        .unwrap();
    agent.verify_allocation(&alloc).unwrap();
    let agent_kx = agent.begin_mutual_auth().unwrap();
    let tenant_kx = tenant
        .authenticate_agent(&agent_kx, &agent.aik_public())
        .unwrap();
    agent.complete_mutual_auth(&tenant_kx).unwrap();

    // Flip a ciphertext byte in flight.
    let mut bitstream = tenant.send_bitstream(DESIGN).unwrap();
    bitstream.ciphertext.ciphertext[0] ^= 0x01;
    assert!(matches!(
        agent.receive_bitstream(&bitstream, &bed.tee_public()),
        Err(DeployError::Crypto(_))
    ));

    // The poisoned session configures nothing.
    assert!(agent.configure_region().is_err());
}

#[test]
fn test_tenant_cannot_swap_bitstream_after_validation() {
    let bed = TestBed::new();
    let mut tee = bed.tee_session();
    let mut tenant = bed.tenant_session();
    let mut agent = bed.agent_session("FPGA-001");

    let attestation = tee.publish_attestation().unwrap();
    tenant.verify_tee(&attestation, &bed.tee_public()).unwrap();
    let enc = tenant.send_design(DESIGN).unwrap();
    tee.handle_design(&enc).unwrap();
    let report = tee.emit_report().unwrap();
    tenant.receive_validation(&report).unwrap();

    let challenge = latticeguard_core::Nonce::generate();
    let node_resp = bed
        .authority
        .attest_node(&agent.attest_node(&challenge).unwrap())
        .unwrap();
    agent.receive_node_svid(&node_resp).unwrap();
    let alloc = tenant
        .request_deployment(&DeviceSerial::new("FPGA-001"), RegionId(0))
        .unwrap();
    agent.verify_allocation(&alloc).unwrap();
    let agent_kx = agent.begin_mutual_auth().unwrap();
    let tenant_kx = tenant
        .authenticate_agent(&agent_kx, &agent.aik_public())
        .unwrap();
    agent.complete_mutual_auth(&tenant_kx).unwrap();

    // A different bitstream than the validated design is refused at the
    // tenant already.
    assert!(matches!(
        tenant.send_bitstream(b"malicious-bitstream"),
        Err(DeployError::Binding(_))
    ));
}

#[test]
fn test_same_design_two_regions_measures_differently() {
    let bed = TestBed::new();
    let run_a = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(0));
    let run_b = run_deployment(&bed, DESIGN, "FPGA-001", RegionId(1));
    assert_ne!(run_a.measurement, run_b.measurement);
}
