//! Adversarial tests against the Identity Authority and the session
//! verification gates: misbound certificates, substituted keys and forged
//! attestations.

use latticeguard_core::{DeviceSerial, Nonce, RegionId};
use latticeguard_crypto::{Certificate, SigningKeyPair};
use latticeguard_deploy::{DeployError, DeviceIdentity};
use latticeguard_identity::{node_quote_payload, IdentityError, NodeAttestationRequest};

use crate::test_utils::{run_deployment, TestBed};

#[test]
fn test_ek_certificate_serial_must_match_quote_serial() {
    let bed = TestBed::new();

    // EK endorsed for serial "X", quote claims serial "Y".
    let device = DeviceIdentity::provision(&bed.manufacturer, DeviceSerial::new("X"));
    let claimed = DeviceSerial::new("Y");
    let nonce = Nonce::generate();
    let quote = node_quote_payload(&device.aik.public_bytes(), &nonce, &claimed);
    let request = NodeAttestationRequest {
        aik_public: device.aik.public_bytes(),
        aik_cert: device.aik_cert.clone(),
        ek_cert: device.ek_cert.clone(),
        ek_public: device.ek_public,
        quote_signature: device.aik.sign(&quote),
        nonce,
        serial: claimed,
    };

    assert!(matches!(
        bed.authority.attest_node(&request),
        Err(IdentityError::CertificateChain(_))
    ));
}

#[test]
fn test_unendorsed_device_rejected() {
    let bed = TestBed::new();
    // Chain rooted in a different manufacturer key.
    let rogue_root = SigningKeyPair::generate();
    let device = DeviceIdentity::provision(&rogue_root, DeviceSerial::new("FPGA-001"));
    let nonce = Nonce::generate();
    let quote = node_quote_payload(&device.aik.public_bytes(), &nonce, &device.serial);
    let request = NodeAttestationRequest {
        aik_public: device.aik.public_bytes(),
        aik_cert: device.aik_cert.clone(),
        ek_cert: device.ek_cert.clone(),
        ek_public: device.ek_public,
        quote_signature: device.aik.sign(&quote),
        nonce,
        serial: device.serial.clone(),
    };

    assert!(bed.authority.attest_node(&request).is_err());
}

#[test]
fn test_substituted_aik_rejected() {
    let bed = TestBed::new();
    let device = DeviceIdentity::provision(&bed.manufacturer, DeviceSerial::new("FPGA-001"));
    // Attacker presents the genuine certificate chain but their own AIK.
    let attacker_aik = SigningKeyPair::generate();
    let nonce = Nonce::generate();
    let quote = node_quote_payload(&attacker_aik.public_bytes(), &nonce, &device.serial);
    let request = NodeAttestationRequest {
        aik_public: attacker_aik.public_bytes(),
        aik_cert: device.aik_cert.clone(),
        ek_cert: device.ek_cert.clone(),
        ek_public: device.ek_public,
        quote_signature: attacker_aik.sign(&quote),
        nonce,
        serial: device.serial.clone(),
    };

    assert!(bed.authority.attest_node(&request).is_err());
}

#[test]
fn test_forged_tee_attestation_not_accepted_by_tenant() {
    let bed = TestBed::new();
    let mut tenant = bed.tenant_session();

    // An attacker runs their own "TEE" and replays its attestation.
    let rogue_tee = SigningKeyPair::generate();
    let mut rogue_session = latticeguard_deploy::TeeSession::new(
        rogue_tee,
        bed.tenant_ca.public_bytes(),
    );
    let forged = rogue_session.publish_attestation().unwrap();

    assert!(matches!(
        tenant.verify_tee(&forged, &bed.tee_public()),
        Err(DeployError::Binding(_))
    ));
}

#[test]
fn test_allocation_bound_to_device_serial() {
    let bed = TestBed::new();
    let mut tee = bed.tee_session();
    let mut tenant = bed.tenant_session();
    // Agent for a different device than the tenant allocates.
    let mut agent = bed.agent_session("FPGA-002");

    let attestation = tee.publish_attestation().unwrap();
    tenant.verify_tee(&attestation, &bed.tee_public()).unwrap();
    let enc = tenant.send_design(b"design").unwrap();
    tee.handle_design(&enc).unwrap();
    let report = tee.emit_report().unwrap();
    tenant.receive_validation(&report).unwrap();

    let node_resp = bed
        .authority
        .attest_node(&agent.attest_node(&Nonce::generate()).unwrap())
        .unwrap();
    agent.receive_node_svid(&node_resp).unwrap();

    let alloc = tenant
        .request_deployment(&DeviceSerial::new("FPGA-001"), RegionId(0))
        .unwrap();
    assert!(matches!(
        agent.verify_allocation(&alloc),
        Err(DeployError::Binding(_))
    ));
}

#[test]
fn test_uncertified_tenant_rejected_by_tee() {
    let bed = TestBed::new();
    let mut tee = bed.tee_session();
    // Tenant holds a certificate from an unrelated CA.
    let rogue_ca = SigningKeyPair::generate();
    let keypair = SigningKeyPair::generate();
    let cert = Certificate::issue(&rogue_ca, keypair.public_bytes(), None);
    let mut tenant = latticeguard_deploy::TenantSession::new(keypair, cert);

    let attestation = tee.publish_attestation().unwrap();
    tenant.verify_tee(&attestation, &bed.tee_public()).unwrap();
    let enc = tenant.send_design(b"design").unwrap();
    assert!(matches!(
        tee.handle_design(&enc),
        Err(DeployError::Crypto(_))
    ));
}

#[test]
fn test_failed_session_leaves_authority_available() {
    let bed = TestBed::new();

    // A failed node attestation must not poison later sessions.
    let rogue_root = SigningKeyPair::generate();
    let rogue = DeviceIdentity::provision(&rogue_root, DeviceSerial::new("FPGA-666"));
    let nonce = Nonce::generate();
    let quote = node_quote_payload(&rogue.aik.public_bytes(), &nonce, &rogue.serial);
    let bad_request = NodeAttestationRequest {
        aik_public: rogue.aik.public_bytes(),
        aik_cert: rogue.aik_cert.clone(),
        ek_cert: rogue.ek_cert.clone(),
        ek_public: rogue.ek_public,
        quote_signature: rogue.aik.sign(&quote),
        nonce,
        serial: rogue.serial.clone(),
    };
    assert!(bed.authority.attest_node(&bad_request).is_err());

    let run = run_deployment(&bed, b"design-after-failure", "FPGA-001", RegionId(0));
    assert_eq!(
        run.report.design_hash,
        latticeguard_crypto::digest(b"design-after-failure")
    );
}
