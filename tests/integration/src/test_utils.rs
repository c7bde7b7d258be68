//! Shared fixtures for protocol integration tests.

use latticeguard_core::{Config, DeviceSerial, Nonce, RegionId};
use latticeguard_crypto::{Certificate, Digest, SigningKeyPair};
use latticeguard_deploy::{AgentSession, DeviceIdentity, TeeSession, TenantSession};
use latticeguard_identity::{IdentityAuthority, TrustDomain, ValidationAttestation};
use latticeguard_workload::WorkloadSession;
use serde::Serialize;

/// Default SVID freshness window for tests.
pub const HOUR_MS: u64 = 3_600_000;

/// Trust anchors of one test deployment: manufacturer root, tenant CA,
/// TEE identity and the Identity Authority built over them.
pub struct TestBed {
    pub config: Config,
    pub manufacturer: SigningKeyPair,
    pub tenant_ca: SigningKeyPair,
    tee_seed: [u8; 32],
    pub authority: IdentityAuthority,
}

impl TestBed {
    pub fn new() -> Self {
        let config = Config::default_config();
        let manufacturer = SigningKeyPair::generate();
        let tenant_ca = SigningKeyPair::generate();
        let tee = SigningKeyPair::generate();
        let authority = IdentityAuthority::new(
            SigningKeyPair::generate(),
            manufacturer.public_bytes(),
            tee.public_bytes(),
            TrustDomain::new(config.trust_domain.name.clone()),
        );
        Self {
            config,
            manufacturer,
            tenant_ca,
            tee_seed: tee.to_bytes(),
            authority,
        }
    }

    pub fn tee_public(&self) -> [u8; 32] {
        SigningKeyPair::from_bytes(&self.tee_seed).public_bytes()
    }

    pub fn tee_session(&self) -> TeeSession {
        TeeSession::new(
            SigningKeyPair::from_bytes(&self.tee_seed),
            self.tenant_ca.public_bytes(),
        )
    }

    pub fn tenant_session(&self) -> TenantSession {
        let keypair = SigningKeyPair::generate();
        let cert = Certificate::issue(&self.tenant_ca, keypair.public_bytes(), None);
        TenantSession::new(keypair, cert)
    }

    pub fn agent_session(&self, serial: &str) -> AgentSession {
        let identity = DeviceIdentity::provision(&self.manufacturer, DeviceSerial::new(serial));
        AgentSession::new(
            identity,
            self.tenant_ca.public_bytes(),
            self.authority.bundle(),
        )
    }

    pub fn workload_session(&self, region: RegionId) -> WorkloadSession {
        WorkloadSession::new(
            self.authority.bundle(),
            region,
            self.config.trust_domain.svid_max_age_secs * 1000,
        )
    }
}

/// Everything recorded from one successful deployment run.
pub struct DeploymentRun {
    pub tenant: TenantSession,
    pub agent: AgentSession,
    pub report: ValidationAttestation,
    pub measurement: Digest,
    /// JSON encodings of every message that crossed the public channel.
    pub transcript: Vec<String>,
}

fn record<T: Serialize>(transcript: &mut Vec<String>, msg: &T) {
    transcript.push(serde_json::to_string(msg).expect("message serializes"));
}

/// Drive one full deployment from design submission through region
/// configuration, recording all public-channel traffic.
pub fn run_deployment(bed: &TestBed, design: &[u8], serial: &str, region: RegionId) -> DeploymentRun {
    let mut transcript = Vec::new();

    // Design validation.
    let mut tee = bed.tee_session();
    let mut tenant = bed.tenant_session();
    let attestation = tee.publish_attestation().expect("TEE attestation");
    record(&mut transcript, &attestation);
    tenant
        .verify_tee(&attestation, &bed.tee_public())
        .expect("tenant verifies TEE");
    let enc_design = tenant.send_design(design).expect("design sealed");
    record(&mut transcript, &enc_design);
    tee.handle_design(&enc_design).expect("TEE validates design");
    let report = tee.emit_report().expect("validation report");
    record(&mut transcript, &report);
    tenant.receive_validation(&report).expect("tenant accepts report");

    // Node attestation.
    let mut agent = bed.agent_session(serial);
    let challenge = Nonce::generate();
    let node_req = agent.attest_node(&challenge).expect("node evidence");
    record(&mut transcript, &node_req);
    let node_resp = bed.authority.attest_node(&node_req).expect("node attested");
    record(&mut transcript, &node_resp);
    agent.receive_node_svid(&node_resp).expect("node SVID accepted");

    // Allocation and mutual authentication.
    let alloc = tenant
        .request_deployment(&DeviceSerial::new(serial), region)
        .expect("deployment request");
    record(&mut transcript, &alloc);
    agent.verify_allocation(&alloc).expect("allocation verified");
    let agent_kx = agent.begin_mutual_auth().expect("agent key offer");
    record(&mut transcript, &agent_kx);
    let tenant_kx = tenant
        .authenticate_agent(&agent_kx, &agent.aik_public())
        .expect("tenant authenticates agent");
    record(&mut transcript, &tenant_kx);
    agent.complete_mutual_auth(&tenant_kx).expect("agent authenticates tenant");

    // Bitstream delivery and configuration.
    let bitstream = tenant.send_bitstream(design).expect("bitstream encrypted");
    record(&mut transcript, &bitstream);
    agent
        .receive_bitstream(&bitstream, &bed.tee_public())
        .expect("bitstream verified");
    let measurement = agent.configure_region().expect("region configured");

    DeploymentRun {
        tenant,
        agent,
        report,
        measurement,
        transcript,
    }
}

/// Continue a deployment run through workload identification: region key
/// handoff, challenge/response and SVID issuance.
pub fn identify_workload(bed: &TestBed, run: &mut DeploymentRun, region: RegionId) -> WorkloadSession {
    let mut workload = bed.workload_session(region);
    let handoff = run.agent.issue_region_key().expect("region key issued");
    workload.receive_region_key(handoff).expect("region key accepted");

    let request = workload.request_svid().expect("SVID request");
    let challenge = run
        .agent
        .handle_svid_request(&request)
        .expect("challenge issued");
    let answer = workload.answer_challenge(&challenge).expect("possession proven");
    let evidence = run.agent.certify_workload(&answer).expect("evidence signed");
    run.transcript
        .push(serde_json::to_string(&evidence).expect("evidence serializes"));
    let response = bed
        .authority
        .attest_workload(&evidence)
        .expect("workload attested");
    run.transcript
        .push(serde_json::to_string(&response).expect("response serializes"));
    workload.receive_svid(&response).expect("workload SVID accepted");
    workload
}
