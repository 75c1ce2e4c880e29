//! Integration test: passport registration end to end.
//!
//! Real SOD fixtures and trust store, real Groth16 verification, the
//! in-memory claim store and a recording issuer.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use passid_core::{Did, DocumentSod, MultiAccountLimits, PageParams, TreeParams, ZkProof};
use passid_document::{DocumentError, DocumentVerifier};
use passid_integration_tests::{
    prove, registration_signals, sod, trust_store, FixedClock, RecordingIssuer, SOD_SHA1_ECDSA,
    SOD_SHA256_ECDSA, SOD_SHA256_RSA,
};
use passid_node::{
    AntiSybilEngine, ClaimLifecycleOrchestrator, ClaimStore, MemoryClaimStore, PassportVerifier,
    RegistrationError, RegistrationRequest, RegistrationSettings, WorkerPool,
};
use passid_proof::{ProofError, ProofValidator, VerificationKeys};
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
}

struct Flow {
    store: Arc<MemoryClaimStore>,
    issuer: Arc<RecordingIssuer>,
    orchestrator: ClaimLifecycleOrchestrator,
    document: DocumentSod,
    proof: ZkProof,
}

/// Wire a node around `sod_json` with a proof generated for `proof_day`.
fn flow(sod_json: &str, proof_day: NaiveDate) -> Flow {
    let document = sod(sod_json);
    let documents = Arc::new(DocumentVerifier::new(trust_store()));
    let verified = documents.verify_at(&document, now()).unwrap();
    let signals = registration_signals(verified.dg1_hash().unwrap(), proof_day, 30);
    let (key, proof) = prove(&signals);

    let validator = ProofValidator::new(
        VerificationKeys::new(key.clone(), key).unwrap(),
        18,
    );
    let workers = WorkerPool::new(2);
    let verifier = PassportVerifier::new(documents, Arc::new(validator), workers.clone());

    let store = Arc::new(MemoryClaimStore::new());
    let issuer = Arc::new(RecordingIssuer::default());
    let orchestrator = ClaimLifecycleOrchestrator::new(
        store.clone(),
        issuer.clone(),
        Arc::new(verifier),
        Arc::new(AntiSybilEngine::from_entropy(MultiAccountLimits::new(5, 5).unwrap())),
        workers,
        passid_crypto::parse_field("42").unwrap(),
        RegistrationSettings {
            issuer_did: "did:iden3:readonly:issuer".into(),
            timeout: std::time::Duration::from_secs(30),
            policy: Default::default(),
        },
    )
    .with_clock(Arc::new(FixedClock(now())));

    Flow {
        store,
        issuer,
        orchestrator,
        document,
        proof,
    }
}

fn request(flow: &Flow, user: &str) -> RegistrationRequest {
    RegistrationRequest {
        did: Did::new(format!("did:iden3:readonly:{}", user)).unwrap(),
        proof: flow.proof.clone(),
        document_sod: flow.document.clone(),
    }
}

#[tokio::test]
async fn test_registration_creates_claim_and_proof() {
    let flow = flow(SOD_SHA256_ECDSA, now().date_naive());
    let issued = flow.orchestrator.register(request(&flow, "alice")).await.unwrap();

    assert!(!issued.claim_id.is_nil());
    assert_eq!(issued.issuer_did, "did:iden3:readonly:issuer");
    let claims = flow.store.claims().await;
    let proofs = flow.store.proofs().await;
    assert_eq!(claims.len(), 1);
    assert_eq!(proofs.len(), 1);
    assert_eq!(proofs[0].claim_id, issued.claim_id);

    let sent = flow.issuer.issued.lock().unwrap()[0].clone();
    assert_eq!(sent.issuing_authority, 8400);
    assert_eq!(
        sent.expiration,
        Utc.with_ymd_and_hms(2031, 12, 31, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_rsa_document_registers() {
    let flow = flow(SOD_SHA256_RSA, now().date_naive());
    flow.orchestrator.register(request(&flow, "alice")).await.unwrap();
    assert_eq!(flow.issuer.issued_count(), 1);
}

#[tokio::test]
async fn test_same_did_twice_is_idempotent() {
    let flow = flow(SOD_SHA256_ECDSA, now().date_naive());
    let first = flow.orchestrator.register(request(&flow, "alice")).await.unwrap();
    let second = flow.orchestrator.register(request(&flow, "alice")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(flow.store.claims().await.len(), 1);
    assert_eq!(flow.issuer.issued_count(), 1);
}

#[tokio::test]
async fn test_accounts_sharing_a_document_feed_uniqueness_salts() {
    let flow = flow(SOD_SHA256_ECDSA, now().date_naive());
    flow.orchestrator.register(request(&flow, "alice")).await.unwrap();
    flow.orchestrator.register(request(&flow, "bob")).await.unwrap();

    let hashes = flow.store.document_hashes(PageParams::default()).await.unwrap();
    assert_eq!(hashes.len(), 1);
    let salts = flow.store.salts_for_document(&hashes[0]).await.unwrap();
    assert_eq!(salts.len(), 2);

    let salts: Vec<_> = salts
        .iter()
        .map(|s| passid_crypto::parse_field(s).unwrap())
        .collect();
    let inputs = passid_proof::CircuitInputs::build(
        &TreeParams::new(4, 2).unwrap(),
        &passid_crypto::parse_field("42").unwrap(),
        &passid_crypto::parse_field(&hashes[0]).unwrap(),
        &salts,
    )
    .unwrap();
    assert!(inputs.paths_are_consistent());
}

#[tokio::test]
async fn test_flipped_signature_has_no_side_effects() {
    let flow = flow(SOD_SHA256_ECDSA, now().date_naive());
    let mut req = request(&flow, "alice");
    let mut signature = hex::decode(&req.document_sod.signature).unwrap();
    let last = signature.len() - 1;
    signature[last] ^= 0x01;
    req.document_sod.signature = hex::encode(signature);

    let err = flow.orchestrator.register(req).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Document(DocumentError::SignatureInvalid(_))
    ));
    assert_eq!(flow.issuer.issued_count(), 0);
    assert!(flow.store.claims().await.is_empty());
    assert!(flow.store.proofs().await.is_empty());
}

#[tokio::test]
async fn test_date_mismatch_rejected_despite_valid_proof() {
    let yesterday = (now() - Duration::days(1)).date_naive();
    let flow = flow(SOD_SHA256_ECDSA, yesterday);

    let err = flow.orchestrator.register(request(&flow, "alice")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Proof(ProofError::DateMismatch { .. })
    ));
    assert_eq!(flow.issuer.issued_count(), 0);
    assert!(flow.store.claims().await.is_empty());
}

#[tokio::test]
async fn test_proof_for_other_document_rejected() {
    let mut flow = flow(SOD_SHA256_ECDSA, now().date_naive());
    flow.document = sod(SOD_SHA1_ECDSA);

    let err = flow.orchestrator.register(request(&flow, "alice")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Proof(ProofError::Dg1Mismatch)
    ));
    assert_eq!(flow.issuer.issued_count(), 0);
}
